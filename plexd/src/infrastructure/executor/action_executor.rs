// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Action Executor
//!
//! The action execution engine: admission control, run lifecycle,
//! cancellation, output limiting, status classification, and result
//! reporting.
//!
//! ## Admission
//!
//! [`ActionExecutor::execute`] makes its admission decision under a single
//! mutex guarding the active set and the shutting-down flag: shutting
//! down, duplicate execution id, concurrency cap, unknown action. Every
//! request produces exactly one ack; rejected requests never produce a
//! result. Accepted requests register a cancellation token under their
//! execution id and run in a spawned task.
//!
//! ## Run Lifecycle
//!
//! Each run lives under a context tree: the caller's token → the
//! per-execution child token → (for hooks) the external process. The
//! requested timeout is clamped to `max_action_timeout`; an unparseable
//! timeout falls back to the maximum. Hook processes get a minimal
//! environment, bounded stdout/stderr capture, and a 500 ms SIGTERM grace
//! window after cancellation before they are killed.
//!
//! ## Failure Containment
//!
//! The whole run is wrapped in a panic barrier: any unwind becomes an
//! `error` result with the panic text on stderr, and the executor keeps
//! serving. Reporter failures are logged at warn and absorbed.
//!
//! ## Shutdown
//!
//! [`ActionExecutor::shutdown`] flips the admission flag, cancels every
//! active token, and waits for in-flight runs to drain. Running handlers
//! observe the cancellation through their token; hook processes are
//! terminated through the grace window.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use plexd_domain::entities::{
    ActionInfo, ActionRequest, ExecutionAck, ExecutionResult, ExecutionStatus, HookInfo, HookParameter,
    RejectReason,
};
use plexd_domain::services::{HookVerifier, Reporter};
use plexd_domain::AgentError;

use super::builtins::{BuiltinHandler, BuiltinRegistry};
use super::config::ExecutorConfig;
use super::hooks;
use super::limited_writer::drain_into_limited;
use crate::infrastructure::runtime::panic_message;

/// Grace window between SIGTERM and SIGKILL after cancellation.
const TERMINATION_GRACE: Duration = Duration::from_millis(500);

struct ExecutorState {
    shutting_down: bool,
    /// Active set: execution id → cancellation handle
    active: HashMap<String, CancellationToken>,
}

enum ResolvedAction {
    Builtin(BuiltinHandler),
    Hook(HookInfo),
}

/// Outcome of a dispatched run before status classification.
struct RunOutcome {
    stdout: String,
    stderr: String,
    exit_code: i32,
    run_error: Option<AgentError>,
    timed_out: bool,
}

impl RunOutcome {
    fn errored(err: AgentError) -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: -1,
            run_error: Some(err),
            timed_out: false,
        }
    }

    fn panicked(message: String) -> Self {
        Self {
            stdout: String::new(),
            stderr: format!("panic: {}", message),
            exit_code: -1,
            run_error: Some(AgentError::internal_error("action handler panicked")),
            timed_out: false,
        }
    }
}

struct Inner {
    config: ExecutorConfig,
    builtins: RwLock<BuiltinRegistry>,
    hooks: RwLock<Vec<HookInfo>>,
    state: Mutex<ExecutorState>,
    drained: Notify,
    verifier: Arc<dyn HookVerifier>,
    reporter: Arc<dyn Reporter>,
}

/// The action execution engine. Created once per process; accepts
/// requests until [`shutdown`](Self::shutdown). Cloning yields another
/// handle to the same engine.
#[derive(Clone)]
pub struct ActionExecutor {
    inner: Arc<Inner>,
}

impl ActionExecutor {
    pub fn new(config: ExecutorConfig, verifier: Arc<dyn HookVerifier>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                builtins: RwLock::new(BuiltinRegistry::with_defaults()),
                hooks: RwLock::new(Vec::new()),
                state: Mutex::new(ExecutorState {
                    shutting_down: false,
                    active: HashMap::new(),
                }),
                drained: Notify::new(),
                verifier,
                reporter,
            }),
        }
    }

    /// Whether the engine accepts action requests at all.
    pub fn enabled(&self) -> bool {
        self.inner.config.enabled
    }

    /// Installs (or replaces) a builtin action handler.
    pub fn register_builtin(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<HookParameter>,
        handler: BuiltinHandler,
    ) {
        self.inner
            .builtins
            .write()
            .register(name, description, parameters, handler);
    }

    /// Replaces the current hook snapshot.
    pub fn set_hooks(&self, hooks: Vec<HookInfo>) {
        *self.inner.hooks.write() = hooks;
    }

    /// Rescans the hooks directory and replaces the snapshot. Returns the
    /// number of discovered hooks.
    pub async fn refresh_hooks(&self) -> Result<usize, AgentError> {
        let discovered = hooks::discover_hooks(&self.inner.config.hooks_dir).await?;
        let count = discovered.len();
        self.set_hooks(discovered);
        Ok(count)
    }

    /// Union of builtin and hook capabilities for upstream reporting.
    pub fn capabilities(&self) -> Vec<ActionInfo> {
        let mut infos = self.inner.builtins.read().infos();
        infos.extend(self.inner.hooks.read().iter().map(ActionInfo::from));
        infos
    }

    /// Number of currently running executions.
    pub fn active_count(&self) -> usize {
        self.inner.state.lock().active.len()
    }

    /// Admits and launches an action request.
    ///
    /// Sends exactly one ack through the reporter; on acceptance the run
    /// continues in a spawned task and produces exactly one result. The
    /// call itself never blocks on execution completion.
    pub async fn execute(&self, parent: &CancellationToken, node_id: &str, request: ActionRequest) {
        let inner = &self.inner;

        // Resolve before taking the state lock: no two locks are ever
        // held at once.
        let resolved = inner.resolve(&request.action);

        let admitted = {
            let mut state = inner.state.lock();
            if state.shutting_down {
                Err(RejectReason::ShuttingDown)
            } else if state.active.contains_key(&request.execution_id) {
                Err(RejectReason::DuplicateExecutionId)
            } else if state.active.len() >= inner.config.max_concurrent {
                Err(RejectReason::MaxConcurrentReached)
            } else {
                match resolved {
                    None => Err(RejectReason::UnknownAction),
                    Some(resolved) => {
                        let token = parent.child_token();
                        state.active.insert(request.execution_id.clone(), token.clone());
                        Ok((token, resolved))
                    }
                }
            }
        };

        match admitted {
            Err(reason) => {
                debug!(
                    execution_id = %request.execution_id,
                    action = %request.action,
                    reason = reason.as_str(),
                    "action rejected"
                );
                inner
                    .send_ack(node_id, ExecutionAck::rejected(&request.execution_id, reason))
                    .await;
            }
            Ok((token, resolved)) => {
                debug!(
                    execution_id = %request.execution_id,
                    action = %request.action,
                    "action accepted"
                );
                inner
                    .send_ack(node_id, ExecutionAck::accepted(&request.execution_id))
                    .await;

                let inner = Arc::clone(inner);
                let node_id = node_id.to_string();
                tokio::spawn(async move {
                    inner.run_action(token, node_id, request, resolved).await;
                });
            }
        }
    }

    /// Stops admission, cancels every active execution, and waits for
    /// in-flight runs to drain.
    pub async fn shutdown(&self) {
        let inner = &self.inner;
        let tokens: Vec<CancellationToken> = {
            let mut state = inner.state.lock();
            state.shutting_down = true;
            state.active.values().cloned().collect()
        };
        debug!(active = tokens.len(), "executor shutting down");

        for token in tokens {
            token.cancel();
        }

        loop {
            let notified = inner.drained.notified();
            if inner.state.lock().active.is_empty() {
                break;
            }
            notified.await;
        }
        debug!("executor drained");
    }
}

impl Inner {
    // Builtins take precedence over hooks on name collision.
    fn resolve(&self, action: &str) -> Option<ResolvedAction> {
        if let Some(handler) = self.builtins.read().get(action) {
            return Some(ResolvedAction::Builtin(handler));
        }
        self.hooks
            .read()
            .iter()
            .find(|h| h.name == action)
            .cloned()
            .map(ResolvedAction::Hook)
    }

    async fn run_action(
        self: Arc<Self>,
        token: CancellationToken,
        node_id: String,
        request: ActionRequest,
        resolved: ResolvedAction,
    ) {
        let started = Instant::now();
        let timeout = parse_timeout(request.timeout.as_deref(), self.config.max_action_timeout);

        // Panic barrier: anything that unwinds inside the dispatch
        // becomes an error result instead of poisoning the executor.
        let outcome = match AssertUnwindSafe(self.dispatch(&token, &node_id, &request, resolved, timeout))
            .catch_unwind()
            .await
        {
            Ok(outcome) => outcome,
            Err(panic) => RunOutcome::panicked(panic_message(panic)),
        };

        let status = classify(&outcome.run_error, outcome.exit_code, outcome.timed_out, &token);

        let mut stderr = outcome.stderr;
        if let Some(err) = &outcome.run_error {
            if stderr.is_empty() {
                stderr = err.to_string();
            }
        }

        let elapsed = Duration::from_millis(started.elapsed().as_millis() as u64);
        let result = ExecutionResult {
            execution_id: request.execution_id.clone(),
            status,
            exit_code: outcome.exit_code,
            stdout: outcome.stdout,
            stderr,
            duration: humantime::format_duration(elapsed).to_string(),
            finished_at: Utc::now(),
            triggered_by: request.triggered_by.clone(),
        };

        debug!(
            execution_id = %request.execution_id,
            status = status.as_str(),
            exit_code = result.exit_code,
            "action finished"
        );

        if let Err(e) = self
            .reporter
            .report_result(&node_id, &request.execution_id, result)
            .await
        {
            warn!(execution_id = %request.execution_id, error = %e, "failed to report execution result");
        }

        self.finish(&request.execution_id);
    }

    async fn dispatch(
        &self,
        token: &CancellationToken,
        node_id: &str,
        request: &ActionRequest,
        resolved: ResolvedAction,
        timeout: Duration,
    ) -> RunOutcome {
        match resolved {
            ResolvedAction::Builtin(handler) => self.run_builtin(token, request, handler, timeout).await,
            ResolvedAction::Hook(hook) => self.run_hook(token, node_id, request, hook, timeout).await,
        }
    }

    async fn run_builtin(
        &self,
        token: &CancellationToken,
        request: &ActionRequest,
        handler: BuiltinHandler,
        timeout: Duration,
    ) -> RunOutcome {
        let fut = handler(token.clone(), request.parameters.clone());

        tokio::select! {
            _ = token.cancelled() => RunOutcome::errored(AgentError::cancelled("execution cancelled")),
            outcome = tokio::time::timeout(timeout, fut) => match outcome {
                Err(_) => RunOutcome {
                    stdout: String::new(),
                    stderr: String::new(),
                    exit_code: -1,
                    run_error: Some(AgentError::timeout(format!(
                        "action timed out after {}",
                        humantime::format_duration(timeout)
                    ))),
                    timed_out: true,
                },
                Ok(Ok(output)) => RunOutcome {
                    stdout: output.stdout,
                    stderr: output.stderr,
                    exit_code: output.exit_code,
                    run_error: None,
                    timed_out: false,
                },
                Ok(Err(e)) => RunOutcome::errored(e),
            },
        }
    }

    async fn run_hook(
        &self,
        token: &CancellationToken,
        node_id: &str,
        request: &ActionRequest,
        hook: HookInfo,
        timeout: Duration,
    ) -> RunOutcome {
        let path = match validate_hook_path(&self.config.hooks_dir, &hook.name) {
            Ok(path) => path,
            Err(e) => return RunOutcome::errored(e),
        };

        match tokio::fs::try_exists(&path).await {
            Ok(true) => {}
            Ok(false) => {
                return RunOutcome::errored(AgentError::not_found(format!("hook not found: {}", hook.name)))
            }
            Err(e) => {
                return RunOutcome::errored(AgentError::io_error(format!("stat {}: {}", path.display(), e)))
            }
        }

        // Checksum gate: a hook runs only after the request's expected
        // checksum verified against the file on disk.
        match self.verifier.verify_hook(node_id, &path, &request.checksum).await {
            Ok(true) => {}
            Ok(false) => {
                return RunOutcome::errored(AgentError::integrity_error(format!(
                    "integrity check failed for hook {}",
                    hook.name
                )))
            }
            Err(e) => {
                return RunOutcome::errored(AgentError::integrity_error(format!(
                    "integrity verification error for hook {}: {}",
                    hook.name, e
                )))
            }
        }

        let mut command = tokio::process::Command::new(&path);
        command
            .env_clear()
            .env("PLEXD_NODE_ID", node_id)
            .env("PLEXD_EXECUTION_ID", &request.execution_id)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        // Own process group: termination signals reach the whole hook
        // subtree, so no orphan can hold the output pipes open.
        #[cfg(unix)]
        command.process_group(0);
        if let Ok(path_var) = std::env::var("PATH") {
            command.env("PATH", path_var);
        }
        if let Ok(home) = std::env::var("HOME") {
            command.env("HOME", home);
        }
        for (name, value) in &request.parameters {
            command.env(format!("PLEXD_PARAM_{}", sanitize_param_name(name)), value);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                return RunOutcome::errored(AgentError::io_error(format!("spawn hook {}: {}", hook.name, e)))
            }
        };

        let cap = self.config.max_output_bytes;
        let stdout_pipe = child.stdout.take().expect("stdout piped");
        let stderr_pipe = child.stderr.take().expect("stderr piped");
        let stdout_task = tokio::spawn(drain_into_limited(stdout_pipe, cap));
        let stderr_task = tokio::spawn(drain_into_limited(stderr_pipe, cap));

        enum WaitOutcome {
            Exited(std::io::Result<std::process::ExitStatus>),
            TimedOut,
            Cancelled,
        }

        // The decision select borrows the child; termination happens
        // after it resolves, once the wait future is dropped.
        let waited = tokio::select! {
            status = child.wait() => WaitOutcome::Exited(status),
            _ = tokio::time::sleep(timeout) => WaitOutcome::TimedOut,
            _ = token.cancelled() => WaitOutcome::Cancelled,
        };

        let (exit_code, run_error, timed_out) = match waited {
            WaitOutcome::Exited(Ok(status)) => (status.code().unwrap_or(-1), None, false),
            WaitOutcome::Exited(Err(e)) => (
                -1,
                Some(AgentError::io_error(format!("wait hook {}: {}", hook.name, e))),
                false,
            ),
            WaitOutcome::TimedOut => {
                terminate_child(&mut child).await;
                (
                    -1,
                    Some(AgentError::timeout(format!(
                        "action timed out after {}",
                        humantime::format_duration(timeout)
                    ))),
                    true,
                )
            }
            WaitOutcome::Cancelled => {
                terminate_child(&mut child).await;
                (-1, Some(AgentError::cancelled("execution cancelled")), false)
            }
        };

        let stdout = match stdout_task.await {
            Ok(buffer) => buffer.into_string_lossy(),
            Err(_) => String::new(),
        };
        let stderr = match stderr_task.await {
            Ok(buffer) => buffer.into_string_lossy(),
            Err(_) => String::new(),
        };

        RunOutcome {
            stdout,
            stderr,
            exit_code,
            run_error,
            timed_out,
        }
    }

    async fn send_ack(&self, node_id: &str, ack: ExecutionAck) {
        let execution_id = ack.execution_id.clone();
        if let Err(e) = self.reporter.ack_execution(node_id, &execution_id, ack).await {
            warn!(execution_id = %execution_id, error = %e, "failed to send execution ack");
        }
    }

    fn finish(&self, execution_id: &str) {
        let mut state = self.state.lock();
        state.active.remove(execution_id);
        if state.active.is_empty() {
            self.drained.notify_waiters();
        }
    }
}

/// Classifies a finished run into its terminal status.
fn classify(
    run_error: &Option<AgentError>,
    exit_code: i32,
    timed_out: bool,
    token: &CancellationToken,
) -> ExecutionStatus {
    match run_error {
        Some(_) if timed_out => ExecutionStatus::Timeout,
        Some(_) if token.is_cancelled() => ExecutionStatus::Cancelled,
        Some(_) => ExecutionStatus::Error,
        None if exit_code != 0 => ExecutionStatus::Failed,
        None => ExecutionStatus::Success,
    }
}

/// Parses the request timeout, clamping to `max`. Unparseable, missing,
/// or zero text falls back to `max`.
fn parse_timeout(text: Option<&str>, max: Duration) -> Duration {
    match text.and_then(|t| humantime::parse_duration(t.trim()).ok()) {
        Some(parsed) if !parsed.is_zero() => parsed.min(max),
        _ => max,
    }
}

/// Rejects hook names that could escape the hooks directory.
fn validate_hook_path(hooks_dir: &std::path::Path, name: &str) -> Result<PathBuf, AgentError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(AgentError::validation_error(format!("invalid hook name {:?}", name)));
    }
    Ok(hooks_dir.join(name))
}

/// Uppercases a parameter name and maps every character outside
/// `[A-Za-z0-9_]` to `_`, yielding the env var suffix.
fn sanitize_param_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            let upper = c.to_ascii_uppercase();
            if upper.is_ascii_alphanumeric() || upper == '_' {
                upper
            } else {
                '_'
            }
        })
        .collect()
}

async fn terminate_child(child: &mut tokio::process::Child) {
    // SIGTERM to the process group first so well-behaved hooks can clean
    // up inside the grace window; SIGKILL only after it expires.
    #[cfg(unix)]
    {
        if let Some(pid) = child.id() {
            unsafe {
                libc::kill(-(pid as libc::pid_t), libc::SIGTERM);
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = child.start_kill();
    }

    if tokio::time::timeout(TERMINATION_GRACE, child.wait()).await.is_err() {
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                unsafe {
                    libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
                }
            }
        }
        if let Err(e) = child.kill().await {
            warn!(error = %e, "failed to kill hook process");
        }
    }
}
