// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Builtin Action Registry
//!
//! Name → handler table for actions compiled into the agent, plus the two
//! reference builtins that exercise the handler contract.
//!
//! ## Handler Contract
//!
//! A builtin receives the per-execution cancellation token and the request
//! parameters and resolves to `(stdout, stderr, exit_code)` or an error.
//! The executor treats the invocation as an untrusted region: panics are
//! recovered at the execution boundary and surfaced as `error` results.
//!
//! ## Reference Builtins
//!
//! - `agent.info` — host information probe (hostname, OS, architecture,
//!   agent version, pid) rendered as JSON
//! - `net.ping` — TCP connect probe with per-attempt latency reporting;
//!   a raw ICMP ping would need privileges the agent must not assume

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;

use plexd_domain::entities::{ActionInfo, HookParameter};
use plexd_domain::AgentError;

/// Result of a builtin handler invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl BuiltinOutput {
    /// Successful output with exit code zero.
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            stderr: String::new(),
            exit_code: 0,
        }
    }
}

/// Callable contract shared by every builtin action.
pub type BuiltinHandler = Arc<
    dyn Fn(CancellationToken, HashMap<String, String>) -> BoxFuture<'static, Result<BuiltinOutput, AgentError>>
        + Send
        + Sync,
>;

struct BuiltinEntry {
    info: ActionInfo,
    handler: BuiltinHandler,
}

/// Table of builtin actions with their capability metadata.
#[derive(Default)]
pub struct BuiltinRegistry {
    entries: HashMap<String, BuiltinEntry>,
}

impl BuiltinRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the reference builtins.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(
            "agent.info",
            "Report host and agent information",
            Vec::new(),
            Arc::new(|cancel, params| agent_info(cancel, params).boxed()),
        );
        registry.register(
            "net.ping",
            "Probe TCP connectivity to a remote host",
            vec![
                HookParameter {
                    name: "host".into(),
                    r#type: "string".into(),
                    required: true,
                    description: "host name or address to probe".into(),
                },
                HookParameter {
                    name: "port".into(),
                    r#type: "int".into(),
                    required: false,
                    description: "TCP port, default 443".into(),
                },
                HookParameter {
                    name: "count".into(),
                    r#type: "int".into(),
                    required: false,
                    description: "attempts, default 3, max 10".into(),
                },
                HookParameter {
                    name: "timeout".into(),
                    r#type: "duration".into(),
                    required: false,
                    description: "per-attempt timeout, default 2s".into(),
                },
            ],
            Arc::new(|cancel, params| net_ping(cancel, params).boxed()),
        );
        registry
    }

    /// Installs (or replaces) a builtin handler.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Vec<HookParameter>,
        handler: BuiltinHandler,
    ) {
        let name = name.into();
        self.entries.insert(
            name.clone(),
            BuiltinEntry {
                info: ActionInfo {
                    name,
                    description: description.into(),
                    parameters,
                },
                handler,
            },
        );
    }

    /// Looks up a handler by exact name.
    pub fn get(&self, name: &str) -> Option<BuiltinHandler> {
        self.entries.get(name).map(|e| e.handler.clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Capability metadata for every registered builtin, ordered by name.
    pub fn infos(&self) -> Vec<ActionInfo> {
        let mut infos: Vec<_> = self.entries.values().map(|e| e.info.clone()).collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

async fn agent_info(
    _cancel: CancellationToken,
    _params: HashMap<String, String>,
) -> Result<BuiltinOutput, AgentError> {
    let host = hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default();

    let info = serde_json::json!({
        "hostname": host,
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "agent_version": env!("CARGO_PKG_VERSION"),
        "pid": std::process::id(),
    });

    let rendered = serde_json::to_string_pretty(&info)
        .map_err(|e| AgentError::serialization_error(format!("render agent info: {}", e)))?;
    Ok(BuiltinOutput::success(rendered))
}

async fn net_ping(
    cancel: CancellationToken,
    params: HashMap<String, String>,
) -> Result<BuiltinOutput, AgentError> {
    let host = params
        .get("host")
        .filter(|h| !h.is_empty())
        .ok_or_else(|| AgentError::validation_error("net.ping: host parameter is required"))?;

    let port: u16 = match params.get("port") {
        Some(text) => text
            .parse()
            .map_err(|_| AgentError::validation_error(format!("net.ping: invalid port {:?}", text)))?,
        None => 443,
    };

    let count: u32 = match params.get("count") {
        Some(text) => text
            .parse::<u32>()
            .map_err(|_| AgentError::validation_error(format!("net.ping: invalid count {:?}", text)))?
            .clamp(1, 10),
        None => 3,
    };

    let attempt_timeout = match params.get("timeout") {
        Some(text) => humantime::parse_duration(text.trim())
            .map_err(|_| AgentError::validation_error(format!("net.ping: invalid timeout {:?}", text)))?,
        None => Duration::from_secs(2),
    };

    let mut stdout = String::new();
    let mut failures = 0u32;

    for attempt in 1..=count {
        let started = std::time::Instant::now();
        let connect = tokio::net::TcpStream::connect((host.as_str(), port));

        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(AgentError::cancelled("net.ping cancelled"));
            }
            outcome = tokio::time::timeout(attempt_timeout, connect) => {
                match outcome {
                    Ok(Ok(_stream)) => {
                        stdout.push_str(&format!(
                            "connect {}:{} seq={} time={:.2?}\n",
                            host, port, attempt, started.elapsed()
                        ));
                    }
                    Ok(Err(e)) => {
                        failures += 1;
                        stdout.push_str(&format!("connect {}:{} seq={} error: {}\n", host, port, attempt, e));
                    }
                    Err(_) => {
                        failures += 1;
                        stdout.push_str(&format!(
                            "connect {}:{} seq={} timeout after {}\n",
                            host, port, attempt,
                            humantime::format_duration(attempt_timeout)
                        ));
                    }
                }
            }
        }
    }

    stdout.push_str(&format!("{} attempts, {} failed\n", count, failures));
    Ok(BuiltinOutput {
        stdout,
        stderr: String::new(),
        exit_code: if failures > 0 { 1 } else { 0 },
    })
}
