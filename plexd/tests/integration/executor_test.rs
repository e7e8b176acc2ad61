// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Executor Integration Tests
//!
//! End-to-end scenarios for the action execution engine with real hook
//! processes: admission, timeout, exit codes, output truncation, minimal
//! environment, checksum gating, and shutdown.

#![cfg(unix)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use plexd::application::events::ActionEventHandler;
use plexd::infrastructure::executor::builtins::BuiltinOutput;
use plexd::infrastructure::executor::{ActionExecutor, ExecutorConfig};
use plexd::infrastructure::integrity::{ChecksumStore, IntegrityVerifier, VerifierConfig};
use plexd_domain::entities::{
    AckStatus, ActionRequest, EventEnvelope, ExecutionStatus, RejectReason, ViolationKind,
};

use crate::common::{wait_for_results, write_script, CapturingReporter, PassVerifier};

const NODE: &str = "node-itest";

fn request(id: &str, action: &str, timeout: &str) -> ActionRequest {
    ActionRequest {
        execution_id: id.into(),
        action: action.into(),
        timeout: Some(timeout.into()),
        checksum: String::new(),
        parameters: HashMap::new(),
        triggered_by: "itest".into(),
    }
}

async fn executor_with_hooks(
    config: ExecutorConfig,
    hooks_dir: &TempDir,
) -> (ActionExecutor, Arc<CapturingReporter>) {
    crate::common::init_test_logging();
    let reporter = Arc::new(CapturingReporter::default());
    let config = ExecutorConfig {
        hooks_dir: hooks_dir.path().to_path_buf(),
        ..config
    };
    let executor = ActionExecutor::new(config, Arc::new(PassVerifier), reporter.clone());
    executor.refresh_hooks().await.expect("hook discovery");
    (executor, reporter)
}

#[tokio::test]
async fn test_builtin_echo_end_to_end() {
    let hooks = TempDir::new().unwrap();
    let (executor, reporter) = executor_with_hooks(ExecutorConfig::default(), &hooks).await;
    executor.register_builtin(
        "test.echo",
        "returns a fixed greeting",
        Vec::new(),
        Arc::new(|_, _| async { Ok(BuiltinOutput::success("hello")) }.boxed()),
    );

    executor
        .execute(&CancellationToken::new(), NODE, request("e1", "test.echo", "10s"))
        .await;
    wait_for_results(&reporter, 1).await;

    let acks = reporter.acks();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].status, AckStatus::Accepted);

    let result = &reporter.results()[0];
    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, "hello");
}

#[tokio::test]
async fn test_hook_timeout() {
    let hooks = TempDir::new().unwrap();
    write_script(hooks.path(), "sleep.sh", "#!/bin/sh\nexec sleep 30\n");
    let (executor, reporter) = executor_with_hooks(ExecutorConfig::default(), &hooks).await;

    let started = std::time::Instant::now();
    executor
        .execute(&CancellationToken::new(), NODE, request("e1", "sleep.sh", "100ms"))
        .await;
    wait_for_results(&reporter, 1).await;

    let result = &reporter.results()[0];
    assert_eq!(result.status, ExecutionStatus::Timeout);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_hook_nonzero_exit() {
    let hooks = TempDir::new().unwrap();
    write_script(hooks.path(), "fail.sh", "#!/bin/sh\nexit 42\n");
    let (executor, reporter) = executor_with_hooks(ExecutorConfig::default(), &hooks).await;

    executor
        .execute(&CancellationToken::new(), NODE, request("e1", "fail.sh", "10s"))
        .await;
    wait_for_results(&reporter, 1).await;

    let result = &reporter.results()[0];
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.exit_code, 42);
}

#[tokio::test]
async fn test_hook_output_truncation() {
    let hooks = TempDir::new().unwrap();
    write_script(
        hooks.path(),
        "chatty.sh",
        "#!/bin/sh\nhead -c 200 /dev/zero | tr '\\0' 'x'\n",
    );
    let config = ExecutorConfig {
        max_output_bytes: 64,
        ..ExecutorConfig::default()
    };
    let (executor, reporter) = executor_with_hooks(config, &hooks).await;

    executor
        .execute(&CancellationToken::new(), NODE, request("e1", "chatty.sh", "10s"))
        .await;
    wait_for_results(&reporter, 1).await;

    let result = &reporter.results()[0];
    assert_eq!(result.status, ExecutionStatus::Success);
    assert!(result.stdout.len() <= 64 + "\n...[truncated]".len());
    assert!(result.stdout.contains("...[truncated]"));
}

#[tokio::test]
async fn test_hook_concurrency_cap() {
    let hooks = TempDir::new().unwrap();
    write_script(hooks.path(), "sleep.sh", "#!/bin/sh\nexec sleep 30\n");
    let config = ExecutorConfig {
        max_concurrent: 1,
        ..ExecutorConfig::default()
    };
    let (executor, reporter) = executor_with_hooks(config, &hooks).await;

    let parent = CancellationToken::new();
    executor.execute(&parent, NODE, request("e1", "sleep.sh", "30s")).await;
    executor.execute(&parent, NODE, request("e2", "sleep.sh", "30s")).await;

    let acks = reporter.acks();
    assert_eq!(acks.len(), 2);
    assert_eq!(acks[0].status, AckStatus::Accepted);
    assert_eq!(acks[1].status, AckStatus::Rejected);
    assert_eq!(acks[1].reason, Some(RejectReason::MaxConcurrentReached));

    executor.shutdown().await;
    wait_for_results(&reporter, 1).await;
    assert_eq!(reporter.results()[0].status, ExecutionStatus::Cancelled);
}

#[tokio::test]
async fn test_shutdown_terminates_hook_within_grace() {
    let hooks = TempDir::new().unwrap();
    write_script(
        hooks.path(),
        "trap.sh",
        "#!/bin/sh\ntrap 'echo terminated; exit 0' TERM\nwhile true; do sleep 1; done\n",
    );
    let (executor, reporter) = executor_with_hooks(ExecutorConfig::default(), &hooks).await;

    let parent = CancellationToken::new();
    executor.execute(&parent, NODE, request("e1", "trap.sh", "30s")).await;

    // Give the script a moment to install its trap.
    tokio::time::sleep(Duration::from_millis(300)).await;

    let started = std::time::Instant::now();
    executor.shutdown().await;
    assert!(started.elapsed() < Duration::from_secs(5));

    wait_for_results(&reporter, 1).await;
    let result = &reporter.results()[0];
    assert_eq!(result.status, ExecutionStatus::Cancelled);
    assert!(result.stdout.contains("terminated"));

    // Later submissions are turned away.
    executor.execute(&parent, NODE, request("e2", "trap.sh", "10s")).await;
    assert_eq!(reporter.acks().last().unwrap().reason, Some(RejectReason::ShuttingDown));
}

#[tokio::test]
async fn test_hook_minimal_environment_and_parameters() {
    let hooks = TempDir::new().unwrap();
    write_script(
        hooks.path(),
        "env.sh",
        concat!(
            "#!/bin/sh\n",
            "echo \"node=$PLEXD_NODE_ID\"\n",
            "echo \"exec=$PLEXD_EXECUTION_ID\"\n",
            "echo \"param=$PLEXD_PARAM_RELEASE_TAG\"\n",
            "echo \"leak=${PLEXD_LEAK_CANARY:-unset}\"\n",
        ),
    );
    let (executor, reporter) = executor_with_hooks(ExecutorConfig::default(), &hooks).await;

    // Present in the agent's environment, but must not reach the hook.
    std::env::set_var("PLEXD_LEAK_CANARY", "oops");

    let mut req = request("e1", "env.sh", "10s");
    req.parameters.insert("release-tag".into(), "v1.2.3".into());
    executor.execute(&CancellationToken::new(), NODE, req).await;
    wait_for_results(&reporter, 1).await;

    let stdout = &reporter.results()[0].stdout;
    assert!(stdout.contains(&format!("node={}", NODE)));
    assert!(stdout.contains("exec=e1"));
    assert!(stdout.contains("param=v1.2.3"));
    assert!(stdout.contains("leak=unset"));
}

#[tokio::test]
async fn test_hook_checksum_gate() {
    let hooks = TempDir::new().unwrap();
    write_script(hooks.path(), "gated.sh", "#!/bin/sh\necho ran\n");

    let data = TempDir::new().unwrap();
    let reporter = Arc::new(CapturingReporter::default());
    let store = Arc::new(ChecksumStore::open_in(data.path()).unwrap());
    let verifier = Arc::new(IntegrityVerifier::new(
        VerifierConfig::default(),
        store,
        reporter.clone(),
    ));

    let config = ExecutorConfig {
        hooks_dir: hooks.path().to_path_buf(),
        ..ExecutorConfig::default()
    };
    let executor = ActionExecutor::new(config, verifier, reporter.clone());
    let discovered = executor.refresh_hooks().await.unwrap();
    assert_eq!(discovered, 1);

    let good_checksum = plexd::infrastructure::executor::hooks::discover_hooks(hooks.path())
        .await
        .unwrap()[0]
        .checksum
        .clone();

    // Matching checksum: the hook runs.
    let mut req = request("e1", "gated.sh", "10s");
    req.checksum = good_checksum.clone();
    executor.execute(&CancellationToken::new(), NODE, req).await;
    wait_for_results(&reporter, 1).await;
    assert_eq!(reporter.results()[0].status, ExecutionStatus::Success);

    // Wrong checksum: error result plus a hook violation report.
    let mut req = request("e2", "gated.sh", "10s");
    req.checksum = "0".repeat(64);
    executor.execute(&CancellationToken::new(), NODE, req).await;
    wait_for_results(&reporter, 2).await;
    let result = &reporter.results()[1];
    assert_eq!(result.status, ExecutionStatus::Error);
    assert!(result.stderr.contains("integrity check failed"));
    let violations = reporter.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::Hook);

    // Missing checksum: error result, no extra violation.
    let req = request("e3", "gated.sh", "10s");
    executor.execute(&CancellationToken::new(), NODE, req).await;
    wait_for_results(&reporter, 3).await;
    let result = &reporter.results()[2];
    assert_eq!(result.status, ExecutionStatus::Error);
    assert!(result.stderr.contains("integrity verification error"));
    assert_eq!(reporter.violations().len(), 1);
}

#[tokio::test]
async fn test_event_handler_end_to_end() {
    let hooks = TempDir::new().unwrap();
    let (executor, reporter) = executor_with_hooks(ExecutorConfig::default(), &hooks).await;
    executor.register_builtin(
        "test.echo",
        "returns a fixed greeting",
        Vec::new(),
        Arc::new(|_, _| async { Ok(BuiltinOutput::success("hello")) }.boxed()),
    );
    let handler = ActionEventHandler::new(executor, reporter.clone());

    let payload = br#"{"execution_id":"e1","action":"test.echo","timeout":"10s","triggered_by":"controller"}"#;
    let envelope = EventEnvelope::new("evt-1", "action.request", payload.to_vec());
    handler
        .handle(&CancellationToken::new(), NODE, &envelope)
        .await
        .unwrap();

    wait_for_results(&reporter, 1).await;
    let result = &reporter.results()[0];
    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(result.stdout, "hello");
    assert_eq!(result.triggered_by, "controller");
}
