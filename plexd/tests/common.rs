// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Common Test Helpers
//!
//! Shared doubles and fixtures for the agent core integration tests.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use plexd_domain::entities::{AuditBatch, ExecutionAck, ExecutionResult, IntegrityViolation};
use plexd_domain::services::{HookVerifier, Reporter};
use plexd_domain::AgentError;

/// Capturing reporter double shared by the integration suites.
#[derive(Default)]
pub struct CapturingReporter {
    acks: Mutex<Vec<ExecutionAck>>,
    results: Mutex<Vec<ExecutionResult>>,
    violations: Mutex<Vec<IntegrityViolation>>,
    audit_batches: Mutex<Vec<AuditBatch>>,
    audit_attempts: Mutex<usize>,
    fail_audit_reports: Mutex<u32>,
}

impl CapturingReporter {
    pub fn acks(&self) -> Vec<ExecutionAck> {
        self.acks.lock().clone()
    }

    pub fn results(&self) -> Vec<ExecutionResult> {
        self.results.lock().clone()
    }

    pub fn violations(&self) -> Vec<IntegrityViolation> {
        self.violations.lock().clone()
    }

    pub fn audit_batches(&self) -> Vec<AuditBatch> {
        self.audit_batches.lock().clone()
    }

    /// Number of `report_audit` calls attempted, including failed ones.
    pub fn audit_attempts(&self) -> usize {
        *self.audit_attempts.lock()
    }

    /// Makes the next `n` audit report calls fail with a transport error.
    pub fn fail_next_audit_reports(&self, n: u32) {
        *self.fail_audit_reports.lock() = n;
    }
}

#[async_trait]
impl Reporter for CapturingReporter {
    async fn ack_execution(
        &self,
        _node_id: &str,
        _execution_id: &str,
        ack: ExecutionAck,
    ) -> Result<(), AgentError> {
        self.acks.lock().push(ack);
        Ok(())
    }

    async fn report_result(
        &self,
        _node_id: &str,
        _execution_id: &str,
        result: ExecutionResult,
    ) -> Result<(), AgentError> {
        self.results.lock().push(result);
        Ok(())
    }

    async fn report_violation(&self, _node_id: &str, report: IntegrityViolation) -> Result<(), AgentError> {
        self.violations.lock().push(report);
        Ok(())
    }

    async fn report_audit(&self, _node_id: &str, batch: AuditBatch) -> Result<(), AgentError> {
        *self.audit_attempts.lock() += 1;
        {
            let mut remaining = self.fail_audit_reports.lock();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AgentError::transport_error("injected audit transport failure"));
            }
        }
        self.audit_batches.lock().push(batch);
        Ok(())
    }
}

/// Hook verifier that always passes, for tests not exercising the gate.
pub struct PassVerifier;

#[async_trait]
impl HookVerifier for PassVerifier {
    async fn verify_hook(&self, _node_id: &str, _path: &Path, _expected: &str) -> Result<bool, AgentError> {
        Ok(true)
    }
}

/// Writes an executable shell script into `dir` and returns its path.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, body).expect("write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod script");
    path
}

/// Installs a fmt subscriber once so failing runs can be replayed with
/// structured logs.
pub fn init_test_logging() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    });
}

/// Polls `predicate` every 10 ms until it holds or `deadline` elapses.
pub async fn wait_until<F>(deadline: Duration, mut predicate: F)
where
    F: FnMut() -> bool,
{
    let started = std::time::Instant::now();
    while started.elapsed() < deadline {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within {:?}", deadline);
}

/// Convenience: waits until the reporter holds `n` results.
pub async fn wait_for_results(reporter: &Arc<CapturingReporter>, n: usize) {
    let reporter = reporter.clone();
    wait_until(Duration::from_secs(10), move || reporter.results().len() >= n).await;
}
