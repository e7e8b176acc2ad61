// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! Shared unit-test doubles for the agent core.

use std::path::Path;

use async_trait::async_trait;
use parking_lot::Mutex;

use plexd_domain::entities::{AuditBatch, ExecutionAck, ExecutionResult, IntegrityViolation};
use plexd_domain::services::{HookVerifier, Reporter};
use plexd_domain::AgentError;

/// Capturing reporter double with scriptable audit-report failures.
#[derive(Default)]
pub struct MockReporter {
    acks: Mutex<Vec<ExecutionAck>>,
    results: Mutex<Vec<ExecutionResult>>,
    violations: Mutex<Vec<IntegrityViolation>>,
    audit_batches: Mutex<Vec<AuditBatch>>,
    fail_audit_reports: Mutex<u32>,
}

impl MockReporter {
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

    /// Makes the next `n` audit report calls fail with a transport error.
    pub fn fail_next_audit_reports(&self, n: u32) {
        *self.fail_audit_reports.lock() = n;
    }
}

#[async_trait]
impl Reporter for MockReporter {
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

/// Hook verifier double with a scriptable verdict.
pub struct MockHookVerifier {
    verdict: Mutex<Result<bool, AgentError>>,
}

impl Default for MockHookVerifier {
    fn default() -> Self {
        Self {
            verdict: Mutex::new(Ok(true)),
        }
    }
}

impl MockHookVerifier {
    pub fn set_verdict(&self, verdict: Result<bool, AgentError>) {
        *self.verdict.lock() = verdict;
    }
}

#[async_trait]
impl HookVerifier for MockHookVerifier {
    async fn verify_hook(&self, _node_id: &str, _path: &Path, _expected: &str) -> Result<bool, AgentError> {
        self.verdict.lock().clone()
    }
}
