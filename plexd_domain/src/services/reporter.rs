// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Upstream Reporter Port
//!
//! The contract through which the agent core talks back to the controller:
//! execution acknowledgements and results, integrity violations, and audit
//! batches.
//!
//! ## Failure Semantics
//!
//! Implementations surface transport failures as [`AgentError`]; callers in
//! the core absorb those failures (warn log, no propagation). The audit
//! forwarder additionally retains unsent entries in its buffer so a
//! transient transport failure loses no data.
//!
//! ## Ordering
//!
//! For a given `execution_id` the core always calls `ack_execution` before
//! `report_result`. Within one flush, audit batches are reported in arrival
//! order.

use async_trait::async_trait;

use crate::entities::{AuditBatch, ExecutionAck, ExecutionResult, IntegrityViolation};
use crate::error::AgentError;

/// Upstream reporting contract implemented by the event-transport
/// collaborator.
#[async_trait]
pub trait Reporter: Send + Sync {
    /// Sends the immediate admission decision for an execution.
    async fn ack_execution(
        &self,
        node_id: &str,
        execution_id: &str,
        ack: ExecutionAck,
    ) -> Result<(), AgentError>;

    /// Sends the terminal result of an accepted execution.
    async fn report_result(
        &self,
        node_id: &str,
        execution_id: &str,
        result: ExecutionResult,
    ) -> Result<(), AgentError>;

    /// Sends a tamper violation report.
    async fn report_violation(&self, node_id: &str, report: IntegrityViolation) -> Result<(), AgentError>;

    /// Sends one batch of normalized audit entries.
    async fn report_audit(&self, node_id: &str, batch: AuditBatch) -> Result<(), AgentError>;
}
