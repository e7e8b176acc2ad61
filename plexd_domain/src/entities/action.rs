// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Action Types
//!
//! This module provides the wire-level types for remote action execution:
//! the inbound [`ActionRequest`], the immediate [`ExecutionAck`], and the
//! terminal [`ExecutionResult`].
//!
//! ## Overview
//!
//! The controller dispatches an action request to the agent; the agent
//! answers with exactly one acknowledgement (accepted or rejected) and, for
//! accepted requests, exactly one result on completion. Rejected requests
//! never produce a result.
//!
//! ## Protocol Contract
//!
//! - **Ack-before-result**: for a given `execution_id` the ack is always
//!   sent before the result.
//! - **Closed reject set**: [`RejectReason`] is the complete admission
//!   error taxonomy; reasons serialize to their exact snake_case wire
//!   strings (`shutting_down`, `duplicate_execution_id`, ...).
//! - **Status classification**: [`ExecutionStatus`] distinguishes handler
//!   failure (`failed`), deadline expiry (`timeout`), supervisor
//!   cancellation (`cancelled`), and infrastructure faults (`error`).
//!
//! ## Serialization
//!
//! All types round-trip through JSON with snake_case field and variant
//! names, matching the controller's payload encoding.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inbound request to execute a named action on this node.
///
/// The payload of an `action.request` event. `execution_id` must be unique
/// per attempt and non-empty; the executor enforces at most one in-flight
/// execution per id. `checksum` is only meaningful for hook actions, where
/// it carries the digest the hook file must match before it may run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionRequest {
    /// Unique identifier for this execution attempt
    pub execution_id: String,
    /// Action name: a builtin (e.g. `agent.info`) or a hook file name
    pub action: String,
    /// Optional human duration text (e.g. "30s"), clamped by the executor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    /// Expected hook checksum (hex); empty for builtins
    #[serde(default)]
    pub checksum: String,
    /// Free-form string parameters handed to the handler
    #[serde(default)]
    pub parameters: HashMap<String, String>,
    /// Opaque identifier of the principal that triggered the action
    #[serde(default)]
    pub triggered_by: String,
}

/// Admission decision status for an [`ExecutionAck`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckStatus {
    Accepted,
    Rejected,
}

/// Closed set of admission rejection reasons.
///
/// These are the only reasons the executor ever rejects a request; they
/// serialize to the exact wire strings consumed by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    ShuttingDown,
    DuplicateExecutionId,
    MaxConcurrentReached,
    UnknownAction,
    ActionsDisabled,
}

impl RejectReason {
    /// Wire string for this reason, as it appears in the ack payload.
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::ShuttingDown => "shutting_down",
            RejectReason::DuplicateExecutionId => "duplicate_execution_id",
            RejectReason::MaxConcurrentReached => "max_concurrent_reached",
            RejectReason::UnknownAction => "unknown_action",
            RejectReason::ActionsDisabled => "actions_disabled",
        }
    }
}

/// Immediate acknowledgement of an [`ActionRequest`].
///
/// Every request produces exactly one ack. `reason` is populated only for
/// rejections.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionAck {
    pub execution_id: String,
    pub status: AckStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
}

impl ExecutionAck {
    /// Builds an accepted ack for the given execution.
    pub fn accepted(execution_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            status: AckStatus::Accepted,
            reason: None,
        }
    }

    /// Builds a rejected ack with the given reason.
    pub fn rejected(execution_id: impl Into<String>, reason: RejectReason) -> Self {
        Self {
            execution_id: execution_id.into(),
            status: AckStatus::Rejected,
            reason: Some(reason),
        }
    }
}

/// Terminal status of an accepted execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    /// Handler completed with exit code zero
    Success,
    /// Handler completed with a non-zero exit code
    Failed,
    /// The per-action deadline expired before completion
    Timeout,
    /// The execution was cancelled by the supervisor or shutdown
    Cancelled,
    /// The run failed before or outside the handler (spawn failure,
    /// integrity gate, panic, ...)
    Error,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Timeout => "timeout",
            ExecutionStatus::Cancelled => "cancelled",
            ExecutionStatus::Error => "error",
        }
    }
}

/// Terminal report for an accepted execution.
///
/// Exactly one result is produced per accepted request. `stdout` and
/// `stderr` may be truncated by the executor's output cap, in which case
/// they end with the `...[truncated]` marker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExecutionResult {
    pub execution_id: String,
    pub status: ExecutionStatus,
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    /// Human-readable wall-clock duration of the run (e.g. "1s 230ms")
    pub duration: String,
    /// UTC instant the run finished
    pub finished_at: DateTime<Utc>,
    /// Echo of the request's `triggered_by`
    pub triggered_by: String,
}
