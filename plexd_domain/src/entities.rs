// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Domain Entities
//!
//! Core domain types for the plexd node agent: action requests and their
//! acknowledgements/results, hook descriptors, integrity check outcomes,
//! normalized audit entries, and the transport event envelope.

pub mod action;
pub mod audit;
pub mod event;
pub mod hook;
pub mod integrity;

pub use action::{AckStatus, ActionRequest, ExecutionAck, ExecutionResult, ExecutionStatus, RejectReason};
pub use audit::{AuditBatch, AuditEntry, AuditResult};
pub use event::{EventEnvelope, EVENT_TYPE_ACTION_REQUEST};
pub use hook::{ActionInfo, HookInfo, HookMetadata, HookParameter, HOOK_SOURCE_LOCAL};
pub use integrity::{CheckResult, IntegrityViolation, ViolationKind};
