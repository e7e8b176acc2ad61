// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Plexd Domain
//!
//! Domain layer for the plexd node agent: the pure business types and
//! service contracts shared by the agent core and its collaborators.
//!
//! ## Architecture Overview
//!
//! The agent follows the same hybrid DDD/Clean layering as the rest of our
//! systems:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Application Layer (plexd)                  │
//! │  (Event handlers, delegation to the executor)               │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Domain Layer (this crate)                   │
//! │  (Entities, Errors, Service Ports)                          │
//! └─────────────────────────────────────────────────────────────┘
//!                                │
//! ┌─────────────────────────────────────────────────────────────┐
//! │               Infrastructure Layer (plexd)                  │
//! │  (Executor, Integrity, Audit, Process & File System)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Contents
//!
//! - [`entities`] — action requests/acks/results, hook descriptors,
//!   integrity check outcomes, normalized audit entries, event envelopes
//! - [`error`] — the unified [`AgentError`] type
//! - [`services`] — async ports: [`Reporter`], [`HookVerifier`],
//!   [`AuditSource`]
//!
//! Domain types are synchronous data; the ports are async because they
//! front I/O. Execution-model choices (tokio, process handling, tickers)
//! live entirely in the `plexd` crate.

pub mod entities;
pub mod error;
pub mod services;

pub use entities::{
    AckStatus, ActionInfo, ActionRequest, AuditBatch, AuditEntry, AuditResult, CheckResult,
    EventEnvelope, ExecutionAck, ExecutionResult, ExecutionStatus, HookInfo, HookMetadata,
    HookParameter, IntegrityViolation, RejectReason, ViolationKind, EVENT_TYPE_ACTION_REQUEST,
    HOOK_SOURCE_LOCAL,
};
pub use error::AgentError;
pub use services::{AuditSource, HookVerifier, Reporter};
