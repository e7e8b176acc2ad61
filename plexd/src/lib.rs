// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

// Production code safety enforced via CI and `make lint-strict`
// (lib checked separately from tests - tests may use unwrap/expect)

//! # Plexd Node Agent Core
//!
//! The node-agent core of a mesh-managed compute fleet. A controller
//! dispatches signed events to each agent; the agent runs the requested
//! work locally and reports results through the [`Reporter`] port.
//!
//! ## Subsystems
//!
//! - **Action Execution Engine**
//!   ([`infrastructure::executor`]): accepts remote action requests,
//!   enforces concurrency and duplicate-id admission, executes builtin
//!   handlers or external hook scripts with bounded output capture,
//!   cancellation, timeout, and panic isolation, and reports results.
//! - **Integrity Subsystem** ([`infrastructure::integrity`]): computes and
//!   persists SHA-256 baselines for the agent binary and executable hooks,
//!   verifies them on a periodic timer, reports tamper violations, and
//!   gates hook execution by checksum match.
//! - **Audit Forwarder** ([`infrastructure::audit`]): periodically polls
//!   pluggable audit sources, buffers heterogeneous entries with bounded
//!   memory, batches them, and reports them upstream with retention on
//!   transport failure and oldest-drop on overflow.
//!
//! The [`application`] layer holds the event handler that adapts transport
//! envelopes into executor calls.
//!
//! ## Lifecycle
//!
//! Each long-running piece (executor, verifier loop, forwarder loop) is
//! owned by the embedding process and driven by a
//! `tokio_util::sync::CancellationToken`. Cancellation composes as a tree:
//! supervisor token → per-action child token → hook process. Transport,
//! configuration loading, and signal wiring live outside this crate.
//!
//! ## Collaborator Ports
//!
//! The core depends only on the `plexd-domain` ports: [`Reporter`] for
//! everything outbound, [`plexd_domain::AuditSource`] for audit input, and
//! [`plexd_domain::HookVerifier`] as the executor's integrity gate
//! (implemented here by
//! [`infrastructure::integrity::IntegrityVerifier`]).

pub mod application;
pub mod infrastructure;

#[cfg(test)]
pub(crate) mod test_support;

pub use plexd_domain::{AgentError, Reporter};
