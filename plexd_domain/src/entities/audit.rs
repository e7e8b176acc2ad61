// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Audit Entry Types
//!
//! The normalized outbound audit shape shared by every audit source.
//!
//! ## Overview
//!
//! Heterogeneous sources (operating-system audit, cluster audit, ...) map
//! their native records into [`AuditEntry`]. The forwarder buffers entries,
//! batches them into contiguous slices of at most the configured batch
//! size, and reports each batch upstream in arrival order.
//!
//! ## Normalization Contract
//!
//! - `source` is the stable tag of the producing source (`auditd`,
//!   `k8s-audit`).
//! - `subject` and `object` are opaque JSON-encoded text produced by the
//!   source's structural mapping; the forwarder never inspects them.
//! - `raw` carries the verbatim original line for downstream forensics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome classification of an audited operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditResult {
    Success,
    Failure,
}

impl AuditResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditResult::Success => "success",
            AuditResult::Failure => "failure",
        }
    }

    /// Maps a boolean success flag to the result tag.
    pub fn from_success(ok: bool) -> Self {
        if ok {
            AuditResult::Success
        } else {
            AuditResult::Failure
        }
    }
}

/// A single normalized audit entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuditEntry {
    /// Instant the audited operation occurred (source-provided)
    pub timestamp: DateTime<Utc>,
    /// Stable tag of the producing source, e.g. `auditd` or `k8s-audit`
    pub source: String,
    /// Source-native event type (syscall record type, API verb, ...)
    pub event_type: String,
    /// JSON-encoded description of the acting principal
    pub subject: String,
    /// JSON-encoded description of the acted-upon object
    pub object: String,
    /// The operation performed
    pub action: String,
    pub result: AuditResult,
    /// Hostname of the node that observed the operation
    pub hostname: String,
    /// Verbatim original record line
    pub raw: String,
}

/// A contiguous slice of audit entries reported as one upstream call.
///
/// The forwarder guarantees `len() <= batch_size` for every reported batch.
pub type AuditBatch = Vec<AuditEntry>;
