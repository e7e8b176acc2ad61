// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Integrity Types
//!
//! Outcomes of checksum verification: the per-check [`CheckResult`] and the
//! upstream [`IntegrityViolation`] report emitted on tamper detection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of a single checksum verification.
///
/// `expected` is empty when the check established a fresh baseline, in
/// which case `ok` is true by definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CheckResult {
    pub path: String,
    pub expected: String,
    pub actual: String,
    pub ok: bool,
}

impl CheckResult {
    /// True when this result established a baseline rather than comparing
    /// against one.
    pub fn is_baseline(&self) -> bool {
        self.expected.is_empty() && self.ok
    }
}

/// Kind of monitored artifact a violation refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    Binary,
    Hook,
}

impl ViolationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViolationKind::Binary => "binary",
            ViolationKind::Hook => "hook",
        }
    }
}

/// Tamper report sent upstream when a computed digest does not match the
/// persisted baseline (binary) or the requested checksum (hook).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IntegrityViolation {
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub path: String,
    pub expected_checksum: String,
    pub actual_checksum: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl IntegrityViolation {
    /// Builds a violation stamped with the current UTC time.
    pub fn new(
        kind: ViolationKind,
        path: impl Into<String>,
        expected: impl Into<String>,
        actual: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            path: path.into(),
            expected_checksum: expected.into(),
            actual_checksum: actual.into(),
            detail: detail.into(),
            timestamp: Utc::now(),
        }
    }
}
