// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Integrity Verifier
//!
//! Orchestrates baseline establishment, the periodic binary self-check,
//! and the on-demand hook checksum gate.
//!
//! ## Overview
//!
//! The verifier owns the [`ChecksumStore`] and the upstream violation
//! channel:
//!
//! - [`IntegrityVerifier::verify_binary`] hashes the agent binary, caches
//!   the digest for capability reporting, persists a baseline on first
//!   run, and emits a `binary` violation on drift.
//! - [`IntegrityVerifier::verify_hook`] gates hook execution against the
//!   checksum carried by the action request and emits `hook` violations
//!   on mismatch.
//! - [`IntegrityVerifier::run`] drives the periodic binary check until
//!   cancelled. The first tick fires one full interval after startup;
//!   the startup verification is the caller's explicit
//!   `verify_binary` call.
//!
//! ## Failure Semantics
//!
//! Violation reporting is best-effort: a reporter failure is logged at
//! warn and never propagates. Hash failures inside the periodic loop are
//! logged and the loop continues.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{debug, warn};

use plexd_domain::entities::{CheckResult, IntegrityViolation, ViolationKind};
use plexd_domain::services::{HookVerifier, Reporter};
use plexd_domain::AgentError;

use super::hasher;
use super::store::ChecksumStore;

/// Minimum allowed periodic verification interval.
const MIN_VERIFY_INTERVAL: Duration = Duration::from_secs(30);

/// Default periodic verification interval.
const DEFAULT_VERIFY_INTERVAL: Duration = Duration::from_secs(300);

/// Integrity verifier configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VerifierConfig {
    pub enabled: bool,
    /// Path of the agent binary monitored by the periodic check
    pub binary_path: PathBuf,
    /// Tick period of [`IntegrityVerifier::run`]
    #[serde(deserialize_with = "crate::infrastructure::serde_util::duration_from_text")]
    pub verify_interval: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            binary_path: PathBuf::new(),
            verify_interval: DEFAULT_VERIFY_INTERVAL,
        }
    }
}

impl VerifierConfig {
    /// Fills zero fields with their defaults.
    pub fn apply_defaults(&mut self) {
        if self.verify_interval.is_zero() {
            self.verify_interval = DEFAULT_VERIFY_INTERVAL;
        }
    }

    /// Validates bounds. Fatal for the caller before the verifier starts.
    pub fn validate(&self) -> Result<(), AgentError> {
        if !self.enabled {
            return Ok(());
        }
        if self.binary_path.as_os_str().is_empty() {
            return Err(AgentError::invalid_config("integrity: binary_path is required"));
        }
        if self.verify_interval < MIN_VERIFY_INTERVAL {
            return Err(AgentError::invalid_config(format!(
                "integrity: verify_interval must be >= {:?}",
                MIN_VERIFY_INTERVAL
            )));
        }
        Ok(())
    }
}

/// Verifies agent binary and hook integrity against persisted baselines.
pub struct IntegrityVerifier {
    config: VerifierConfig,
    store: Arc<ChecksumStore>,
    reporter: Arc<dyn Reporter>,
    binary_checksum: Mutex<String>,
}

impl IntegrityVerifier {
    pub fn new(config: VerifierConfig, store: Arc<ChecksumStore>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            config,
            store,
            reporter,
            binary_checksum: Mutex::new(String::new()),
        }
    }

    /// Last computed digest of the agent binary; empty before the first
    /// [`verify_binary`](Self::verify_binary) call.
    pub fn binary_checksum(&self) -> String {
        self.binary_checksum.lock().clone()
    }

    /// Hashes the configured binary and checks it against the stored
    /// baseline.
    ///
    /// The first successful run persists the digest as the baseline and
    /// reports `ok`. A later mismatch emits a `binary` violation
    /// (best-effort) and returns `ok = false`; the baseline is left
    /// untouched for forensics.
    pub async fn verify_binary(&self, node_id: &str) -> Result<CheckResult, AgentError> {
        let path = &self.config.binary_path;
        let actual = hasher::hash_file(path).await?;
        *self.binary_checksum.lock() = actual.clone();

        let key = path.display().to_string();
        let expected = self.store.get(&key);

        if expected.is_empty() {
            self.store.set(&key, &actual)?;
            debug!(path = %key, checksum = %actual, "binary integrity baseline established");
            return Ok(CheckResult {
                path: key,
                expected: String::new(),
                actual,
                ok: true,
            });
        }

        let ok = expected == actual;
        if !ok {
            let violation = IntegrityViolation::new(
                ViolationKind::Binary,
                &key,
                &expected,
                &actual,
                "agent binary checksum drifted from persisted baseline",
            );
            self.report_violation(node_id, violation).await;
        }

        Ok(CheckResult {
            path: key,
            expected,
            actual,
            ok,
        })
    }

    /// Runs the periodic binary check until `cancel` fires.
    ///
    /// Returns immediately when disabled. Does not perform an immediate
    /// startup tick; callers wanting a startup verification call
    /// [`verify_binary`](Self::verify_binary) first.
    pub async fn run(&self, node_id: &str, cancel: tokio_util::sync::CancellationToken) -> Result<(), AgentError> {
        if !self.config.enabled {
            debug!("integrity verification disabled");
            return Ok(());
        }

        let period = self.config.verify_interval;
        let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("integrity verifier stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    match self.verify_binary(node_id).await {
                        Ok(result) if !result.ok => {
                            warn!(path = %result.path, "binary integrity check failed");
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!(error = %e, "binary integrity check errored");
                        }
                    }
                }
            }
        }
    }

    async fn report_violation(&self, node_id: &str, violation: IntegrityViolation) {
        if let Err(e) = self.reporter.report_violation(node_id, violation).await {
            warn!(error = %e, "failed to report integrity violation");
        }
    }
}

#[async_trait]
impl HookVerifier for IntegrityVerifier {
    /// Gates hook execution: `Ok(true)` on match, `Ok(false)` on mismatch
    /// (after emitting a `hook` violation), error when `expected` is
    /// empty or the file cannot be hashed.
    async fn verify_hook(&self, node_id: &str, path: &Path, expected: &str) -> Result<bool, AgentError> {
        let result = hasher::verify_file(path, expected, true).await?;
        if !result.ok {
            let violation = IntegrityViolation::new(
                ViolationKind::Hook,
                &result.path,
                &result.expected,
                &result.actual,
                "hook checksum did not match the requested checksum",
            );
            self.report_violation(node_id, violation).await;
        }
        Ok(result.ok)
    }
}
