// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Audit Forwarder
//!
//! Polls registered audit sources, buffers normalized entries with
//! bounded memory, and reports them upstream in batches.
//!
//! ## Main Loop
//!
//! [`AuditForwarder::run`] performs one immediate collect cycle, then
//! drives two tickers: collect at `collect_interval`, report at
//! `report_interval`. On cancellation it flushes once more (detached from
//! the cancelled context, so a supervisor shutdown never silently drops
//! buffered entries) and returns the cancellation error.
//!
//! ## Bounded Memory
//!
//! The buffer is hard-capped at `2 × batch_size`; overflow drops the
//! oldest excess entries with a single warn log carrying the dropped
//! count.
//!
//! ## Transport Failure Retention
//!
//! A flush splits the detached buffer into contiguous batches reported in
//! arrival order. On the first reporter error the unsent remainder is
//! prepended back into the buffer, ahead of anything collected in the
//! meantime, and capacity is enforced again.
//!
//! ## Source Isolation
//!
//! Each source's collect runs under a panic barrier. A failing or
//! panicking source is logged and skipped for that cycle; its peers are
//! unaffected.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use plexd_domain::entities::AuditEntry;
use plexd_domain::services::{AuditSource, Reporter};
use plexd_domain::AgentError;

use crate::infrastructure::runtime::panic_message;

/// Default source polling period.
pub const DEFAULT_COLLECT_INTERVAL: Duration = Duration::from_secs(5);

/// Default upstream reporting period.
pub const DEFAULT_REPORT_INTERVAL: Duration = Duration::from_secs(15);

/// Default maximum entries per reported batch.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Audit forwarder configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    pub enabled: bool,
    #[serde(deserialize_with = "crate::infrastructure::serde_util::duration_from_text")]
    pub collect_interval: Duration,
    #[serde(deserialize_with = "crate::infrastructure::serde_util::duration_from_text")]
    pub report_interval: Duration,
    pub batch_size: usize,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            collect_interval: DEFAULT_COLLECT_INTERVAL,
            report_interval: DEFAULT_REPORT_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl ForwarderConfig {
    /// Fills zero fields with defaults and applies the zero-value
    /// `enabled` heuristic.
    pub fn apply_defaults(&mut self) {
        let all_zero =
            self.collect_interval.is_zero() && self.report_interval.is_zero() && self.batch_size == 0;

        if self.collect_interval.is_zero() {
            self.collect_interval = DEFAULT_COLLECT_INTERVAL;
        }
        if self.report_interval.is_zero() {
            self.report_interval = DEFAULT_REPORT_INTERVAL;
        }
        if self.batch_size == 0 {
            self.batch_size = DEFAULT_BATCH_SIZE;
        }
        if all_zero && !self.enabled {
            self.enabled = true;
        }
    }

    /// Validates bounds. Fatal for the caller before the forwarder
    /// starts.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.collect_interval < Duration::from_secs(1) {
            return Err(AgentError::invalid_config("audit: collect_interval must be >= 1s"));
        }
        if self.report_interval < self.collect_interval {
            return Err(AgentError::invalid_config(
                "audit: report_interval must be >= collect_interval",
            ));
        }
        if self.batch_size < 1 {
            return Err(AgentError::invalid_config("audit: batch_size must be >= 1"));
        }
        Ok(())
    }
}

/// Collects from registered sources and forwards batches upstream.
pub struct AuditForwarder {
    config: ForwarderConfig,
    node_id: String,
    reporter: Arc<dyn Reporter>,
    sources: Vec<Arc<dyn AuditSource>>,
    buffer: Mutex<Vec<AuditEntry>>,
}

impl AuditForwarder {
    pub fn new(config: ForwarderConfig, node_id: impl Into<String>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            config,
            node_id: node_id.into(),
            reporter,
            sources: Vec::new(),
            buffer: Mutex::new(Vec::new()),
        }
    }

    /// Registers an audit source. Sources are polled in registration
    /// order within each cycle.
    pub fn add_source(&mut self, source: Arc<dyn AuditSource>) {
        self.sources.push(source);
    }

    /// Current buffered entry count.
    pub fn buffer_len(&self) -> usize {
        self.buffer.lock().len()
    }

    /// Runs the collect/report loop until `cancel` fires.
    ///
    /// Returns `Ok(())` immediately when disabled. On cancellation the
    /// buffer is flushed once more and the cancellation error is
    /// returned.
    pub async fn run(&self, cancel: CancellationToken) -> Result<(), AgentError> {
        if !self.config.enabled {
            debug!("audit forwarding disabled");
            return Ok(());
        }

        debug!(
            sources = self.sources.len(),
            batch_size = self.config.batch_size,
            "audit forwarder starting"
        );
        self.collect_cycle().await;

        let collect = self.config.collect_interval;
        let report = self.config.report_interval;
        let mut collect_ticker = tokio::time::interval_at(tokio::time::Instant::now() + collect, collect);
        let mut report_ticker = tokio::time::interval_at(tokio::time::Instant::now() + report, report);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    // Final flush runs detached from the cancelled
                    // context so shutdown never drops buffered entries.
                    self.flush().await;
                    debug!("audit forwarder stopped");
                    return Err(AgentError::cancelled("audit forwarder context cancelled"));
                }
                _ = collect_ticker.tick() => self.collect_cycle().await,
                _ = report_ticker.tick() => self.flush().await,
            }
        }
    }

    /// Polls every source once, appending successful results to the
    /// buffer.
    pub async fn collect_cycle(&self) {
        for source in &self.sources {
            let name = source.name().to_string();
            match AssertUnwindSafe(source.collect()).catch_unwind().await {
                Err(panic) => {
                    warn!(source = %name, panic = %panic_message(panic), "audit source panicked");
                }
                Ok(Err(e)) => {
                    warn!(source = %name, error = %e, "audit source collect failed");
                }
                Ok(Ok(entries)) => {
                    if entries.is_empty() {
                        continue;
                    }
                    debug!(source = %name, count = entries.len(), "collected audit entries");
                    let mut buffer = self.buffer.lock();
                    buffer.extend(entries);
                    enforce_capacity(&mut buffer, self.config.batch_size);
                }
            }
        }
    }

    /// Detaches the buffer and reports it in batches of at most
    /// `batch_size`, in arrival order.
    pub async fn flush(&self) {
        let snapshot: Vec<AuditEntry> = std::mem::take(&mut *self.buffer.lock());
        if snapshot.is_empty() {
            return;
        }

        let batch_size = self.config.batch_size;
        let mut index = 0;
        while index < snapshot.len() {
            let end = (index + batch_size).min(snapshot.len());
            let batch = snapshot[index..end].to_vec();
            match self.reporter.report_audit(&self.node_id, batch).await {
                Ok(()) => index = end,
                Err(e) => {
                    warn!(error = %e, unsent = snapshot.len() - index, "audit report failed, retaining entries");
                    let mut buffer = self.buffer.lock();
                    let mut retained = snapshot[index..].to_vec();
                    retained.append(&mut buffer);
                    *buffer = retained;
                    enforce_capacity(&mut buffer, batch_size);
                    return;
                }
            }
        }
    }
}

// Hard cap: 2 × batch size. Oldest entries go first.
fn enforce_capacity(buffer: &mut Vec<AuditEntry>, batch_size: usize) {
    let cap = 2 * batch_size;
    if buffer.len() > cap {
        let dropped = buffer.len() - cap;
        buffer.drain(..dropped);
        warn!(dropped, "audit buffer over capacity, dropped oldest entries");
    }
}
