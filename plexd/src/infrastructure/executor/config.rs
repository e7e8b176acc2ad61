// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Executor Configuration
//!
//! Bounds and defaults for the action execution engine.
//!
//! ## Zero-Value Heuristic
//!
//! Deserialized configs distinguish "operator explicitly disabled actions"
//! from "operator configured nothing": when every bounded field is zero
//! and `enabled` is false, [`ExecutorConfig::apply_defaults`] flips
//! `enabled` to true. A config with any bounded field set keeps its
//! explicit `enabled` value.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use plexd_domain::AgentError;

/// Default maximum number of concurrently running actions.
pub const DEFAULT_MAX_CONCURRENT: usize = 5;

/// Default (and maximum default) per-action timeout.
pub const DEFAULT_MAX_ACTION_TIMEOUT: Duration = Duration::from_secs(600);

/// Default cap for each captured output stream.
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Action execution engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub enabled: bool,
    /// Directory scanned for executable hooks; empty disables hooks
    pub hooks_dir: PathBuf,
    /// Upper bound on concurrently running actions
    pub max_concurrent: usize,
    /// Upper clamp for per-action timeouts
    #[serde(deserialize_with = "crate::infrastructure::serde_util::duration_from_text")]
    pub max_action_timeout: Duration,
    /// Per-stream output capture cap in bytes
    pub max_output_bytes: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            hooks_dir: PathBuf::new(),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_action_timeout: DEFAULT_MAX_ACTION_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl ExecutorConfig {
    /// Fills zero fields with defaults and applies the zero-value
    /// `enabled` heuristic.
    pub fn apply_defaults(&mut self) {
        let all_zero =
            self.max_concurrent == 0 && self.max_action_timeout.is_zero() && self.max_output_bytes == 0;

        if self.max_concurrent == 0 {
            self.max_concurrent = DEFAULT_MAX_CONCURRENT;
        }
        if self.max_action_timeout.is_zero() {
            self.max_action_timeout = DEFAULT_MAX_ACTION_TIMEOUT;
        }
        if self.max_output_bytes == 0 {
            self.max_output_bytes = DEFAULT_MAX_OUTPUT_BYTES;
        }
        if all_zero && !self.enabled {
            self.enabled = true;
        }
    }

    /// Validates bounds. Fatal for the caller before the executor starts.
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.max_concurrent < 1 {
            return Err(AgentError::invalid_config("executor: max_concurrent must be >= 1"));
        }
        if self.max_action_timeout < Duration::from_secs(10) {
            return Err(AgentError::invalid_config(
                "executor: max_action_timeout must be >= 10s",
            ));
        }
        if self.max_output_bytes < 1024 {
            return Err(AgentError::invalid_config(
                "executor: max_output_bytes must be >= 1024",
            ));
        }
        Ok(())
    }
}
