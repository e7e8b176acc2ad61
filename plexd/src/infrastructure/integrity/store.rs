// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Checksum Store
//!
//! Persistent `path → hex-digest` mapping backing integrity baselines.
//!
//! ## Persistence Format
//!
//! A single JSON object file (`checksums.json`) in the agent data
//! directory, mode 0600. Every mutation rewrites the whole map to a
//! temporary sibling and atomically renames it over the target, so a
//! reader never observes a partial file.
//!
//! ## Concurrency
//!
//! The in-memory map is guarded by a `parking_lot::RwLock`. The write lock
//! is held across the file write — the map is small and mutations are
//! infrequent (baseline establishment and operator-driven resets), the one
//! sanctioned exception to the no-I/O-under-lock rule.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use tracing::debug;

use plexd_domain::AgentError;

/// File name of the persisted map inside the data directory.
pub const STORE_FILE_NAME: &str = "checksums.json";

/// Thread-safe persistent checksum map.
#[derive(Debug)]
pub struct ChecksumStore {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl ChecksumStore {
    /// Opens the store at `path`, loading existing content.
    ///
    /// A missing file is an empty store; malformed content is a fatal
    /// load error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, AgentError> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                AgentError::serialization_error(format!("checksum store {}: {}", path.display(), e))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                return Err(AgentError::io_error(format!(
                    "checksum store {}: {}",
                    path.display(),
                    e
                )))
            }
        };

        debug!(path = %path.display(), entries = entries.len(), "checksum store loaded");
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Opens the store at its canonical location inside `data_dir`.
    pub fn open_in(data_dir: &Path) -> Result<Self, AgentError> {
        Self::open(data_dir.join(STORE_FILE_NAME))
    }

    /// Returns the stored digest for `key`, or the empty string when
    /// absent.
    pub fn get(&self, key: &str) -> String {
        self.entries.read().get(key).cloned().unwrap_or_default()
    }

    /// Stores `digest` under `key` and persists the map.
    pub fn set(&self, key: &str, digest: &str) -> Result<(), AgentError> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), digest.to_string());
        self.persist(&entries)
    }

    /// Removes `key` and persists the map. Removing an absent key is a
    /// no-op that still rewrites the file.
    pub fn remove(&self, key: &str) -> Result<(), AgentError> {
        let mut entries = self.entries.write();
        entries.remove(key);
        self.persist(&entries)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    // Writes the full map to a temp sibling, then atomically renames it
    // over the target with mode 0600. Caller holds the write lock.
    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), AgentError> {
        let bytes = serde_json::to_vec_pretty(entries)
            .map_err(|e| AgentError::serialization_error(format!("encode checksum store: {}", e)))?;

        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &bytes)
            .map_err(|e| AgentError::io_error(format!("write {}: {}", tmp.display(), e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| AgentError::io_error(format!("chmod {}: {}", tmp.display(), e)))?;
        }

        std::fs::rename(&tmp, &self.path)
            .map_err(|e| AgentError::io_error(format!("rename {}: {}", self.path.display(), e)))?;

        Ok(())
    }
}
