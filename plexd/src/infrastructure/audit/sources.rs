// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Audit Sources
//!
//! Reference implementations of the [`plexd_domain::AuditSource`] port and
//! the shared record transport they read from.
//!
//! ## Structure
//!
//! Each source pairs a [`RecordReader`] (where raw record lines come
//! from) with a structural mapping into normalized
//! [`plexd_domain::AuditEntry`] values. The default reader tails a
//! JSON-lines spool file with a persistent byte offset; tests inject
//! in-memory readers.
//!
//! ## Mapping Discipline
//!
//! Reader errors are wrapped with the source tag. A reader that produced
//! nothing yields an empty vec. Individual malformed records are logged
//! at warn and skipped; one bad line never hides its neighbors.

pub mod auditd;
pub mod k8s;

use std::io::SeekFrom;
use std::path::PathBuf;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

use plexd_domain::AgentError;

pub use auditd::AuditdSource;
pub use k8s::K8sAuditSource;

/// Transport abstraction under an audit source: yields the raw record
/// lines accumulated since the previous call.
#[async_trait]
pub trait RecordReader: Send + Sync {
    async fn read_lines(&self) -> Result<Vec<String>, AgentError>;
}

/// Offset-tracking reader over a JSON-lines spool file.
///
/// Remembers the byte position of the last fully consumed line; a
/// truncated spool (log rotation) resets the offset to the start. Only
/// complete lines are consumed, so a partially written record is picked
/// up on the next call.
pub struct JsonlSpoolReader {
    path: PathBuf,
    offset: Mutex<u64>,
}

impl JsonlSpoolReader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            offset: Mutex::new(0),
        }
    }
}

#[async_trait]
impl RecordReader for JsonlSpoolReader {
    async fn read_lines(&self) -> Result<Vec<String>, AgentError> {
        let mut file = match tokio::fs::File::open(&self.path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(AgentError::io_error(format!(
                    "open spool {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        let len = file
            .metadata()
            .await
            .map_err(|e| AgentError::io_error(format!("stat spool {}: {}", self.path.display(), e)))?
            .len();

        let mut start = *self.offset.lock();
        if len < start {
            // Spool rotated or truncated underneath us.
            start = 0;
        }
        if len == start {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| AgentError::io_error(format!("seek spool {}: {}", self.path.display(), e)))?;

        let mut bytes = Vec::with_capacity((len - start) as usize);
        file.read_to_end(&mut bytes)
            .await
            .map_err(|e| AgentError::io_error(format!("read spool {}: {}", self.path.display(), e)))?;

        // Consume only complete lines; a trailing partial record waits
        // for the next call.
        let consumed = match bytes.iter().rposition(|&b| b == b'\n') {
            Some(last_newline) => last_newline + 1,
            None => return Ok(Vec::new()),
        };

        let lines = String::from_utf8_lossy(&bytes[..consumed])
            .lines()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();

        *self.offset.lock() = start + consumed as u64;
        Ok(lines)
    }
}
