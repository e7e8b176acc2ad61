// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Operating-System Audit Source
//!
//! Normalizes auditd-style records into [`AuditEntry`] values.
//!
//! ## Mapping
//!
//! - `event_type` ← record `type`
//! - `action` ← `syscall` when present, else `type`
//! - `result` ← `success`
//! - `subject` ← JSON object `{uid, gid, pid}`
//! - `object` ← JSON-encoded object path (`path`, falling back to
//!   `object` when the record has no path)

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use plexd_domain::entities::{AuditEntry, AuditResult};
use plexd_domain::services::AuditSource;
use plexd_domain::AgentError;

use super::{JsonlSpoolReader, RecordReader};

/// Stable source tag for operating-system audit entries.
pub const SOURCE_AUDITD: &str = "auditd";

/// Raw auditd-style record as read from the spool.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditdRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub record_type: String,
    #[serde(default)]
    pub uid: i64,
    #[serde(default)]
    pub gid: i64,
    #[serde(default)]
    pub pid: i64,
    #[serde(default)]
    pub syscall: String,
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub raw: String,
}

/// Audit source over operating-system audit records.
pub struct AuditdSource {
    reader: Arc<dyn RecordReader>,
    hostname: String,
}

impl AuditdSource {
    pub fn new(reader: Arc<dyn RecordReader>) -> Self {
        Self {
            reader,
            hostname: local_hostname(),
        }
    }

    /// Source backed by the default JSON-lines spool reader.
    pub fn from_spool(path: impl AsRef<Path>) -> Self {
        Self::new(Arc::new(JsonlSpoolReader::new(path.as_ref())))
    }

    fn normalize(&self, record: AuditdRecord, line: &str) -> Result<AuditEntry, AgentError> {
        let subject = serde_json::json!({
            "uid": record.uid,
            "gid": record.gid,
            "pid": record.pid,
        })
        .to_string();

        let object_path = if record.path.is_empty() {
            &record.object
        } else {
            &record.path
        };
        let object = serde_json::to_string(object_path)?;

        let action = if record.syscall.is_empty() {
            record.record_type.clone()
        } else {
            record.syscall.clone()
        };

        let raw = if record.raw.is_empty() {
            line.to_string()
        } else {
            record.raw
        };

        Ok(AuditEntry {
            timestamp: record.timestamp,
            source: SOURCE_AUDITD.to_string(),
            event_type: record.record_type,
            subject,
            object,
            action,
            result: AuditResult::from_success(record.success),
            hostname: self.hostname.clone(),
            raw,
        })
    }
}

#[async_trait]
impl AuditSource for AuditdSource {
    fn name(&self) -> &str {
        SOURCE_AUDITD
    }

    async fn collect(&self) -> Result<Vec<AuditEntry>, AgentError> {
        let lines = self
            .reader
            .read_lines()
            .await
            .map_err(|e| AgentError::io_error(format!("{}: {}", SOURCE_AUDITD, e)))?;
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::with_capacity(lines.len());
        for line in &lines {
            match serde_json::from_str::<AuditdRecord>(line) {
                Ok(record) => match self.normalize(record, line) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => warn!(source = SOURCE_AUDITD, error = %e, "skipping unmappable record"),
                },
                Err(e) => warn!(source = SOURCE_AUDITD, error = %e, "skipping malformed record"),
            }
        }
        Ok(entries)
    }
}

pub(crate) fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().into_owned())
        .unwrap_or_default()
}
