// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Cluster Audit Source
//!
//! Normalizes Kubernetes-style API audit records into [`AuditEntry`]
//! values.
//!
//! ## Mapping
//!
//! - `event_type` and `action` ← `verb`
//! - `result` ← success iff `200 <= response_status < 300`
//! - `subject` ← JSON-encoded `user`
//! - `object` ← JSON-encoded `"[namespace/]resource[/name]"` with empty
//!   segments omitted

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use plexd_domain::entities::{AuditEntry, AuditResult};
use plexd_domain::services::AuditSource;
use plexd_domain::AgentError;

use super::auditd::local_hostname;
use super::{JsonlSpoolReader, RecordReader};

/// Stable source tag for cluster audit entries.
pub const SOURCE_K8S_AUDIT: &str = "k8s-audit";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct K8sUser {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub groups: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct K8sObjectRef {
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub name: String,
}

/// Raw cluster audit record as read from the spool.
#[derive(Debug, Clone, Deserialize)]
pub struct K8sAuditRecord {
    pub timestamp: DateTime<Utc>,
    pub verb: String,
    #[serde(default)]
    pub user: K8sUser,
    #[serde(default)]
    pub object_ref: K8sObjectRef,
    #[serde(default)]
    pub request_uri: String,
    #[serde(default)]
    pub response_status: u16,
    #[serde(default)]
    pub raw: String,
}

/// Audit source over cluster API audit records.
pub struct K8sAuditSource {
    reader: Arc<dyn RecordReader>,
    hostname: String,
}

impl K8sAuditSource {
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

    fn normalize(&self, record: K8sAuditRecord, line: &str) -> Result<AuditEntry, AgentError> {
        let subject = serde_json::to_string(&record.user)?;
        let object = serde_json::to_string(&object_path(&record.object_ref))?;

        let result = if (200..300).contains(&record.response_status) {
            AuditResult::Success
        } else {
            AuditResult::Failure
        };

        let raw = if record.raw.is_empty() {
            line.to_string()
        } else {
            record.raw
        };

        Ok(AuditEntry {
            timestamp: record.timestamp,
            source: SOURCE_K8S_AUDIT.to_string(),
            event_type: record.verb.clone(),
            subject,
            object,
            action: record.verb,
            result,
            hostname: self.hostname.clone(),
            raw,
        })
    }
}

#[async_trait]
impl AuditSource for K8sAuditSource {
    fn name(&self) -> &str {
        SOURCE_K8S_AUDIT
    }

    async fn collect(&self) -> Result<Vec<AuditEntry>, AgentError> {
        let lines = self
            .reader
            .read_lines()
            .await
            .map_err(|e| AgentError::io_error(format!("{}: {}", SOURCE_K8S_AUDIT, e)))?;
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::with_capacity(lines.len());
        for line in &lines {
            match serde_json::from_str::<K8sAuditRecord>(line) {
                Ok(record) => match self.normalize(record, line) {
                    Ok(entry) => entries.push(entry),
                    Err(e) => warn!(source = SOURCE_K8S_AUDIT, error = %e, "skipping unmappable record"),
                },
                Err(e) => warn!(source = SOURCE_K8S_AUDIT, error = %e, "skipping malformed record"),
            }
        }
        Ok(entries)
    }
}

// "[namespace/]resource[/name]" with empty segments omitted.
fn object_path(object_ref: &K8sObjectRef) -> String {
    let mut segments = Vec::new();
    if !object_ref.namespace.is_empty() {
        segments.push(object_ref.namespace.as_str());
    }
    if !object_ref.resource.is_empty() {
        segments.push(object_ref.resource.as_str());
    }
    if !object_ref.name.is_empty() {
        segments.push(object_ref.name.as_str());
    }
    segments.join("/")
}
