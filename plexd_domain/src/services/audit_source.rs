// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Audit Source Port
//!
//! A pluggable producer of normalized audit entries. The forwarder polls
//! every registered source on each collect tick; a failing or panicking
//! source is logged and skipped without affecting its peers.

use async_trait::async_trait;

use crate::entities::AuditEntry;
use crate::error::AgentError;

/// A single audit source (operating-system audit, cluster audit, ...).
///
/// `collect` drains whatever records accumulated since the previous call
/// and returns them already normalized. An empty vec is the normal "nothing
/// new" answer; errors are wrapped with the source tag by the
/// implementation.
#[async_trait]
pub trait AuditSource: Send + Sync {
    /// Stable tag identifying this source (e.g. `auditd`).
    fn name(&self) -> &str;

    /// Collects and normalizes records accumulated since the last call.
    async fn collect(&self) -> Result<Vec<AuditEntry>, AgentError>;
}
