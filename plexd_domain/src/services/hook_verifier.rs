// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Hook Verifier Port
//!
//! The integrity gate the executor consults before launching a hook
//! process. Implemented by the integrity verifier; mockable in tests.

use std::path::Path;

use async_trait::async_trait;

use crate::error::AgentError;

/// Checksum gate for hook execution.
///
/// `verify_hook` returns `Ok(true)` on digest match, `Ok(false)` on
/// mismatch (the implementation reports the violation itself), and an
/// error when `expected` is empty or the file cannot be hashed.
#[async_trait]
pub trait HookVerifier: Send + Sync {
    async fn verify_hook(&self, node_id: &str, path: &Path, expected: &str) -> Result<bool, AgentError>;
}
