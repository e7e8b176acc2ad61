// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # File Hashing
//!
//! Streaming SHA-256 over file contents, the foundation of the integrity
//! subsystem.
//!
//! ## Overview
//!
//! Files are hashed incrementally through a fixed 64 KiB buffer, so memory
//! usage is constant regardless of file size. The digest is returned as a
//! 64-character lowercase hex string, the canonical checksum format used
//! by the checksum store, hook discovery, and the hook execution gate.
//!
//! ## Error Semantics
//!
//! - missing file → [`AgentError::NotFound`]
//! - any read failure → [`AgentError::IoError`]
//! - [`verify_file`] with an empty expectation and `require` set →
//!   [`AgentError::ChecksumRequired`]

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use plexd_domain::entities::CheckResult;
use plexd_domain::AgentError;

/// Read buffer size for incremental hashing.
const HASH_BUF_SIZE: usize = 64 * 1024;

/// Streams the file at `path` through SHA-256 and returns the lowercase
/// hex digest.
pub async fn hash_file(path: &Path) -> Result<String, AgentError> {
    let mut file = tokio::fs::File::open(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            AgentError::not_found(format!("{}: {}", path.display(), e))
        } else {
            AgentError::io_error(format!("open {}: {}", path.display(), e))
        }
    })?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; HASH_BUF_SIZE];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| AgentError::io_error(format!("read {}: {}", path.display(), e)))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Hashes `path` and compares against `expected`.
///
/// An empty `expected` is a baseline establishment when `require` is
/// false (result `ok = true`, `expected` left empty for the caller to
/// persist) and an error when `require` is true.
pub async fn verify_file(path: &Path, expected: &str, require: bool) -> Result<CheckResult, AgentError> {
    if expected.is_empty() && require {
        return Err(AgentError::ChecksumRequired(format!(
            "no expected checksum for {}",
            path.display()
        )));
    }

    let actual = hash_file(path).await?;

    if expected.is_empty() {
        return Ok(CheckResult {
            path: path.display().to_string(),
            expected: String::new(),
            actual,
            ok: true,
        });
    }

    let ok = expected == actual;
    Ok(CheckResult {
        path: path.display().to_string(),
        expected: expected.to_string(),
        actual,
        ok,
    })
}
