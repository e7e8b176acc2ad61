// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Hook Discovery
//!
//! Scans the hooks directory for executable files, hashes each, and loads
//! optional sidecar metadata.
//!
//! ## Discovery Rules
//!
//! - empty directory argument or nonexistent directory → empty result, no
//!   error; any other directory read failure → error
//! - subdirectories, `.json` sidecars, and files without an executable
//!   permission bit are skipped
//! - a file that cannot be hashed is logged at warn and skipped
//! - a sidecar that cannot be parsed is logged at warn; the hook is still
//!   discovered with empty metadata
//!
//! The result is sorted by name so capability reports are deterministic.

use std::path::Path;

use tracing::warn;

use plexd_domain::entities::{HookInfo, HookMetadata};
use plexd_domain::AgentError;

use crate::infrastructure::integrity::hasher;

/// Extension of sidecar metadata files.
const SIDECAR_EXTENSION: &str = "json";

/// Discovers executable hooks in `dir`, ordered by name.
pub async fn discover_hooks(dir: &Path) -> Result<Vec<HookInfo>, AgentError> {
    if dir.as_os_str().is_empty() {
        return Ok(Vec::new());
    }

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(AgentError::io_error(format!(
                "read hooks dir {}: {}",
                dir.display(),
                e
            )))
        }
    };

    let mut hooks = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AgentError::io_error(format!("read hooks dir {}: {}", dir.display(), e)))?
    {
        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable hooks entry");
                continue;
            }
        };

        if metadata.is_dir() {
            continue;
        }
        if path.extension().and_then(|e| e.to_str()) == Some(SIDECAR_EXTENSION) {
            continue;
        }
        if !is_executable(&metadata) {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let checksum = match hasher::hash_file(&path).await {
            Ok(checksum) => checksum,
            Err(e) => {
                warn!(hook = %name, error = %e, "failed to hash hook, skipping");
                continue;
            }
        };

        let mut hook = HookInfo::new(name, checksum);
        if let Some(meta) = load_sidecar(&path).await {
            hook = hook.with_metadata(meta);
        }
        hooks.push(hook);
    }

    hooks.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(hooks)
}

// Reads `<hook>.json` if present; a parse failure only loses the
// metadata, never the hook.
async fn load_sidecar(hook_path: &Path) -> Option<HookMetadata> {
    let mut sidecar = hook_path.as_os_str().to_owned();
    sidecar.push(".json");
    let sidecar = Path::new(&sidecar);

    let bytes = tokio::fs::read(sidecar).await.ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(meta) => Some(meta),
        Err(e) => {
            warn!(sidecar = %sidecar.display(), error = %e, "invalid hook metadata, ignoring");
            None
        }
    }
}

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    true
}
