// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Hook Descriptors
//!
//! Types describing executable hooks discovered in the hooks directory and
//! the capability metadata reported upstream.
//!
//! A hook is an arbitrary executable gated by checksum verification. Each
//! hook may carry an optional sidecar file `<hook>.json` whose shape is
//! [`HookMetadata`]; a malformed sidecar leaves the metadata empty without
//! hiding the hook itself.

use serde::{Deserialize, Serialize};

/// Source tag for hooks discovered on the local filesystem.
pub const HOOK_SOURCE_LOCAL: &str = "local";

/// Descriptor of a single named hook parameter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HookParameter {
    pub name: String,
    #[serde(default)]
    pub r#type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: String,
}

/// Optional sidecar metadata co-located as `<hook>.json`.
///
/// All fields are optional; invalid JSON in the sidecar is treated as if
/// the file were absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct HookMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<HookParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<String>,
}

/// A discovered hook: executable file plus its digest and optional
/// sidecar metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HookInfo {
    /// File name of the executable inside the hooks directory
    pub name: String,
    /// Always [`HOOK_SOURCE_LOCAL`] for filesystem hooks
    pub source: String,
    /// Lowercase hex SHA-256 of the hook file at discovery time
    pub checksum: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<HookParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<String>,
}

impl HookInfo {
    /// Builds a bare hook descriptor with no sidecar metadata.
    pub fn new(name: impl Into<String>, checksum: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: HOOK_SOURCE_LOCAL.to_string(),
            checksum: checksum.into(),
            description: None,
            parameters: Vec::new(),
            timeout: None,
            sandbox: None,
        }
    }

    /// Merges sidecar metadata into this descriptor.
    pub fn with_metadata(mut self, meta: HookMetadata) -> Self {
        self.description = meta.description;
        self.parameters = meta.parameters;
        self.timeout = meta.timeout;
        self.sandbox = meta.sandbox;
        self
    }
}

/// Capability descriptor for a single action (builtin or hook), reported
/// upstream so the controller knows what this node can run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActionInfo {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<HookParameter>,
}

impl From<&HookInfo> for ActionInfo {
    fn from(hook: &HookInfo) -> Self {
        Self {
            name: hook.name.clone(),
            description: hook.description.clone().unwrap_or_default(),
            parameters: hook.parameters.clone(),
        }
    }
}
