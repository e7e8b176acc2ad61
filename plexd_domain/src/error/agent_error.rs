// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Agent Error Types
//!
//! This module provides the unified error type for the plexd node agent
//! core. Every fallible operation in the executor, integrity, and audit
//! subsystems returns [`AgentError`], keeping error handling consistent
//! across layer boundaries.
//!
//! ## Overview
//!
//! The error system provides:
//!
//! - **Categorized Variants**: Each variant represents a specific failure
//!   mode (configuration, validation, I/O, integrity, transport, ...)
//! - **Helper Constructors**: Ergonomic creation from string messages
//! - **Error Classification**: `category()` and `is_recoverable()` for
//!   systematic handling and structured logging
//! - **Standard Conversions**: Automatic conversion from `std::io::Error`
//!   and `serde_json::Error`
//!
//! ## Propagation Policy
//!
//! Reporter (transport) failures are absorbed by the calling component and
//! logged at warn; they never tear down a subsystem. Configuration errors
//! are fatal for the caller before the component starts. Handler panics are
//! recovered at the execution boundary and converted into `error` results
//! rather than surfacing as `AgentError` at all.
//!
//! ## Usage
//!
//! ```rust
//! use plexd_domain::AgentError;
//!
//! fn require_id(id: &str) -> Result<(), AgentError> {
//!     if id.is_empty() {
//!         return Err(AgentError::validation_error("execution_id is required"));
//!     }
//!     Ok(())
//! }
//!
//! assert_eq!(require_id("").unwrap_err().category(), "validation");
//! ```

use thiserror::Error;

/// Domain-specific errors for the plexd node agent core.
///
/// Each variant carries a descriptive message. Variants are grouped by the
/// subsystem taxonomy: admission and validation failures, execution
/// failures, integrity failures, transport failures, and resource failures.
#[derive(Error, Debug, Clone)]
pub enum AgentError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Integrity check failed: {0}")]
    IntegrityError(String),

    #[error("Checksum required: {0}")]
    ChecksumRequired(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Transport error: {0}")]
    TransportError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl AgentError {
    /// Creates a new configuration error
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfiguration(msg.into())
    }

    /// Creates a new validation error
    pub fn validation_error(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    /// Creates a new not-found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Creates a new IO error
    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::IoError(msg.into())
    }

    /// Creates a new serialization error
    pub fn serialization_error(msg: impl Into<String>) -> Self {
        Self::SerializationError(msg.into())
    }

    /// Creates a new integrity error
    pub fn integrity_error(msg: impl Into<String>) -> Self {
        Self::IntegrityError(msg.into())
    }

    /// Creates a new execution error
    pub fn execution_failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Creates a new timeout error
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::TimeoutError(msg.into())
    }

    /// Creates a new cancellation error
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Creates a new transport error
    pub fn transport_error(msg: impl Into<String>) -> Self {
        Self::TransportError(msg.into())
    }

    /// Creates a new internal error
    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::InternalError(msg.into())
    }

    /// Checks if the error indicates a retry-able condition
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::TimeoutError(_) | AgentError::IoError(_) | AgentError::TransportError(_)
        )
    }

    /// Gets the error category for structured logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            AgentError::InvalidConfiguration(_) => "configuration",
            AgentError::ValidationError(_) => "validation",
            AgentError::NotFound(_) => "not_found",
            AgentError::IoError(_) => "io",
            AgentError::SerializationError(_) => "serialization",
            AgentError::IntegrityError(_) => "integrity",
            AgentError::ChecksumRequired(_) => "integrity",
            AgentError::ExecutionFailed(_) => "execution",
            AgentError::TimeoutError(_) => "timeout",
            AgentError::Cancelled(_) => "cancellation",
            AgentError::TransportError(_) => "transport",
            AgentError::InternalError(_) => "internal",
        }
    }
}

// Implement conversion from standard library errors
impl From<std::io::Error> for AgentError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            AgentError::NotFound(err.to_string())
        } else {
            AgentError::IoError(err.to_string())
        }
    }
}

impl From<serde_json::Error> for AgentError {
    fn from(err: serde_json::Error) -> Self {
        AgentError::SerializationError(err.to_string())
    }
}
