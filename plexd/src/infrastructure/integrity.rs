// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Integrity Subsystem
//!
//! SHA-256 baselines for the agent binary and executable hooks: streaming
//! hashing ([`hasher`]), atomic persistence ([`store`]), and the
//! orchestrating verifier with its periodic check loop ([`verifier`]).

pub mod hasher;
pub mod store;
pub mod verifier;

pub use store::ChecksumStore;
pub use verifier::{IntegrityVerifier, VerifierConfig};
