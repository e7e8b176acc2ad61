// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Integrity Integration Tests
//!
//! Baseline persistence across verifier instances and tamper detection
//! through the periodic check loop.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use plexd::infrastructure::integrity::{ChecksumStore, IntegrityVerifier, VerifierConfig};
use plexd_domain::entities::ViolationKind;

use crate::common::{wait_until, CapturingReporter};

const NODE: &str = "node-itest";

#[tokio::test]
async fn test_baseline_survives_restart() {
    let dir = TempDir::new().unwrap();
    let binary = dir.path().join("agent");
    tokio::fs::write(&binary, b"release-1").await.unwrap();

    let config = VerifierConfig {
        enabled: true,
        binary_path: binary.clone(),
        verify_interval: Duration::from_secs(300),
    };

    let reporter = Arc::new(CapturingReporter::default());
    let baseline = {
        let store = Arc::new(ChecksumStore::open_in(dir.path()).unwrap());
        let verifier = IntegrityVerifier::new(config.clone(), store, reporter.clone());
        verifier.verify_binary(NODE).await.unwrap()
    };
    assert!(baseline.is_baseline());

    // A fresh verifier over the same data dir sees the persisted
    // baseline and stays quiet while the binary is unchanged.
    let store = Arc::new(ChecksumStore::open_in(dir.path()).unwrap());
    let verifier = IntegrityVerifier::new(config, store, reporter.clone());
    let result = verifier.verify_binary(NODE).await.unwrap();
    assert!(result.ok);
    assert_eq!(result.expected, baseline.actual);
    assert!(reporter.violations().is_empty());
}

#[tokio::test]
async fn test_periodic_loop_detects_tampering() {
    let dir = TempDir::new().unwrap();
    let binary = dir.path().join("agent");
    tokio::fs::write(&binary, b"release-1").await.unwrap();

    let reporter = Arc::new(CapturingReporter::default());
    let store = Arc::new(ChecksumStore::open_in(dir.path()).unwrap());
    let config = VerifierConfig {
        enabled: true,
        binary_path: binary.clone(),
        verify_interval: Duration::from_millis(300),
    };
    let verifier = Arc::new(IntegrityVerifier::new(config, store, reporter.clone()));

    // Startup verification is the caller's responsibility.
    let baseline = verifier.verify_binary(NODE).await.unwrap();
    assert!(baseline.is_baseline());

    tokio::fs::write(&binary, b"tampered!").await.unwrap();

    let cancel = CancellationToken::new();
    let run = {
        let verifier = verifier.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { verifier.run(NODE, cancel).await })
    };

    {
        let reporter = reporter.clone();
        wait_until(Duration::from_secs(5), move || !reporter.violations().is_empty()).await;
    }
    cancel.cancel();
    run.await.unwrap().unwrap();

    // One tick elapsed before cancellation: exactly one violation, with
    // the baseline and tampered digests.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let violations = reporter.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].kind, ViolationKind::Binary);
    assert_eq!(violations[0].expected_checksum, baseline.actual);
    assert_eq!(violations[0].actual_checksum, verifier.binary_checksum());
    assert_ne!(violations[0].expected_checksum, violations[0].actual_checksum);
}
