// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Audit Forwarder Integration Tests
//!
//! Spool-backed sources through the forwarder: overflow behavior,
//! transport failure retention, and the full collect/report loop.

use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use plexd::infrastructure::audit::sources::{AuditdSource, K8sAuditSource};
use plexd::infrastructure::audit::{AuditForwarder, ForwarderConfig};
use plexd_domain::AgentError;

use crate::common::{wait_until, CapturingReporter};

const NODE: &str = "node-itest";

fn auditd_line(n: usize) -> String {
    format!(
        r#"{{"timestamp":"2025-06-01T10:00:{:02}Z","type":"SYSCALL","uid":0,"gid":0,"pid":{},"syscall":"openat","path":"/etc/hosts","success":true}}"#,
        n % 60,
        1000 + n
    )
}

fn k8s_line(n: usize) -> String {
    format!(
        r#"{{"timestamp":"2025-06-01T10:01:{:02}Z","verb":"get","user":{{"username":"u{}"}},"object_ref":{{"resource":"pods","namespace":"default"}},"response_status":200}}"#,
        n % 60,
        n
    )
}

async fn write_spool(dir: &TempDir, name: &str, lines: &[String]) -> std::path::PathBuf {
    let path = dir.path().join(name);
    tokio::fs::write(&path, lines.join("\n") + "\n").await.unwrap();
    path
}

fn forwarder_config(batch_size: usize) -> ForwarderConfig {
    crate::common::init_test_logging();
    ForwarderConfig {
        batch_size,
        ..ForwarderConfig::default()
    }
}

#[tokio::test]
async fn test_overflow_drops_oldest() {
    let dir = TempDir::new().unwrap();
    let lines: Vec<String> = (0..15).map(auditd_line).collect();
    let spool = write_spool(&dir, "auditd.jsonl", &lines).await;

    let reporter = Arc::new(CapturingReporter::default());
    let mut forwarder = AuditForwarder::new(forwarder_config(5), NODE, reporter.clone());
    forwarder.add_source(Arc::new(AuditdSource::from_spool(&spool)));

    forwarder.collect_cycle().await;

    // Hard cap is 2 x batch size; the oldest five were dropped without a
    // single reporter call.
    assert_eq!(forwarder.buffer_len(), 10);
    assert!(reporter.audit_batches().is_empty());
}

#[tokio::test]
async fn test_reporter_failure_then_retry() {
    let dir = TempDir::new().unwrap();
    let lines: Vec<String> = (0..5).map(auditd_line).collect();
    let spool = write_spool(&dir, "auditd.jsonl", &lines).await;

    let reporter = Arc::new(CapturingReporter::default());
    let mut forwarder = AuditForwarder::new(forwarder_config(5), NODE, reporter.clone());
    forwarder.add_source(Arc::new(AuditdSource::from_spool(&spool)));

    forwarder.collect_cycle().await;
    assert_eq!(forwarder.buffer_len(), 5);

    reporter.fail_next_audit_reports(1);
    forwarder.flush().await;
    assert_eq!(reporter.audit_attempts(), 1);
    assert_eq!(forwarder.buffer_len(), 5);

    forwarder.flush().await;
    assert_eq!(reporter.audit_attempts(), 2);
    assert_eq!(forwarder.buffer_len(), 0);

    let batches = reporter.audit_batches();
    assert_eq!(batches.len(), 1);
    assert_eq!(batches[0].len(), 5);
    // Arrival order survived the retention round trip.
    assert!(batches[0][0].subject.contains("1000"));
}

#[tokio::test]
async fn test_sources_collect_in_registration_order() {
    let dir = TempDir::new().unwrap();
    let auditd_spool = write_spool(&dir, "auditd.jsonl", &[auditd_line(0), auditd_line(1)]).await;
    let k8s_spool = write_spool(&dir, "k8s.jsonl", &[k8s_line(0)]).await;

    let reporter = Arc::new(CapturingReporter::default());
    let mut forwarder = AuditForwarder::new(forwarder_config(10), NODE, reporter.clone());
    forwarder.add_source(Arc::new(AuditdSource::from_spool(&auditd_spool)));
    forwarder.add_source(Arc::new(K8sAuditSource::from_spool(&k8s_spool)));

    forwarder.collect_cycle().await;
    forwarder.flush().await;

    let batches = reporter.audit_batches();
    assert_eq!(batches.len(), 1);
    let sources: Vec<_> = batches[0].iter().map(|e| e.source.as_str()).collect();
    assert_eq!(sources, vec!["auditd", "auditd", "k8s-audit"]);
}

#[tokio::test]
async fn test_run_loop_collects_and_reports() {
    let dir = TempDir::new().unwrap();
    let lines: Vec<String> = (0..3).map(auditd_line).collect();
    let spool = write_spool(&dir, "auditd.jsonl", &lines).await;

    let reporter = Arc::new(CapturingReporter::default());
    // Tight intervals keep the test fast; validation bounds are a
    // start-time concern, not a loop concern.
    let config = ForwarderConfig {
        collect_interval: Duration::from_millis(50),
        report_interval: Duration::from_millis(100),
        batch_size: 10,
        ..ForwarderConfig::default()
    };
    let mut forwarder = AuditForwarder::new(config, NODE, reporter.clone());
    forwarder.add_source(Arc::new(AuditdSource::from_spool(&spool)));
    let forwarder = Arc::new(forwarder);

    let cancel = CancellationToken::new();
    let run = {
        let forwarder = forwarder.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { forwarder.run(cancel).await })
    };

    {
        let reporter = reporter.clone();
        wait_until(Duration::from_secs(5), move || !reporter.audit_batches().is_empty()).await;
    }

    // New records appended to the spool are picked up by later cycles.
    let mut contents = tokio::fs::read(&spool).await.unwrap();
    contents.extend_from_slice((auditd_line(99) + "\n").as_bytes());
    tokio::fs::write(&spool, contents).await.unwrap();

    {
        let reporter = reporter.clone();
        wait_until(Duration::from_secs(5), move || {
            reporter.audit_batches().iter().map(|b| b.len()).sum::<usize>() >= 4
        })
        .await;
    }

    cancel.cancel();
    let outcome = run.await.unwrap();
    assert!(matches!(outcome, Err(AgentError::Cancelled(_))));
    assert_eq!(forwarder.buffer_len(), 0);

    let total: usize = reporter.audit_batches().iter().map(|b| b.len()).sum();
    assert_eq!(total, 4);
}
