// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Artifact lifecycle through the public store, gateway and sweeper APIs.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use ephemera_core::error::EphemeraError;
use ephemera_core::types::{ArtifactId, DocumentType};
use ephemera_store::{ArtifactStore, RetentionSweeper, RetrievalGateway, ServePolicy, SweeperState};

const LIMIT: u64 = 4096;

fn open_store() -> (tempfile::TempDir, Arc<ArtifactStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(ArtifactStore::open(dir.path(), LIMIT).unwrap());
    (dir, store)
}

fn entries(dir: &std::path::Path) -> usize {
    fs::read_dir(dir).unwrap().count()
}

#[test]
fn round_trip_is_byte_identical_every_time() {
    let (_dir, store) = open_store();
    let payload: Vec<u8> = (0..=255u8).cycle().take(3000).collect();
    let artifact = store
        .create(&payload, "scan.pdf", DocumentType::Pdf)
        .unwrap();

    for _ in 0..3 {
        assert_eq!(store.read_payload(artifact.id).unwrap(), payload);
    }
    assert_eq!(store.get(artifact.id).unwrap().size_bytes, 3000);
}

#[test]
fn one_byte_over_the_limit_persists_nothing() {
    let (dir, store) = open_store();
    let payload = vec![0u8; LIMIT as usize + 1];

    let err = store.create(&payload, "big.pdf", DocumentType::Pdf).unwrap_err();
    assert!(matches!(
        err,
        EphemeraError::PayloadTooLarge { size, limit } if size == LIMIT + 1 && limit == LIMIT
    ));

    let err = store
        .create_from_reader(&payload[..], "big.pdf", DocumentType::Pdf)
        .unwrap_err();
    assert!(matches!(err, EphemeraError::PayloadTooLarge { .. }));

    assert_eq!(entries(dir.path()), 0);
}

#[test]
fn delete_twice_is_not_an_error() {
    let (dir, store) = open_store();
    let artifact = store.create(b"bye", "a.txt", DocumentType::PlainText).unwrap();

    assert!(store.delete(artifact.id).unwrap());
    assert!(!store.delete(artifact.id).unwrap());
    assert!(!store.delete(ArtifactId::new()).unwrap());
    assert_eq!(entries(dir.path()), 0);
    assert!(store.get(artifact.id).unwrap_err().is_not_found());
}

#[test]
fn malformed_ids_are_not_found() {
    let err = "../../etc/passwd".parse::<ArtifactId>().unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn orphan_metadata_is_not_found_then_swept() {
    let (dir, store) = open_store();
    let gateway = RetrievalGateway::new(Arc::clone(&store), ServePolicy::Retain);
    let artifact = gateway
        .ingest(&b"%PDF-1.7 body"[..], "doc.pdf", "application/pdf")
        .unwrap();
    fs::remove_file(dir.path().join(&artifact.storage_location)).unwrap();

    assert!(store.get(artifact.id).is_ok());
    assert!(store.read_payload(artifact.id).unwrap_err().is_not_found());
    assert!(gateway.resolve(artifact.id).unwrap_err().is_not_found());

    let sweeper = RetentionSweeper::new(Arc::clone(&store), Duration::from_secs(3600));
    let report = sweeper.sweep_once().await.unwrap();
    assert_eq!(report.orphans_removed, 1);
    assert!(store.get(artifact.id).unwrap_err().is_not_found());
    assert_eq!(entries(dir.path()), 0);
}

#[tokio::test]
async fn short_ttl_artifact_is_gone_within_200ms() {
    let (_dir, store) = open_store();
    let mut sweeper = RetentionSweeper::new(Arc::clone(&store), Duration::from_millis(100));

    let artifact = store.create(b"short-lived", "a.txt", DocumentType::PlainText).unwrap();
    let initial = sweeper.start(Duration::from_millis(50)).await.unwrap();
    assert_eq!(initial.evicted, 0);
    assert_eq!(sweeper.state(), SweeperState::Running);

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(store.get(artifact.id).unwrap_err().is_not_found());

    sweeper.stop().await;
    assert_eq!(sweeper.state(), SweeperState::Stopped);
}

#[tokio::test]
async fn fresh_artifacts_survive_a_sweep() {
    let (_dir, store) = open_store();
    let mut sweeper = RetentionSweeper::new(Arc::clone(&store), Duration::from_secs(3600));
    let artifact = store.create(b"keep", "a.txt", DocumentType::PlainText).unwrap();

    let report = sweeper.start(Duration::from_secs(7200)).await.unwrap();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.evicted, 0);
    assert!(store.read_payload(artifact.id).is_ok());
    sweeper.stop().await;
}
