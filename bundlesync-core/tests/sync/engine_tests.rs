// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for the sync engine
//!
//! Scenarios:
//! - First sync downloads everything, second sync is a no-op
//! - Only changed bundles are downloaded
//! - Unreadable local manifest falls back to a full download
//! - A failed download leaves the cache untouched and is retried next cycle
//! - Cycles are serialized
//! - Targets sharing a cache root do not share a marker
//! - An interrupted commit keeps the old version

use std::fs;
use std::time::Duration;

use bundlesync_core::sync::TaskError;
use bundlesync_core::{
    BundleRecord, MockCatalog, NetworkError, RetryPolicy, SyncConfig, SyncEngine, SyncError,
    SyncOutcome, SyncPhase,
};
use tempfile::TempDir;

const TARGET: &str = "linux";

fn config(temp: &TempDir) -> SyncConfig {
    SyncConfig::new("http://unused.invalid", TARGET)
        .with_storage_path(temp.path())
        .without_retries()
}

fn engine_with(temp: &TempDir, catalog: MockCatalog) -> SyncEngine<MockCatalog> {
    SyncEngine::new(catalog, config(temp)).unwrap()
}

fn downloaded(outcome: SyncOutcome) -> Vec<String> {
    match outcome {
        SyncOutcome::Updated { downloaded, .. } => downloaded,
        other => panic!("expected an update, got {:?}", other),
    }
}

#[tokio::test]
async fn test_first_sync_downloads_everything() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(TARGET, 1, &[("a", b"alpha"), ("b", b"beta")]);
    let engine = engine_with(&temp, catalog);

    let outcome = engine.sync().await.unwrap();

    assert_eq!(downloaded(outcome), vec!["a", "b", "linux"]);
    let cache = engine.cache();
    assert_eq!(cache.recorded_marker(), Some(1));
    assert_eq!(cache.read_bundle("a").unwrap(), b"alpha");
    assert_eq!(cache.read_sidecar("b").unwrap(), "bundle b");
    assert_eq!(cache.read_bundle(TARGET).unwrap(), b"catalog v1");
    assert_eq!(cache.load_manifest().unwrap().unwrap().len(), 2);
    assert_eq!(engine.phase(), SyncPhase::Idle);
}

#[tokio::test]
async fn test_same_marker_is_no_update() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(TARGET, 1, &[("a", b"alpha")]);
    let engine = engine_with(&temp, catalog);
    engine.sync().await.unwrap();
    engine.source().clear_requests();

    let outcome = engine.sync().await.unwrap();

    assert_eq!(outcome, SyncOutcome::UpToDate { version: 1 });
    assert_eq!(engine.source().requests(), vec!["marker"]);
    assert_eq!(engine.phase(), SyncPhase::NoUpdate);
}

#[tokio::test]
async fn test_only_delta_is_downloaded() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(TARGET, 1, &[("a", b"alpha"), ("b", b"beta")]);
    let mut engine = engine_with(&temp, catalog);
    engine.sync().await.unwrap();

    engine
        .source_mut()
        .publish(TARGET, 2, &[("a", b"alpha"), ("b", b"beta 2"), ("c", b"gamma")]);
    engine.source().clear_requests();
    let outcome = engine.sync().await.unwrap();

    assert_eq!(downloaded(outcome), vec!["b", "c", "linux"]);
    assert_eq!(engine.source().bundle_requests(TARGET, "a"), 0);
    assert_eq!(engine.cache().read_bundle("b").unwrap(), b"beta 2");
    assert_eq!(engine.cache().read_bundle("a").unwrap(), b"alpha");
    assert_eq!(engine.cache().recorded_marker(), Some(2));
}

#[tokio::test]
async fn test_catalog_listed_in_manifest_is_fetched_once() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(TARGET, 1, &[("a", b"alpha")]);
    catalog.set_manifest(
        TARGET,
        vec![
            BundleRecord::new("a", 1, "x"),
            BundleRecord::new(TARGET, 2, "y"),
        ],
    );
    let engine = engine_with(&temp, catalog);

    let outcome = engine.sync().await.unwrap();

    assert_eq!(downloaded(outcome), vec!["a", "linux"]);
    assert_eq!(engine.source().bundle_requests(TARGET, TARGET), 1);
}

#[tokio::test]
async fn test_corrupt_local_manifest_downloads_everything() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(TARGET, 1, &[("a", b"alpha"), ("b", b"beta")]);
    let mut engine = engine_with(&temp, catalog);
    engine.sync().await.unwrap();

    fs::write(
        engine.cache().target_dir().join("versionData.json"),
        "{ truncated",
    )
    .unwrap();
    engine
        .source_mut()
        .publish(TARGET, 2, &[("a", b"alpha"), ("b", b"beta")]);
    let outcome = engine.sync().await.unwrap();

    assert_eq!(downloaded(outcome), vec!["a", "b", "linux"]);
    assert_eq!(engine.cache().load_manifest().unwrap().unwrap().version(), 2);
}

#[tokio::test]
async fn test_failed_task_leaves_cache_untouched() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(TARGET, 1, &[("a", b"alpha"), ("b", b"beta")]);
    let mut engine = engine_with(&temp, catalog);
    engine.sync().await.unwrap();
    let before = engine.cache().load_manifest().unwrap();

    engine
        .source_mut()
        .publish(TARGET, 2, &[("a", b"alpha"), ("b", b"beta 2"), ("c", b"gamma")]);
    engine.source_mut().fail_bundle("c");
    let err = engine.sync().await.unwrap_err();

    assert_eq!(err.failed_names(), vec!["c"]);
    if let SyncError::Incomplete { failures } = &err {
        assert!(matches!(
            failures[0].error,
            TaskError::Network(NetworkError::Connection { .. })
        ));
    }
    // b was downloaded successfully but must not be visible
    assert_eq!(engine.cache().read_bundle("b").unwrap(), b"beta");
    assert!(engine.cache().read_bundle("c").is_none());
    assert_eq!(engine.cache().load_manifest().unwrap(), before);
    assert_eq!(engine.cache().recorded_marker(), Some(1));
    assert!(!temp.path().join(".staging").join(TARGET).exists());
    assert!(matches!(engine.phase(), SyncPhase::Failed(_)));

    // Next cycle retries both b and c
    engine.source_mut().clear_failures();
    engine.source().clear_requests();
    let outcome = engine.sync().await.unwrap();

    assert_eq!(downloaded(outcome), vec!["b", "c", "linux"]);
    assert_eq!(engine.source().bundle_requests(TARGET, "b"), 1);
    assert_eq!(engine.cache().read_bundle("b").unwrap(), b"beta 2");
    assert_eq!(engine.cache().read_bundle("c").unwrap(), b"gamma");
    assert_eq!(engine.cache().recorded_marker(), Some(2));
    assert_eq!(engine.phase(), SyncPhase::Idle);
}

#[tokio::test]
async fn test_first_sync_failure_creates_no_manifest() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(TARGET, 1, &[("a", b"alpha"), ("b", b"beta")]);
    catalog.fail_bundle("a");
    let engine = engine_with(&temp, catalog);

    assert!(engine.sync().await.is_err());

    assert!(engine.cache().load_manifest().unwrap().is_none());
    assert_eq!(engine.cache().recorded_marker(), None);
    assert!(engine.cache().state().files.is_empty());
}

#[tokio::test]
async fn test_missing_marker_is_network_error() {
    let temp = TempDir::new().unwrap();
    let engine = engine_with(&temp, MockCatalog::new());

    let err = engine.sync().await.unwrap_err();

    assert!(matches!(
        err,
        SyncError::Network(NetworkError::Protocol { status: 404, .. })
    ));
    assert!(engine.cache().state().marker.is_none());
}

#[tokio::test]
async fn test_invalid_bundle_name_fails_its_task() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(TARGET, 1, &[("a", b"alpha")]);
    catalog.set_manifest(
        TARGET,
        vec![
            BundleRecord::new("a", 1, "x"),
            BundleRecord::new("../escape", 2, "y"),
        ],
    );
    let engine = engine_with(&temp, catalog);

    let err = engine.sync().await.unwrap_err();

    assert_eq!(err.failed_names(), vec!["../escape"]);
    assert_eq!(engine.source().bundle_requests(TARGET, "../escape"), 0);
    assert!(!temp.path().join("escape").exists());
    assert!(engine.cache().read_bundle("a").is_none());
}

#[tokio::test]
async fn test_downloads_run_concurrently() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(
        TARGET,
        1,
        &[("a", b"1"), ("b", b"2"), ("c", b"3"), ("d", b"4"), ("e", b"5")],
    );
    let engine = engine_with(&temp, catalog);

    engine.sync().await.unwrap();

    assert!(engine.source().max_in_flight() > 2);
}

#[tokio::test]
async fn test_concurrency_limit_is_respected() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(TARGET, 1, &[("a", b"1"), ("b", b"2"), ("c", b"3")]);
    let mut config = config(&temp);
    config.max_concurrent_downloads = 1;
    let engine = SyncEngine::new(catalog, config).unwrap();

    engine.sync().await.unwrap();

    // Blob and sidecar of the single running task
    assert_eq!(engine.source().max_in_flight(), 2);
}

#[tokio::test]
async fn test_concurrent_syncs_are_serialized() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(TARGET, 1, &[("a", b"alpha")]);
    let engine = engine_with(&temp, catalog);

    let (first, second) = tokio::join!(engine.sync(), engine.sync());

    assert!(matches!(first.unwrap(), SyncOutcome::Updated { .. }));
    assert_eq!(second.unwrap(), SyncOutcome::UpToDate { version: 1 });
    assert_eq!(engine.source().bundle_requests(TARGET, "a"), 1);
}

#[tokio::test]
async fn test_try_sync_reports_busy() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(TARGET, 1, &[("a", b"alpha")]);
    let engine = engine_with(&temp, catalog);

    let (first, second) = tokio::join!(engine.sync(), engine.try_sync());

    assert!(first.is_ok());
    assert!(matches!(second, Err(SyncError::Busy)));
}

#[tokio::test]
async fn test_pruning_is_opt_in() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(TARGET, 1, &[("a", b"alpha"), ("b", b"beta")]);
    let mut engine = engine_with(&temp, catalog);
    engine.sync().await.unwrap();

    engine.source_mut().publish(TARGET, 2, &[("a", b"alpha")]);
    let outcome = engine.sync().await.unwrap();

    assert_eq!(
        outcome,
        SyncOutcome::Updated {
            version: 2,
            downloaded: vec!["linux".to_string()],
            pruned: Vec::new(),
        }
    );
    assert!(engine.cache().read_bundle("b").is_some());
}

#[tokio::test]
async fn test_pruning_deletes_dropped_bundles() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(TARGET, 1, &[("a", b"alpha"), ("b", b"beta")]);
    let mut engine = SyncEngine::new(catalog, config(&temp).with_pruning()).unwrap();
    engine.sync().await.unwrap();

    engine.source_mut().publish(TARGET, 2, &[("a", b"alpha")]);
    let outcome = engine.sync().await.unwrap();

    match outcome {
        SyncOutcome::Updated { pruned, .. } => assert_eq!(pruned, vec!["b"]),
        other => panic!("expected an update, got {:?}", other),
    }
    assert!(engine.cache().read_bundle("b").is_none());
    assert!(engine.cache().read_sidecar("b").is_none());
    assert!(engine.cache().read_bundle(TARGET).is_some());
}

#[tokio::test(start_paused = true)]
async fn test_transient_failures_are_retried() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(TARGET, 1, &[("a", b"alpha")]);
    catalog.fail_bundle("a");
    let config = config(&temp).with_retry(RetryPolicy::default());
    let engine = SyncEngine::new(catalog, config).unwrap();

    let err = engine.sync().await.unwrap_err();

    assert_eq!(err.failed_names(), vec!["a"]);
    assert_eq!(
        engine.source().bundle_requests(TARGET, "a"),
        RetryPolicy::default().max_attempts as usize
    );
}

#[tokio::test(start_paused = true)]
async fn test_polling_runs_requested_cycles() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(TARGET, 3, &[("a", b"alpha")]);
    let engine = engine_with(&temp, catalog);

    let mut outcomes = Vec::new();
    engine
        .run_polling(Duration::from_secs(60), Some(2), |result| {
            outcomes.push(result.as_ref().cloned().map_err(|e| e.to_string()))
        })
        .await;

    assert_eq!(outcomes.len(), 2);
    assert!(matches!(outcomes[0], Ok(SyncOutcome::Updated { version: 3, .. })));
    assert_eq!(outcomes[1], Ok(SyncOutcome::UpToDate { version: 3 }));
}

#[tokio::test]
async fn test_phase_changes_are_observable() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(TARGET, 1, &[("a", b"alpha")]);
    let engine = engine_with(&temp, catalog);
    let mut phases = engine.subscribe();
    assert_eq!(*phases.borrow_and_update(), SyncPhase::Idle);

    engine.sync().await.unwrap();

    assert!(phases.has_changed().unwrap());
    assert_eq!(*phases.borrow_and_update(), SyncPhase::Idle);
}

#[tokio::test]
async fn test_targets_sharing_a_root_keep_separate_markers() {
    let temp = TempDir::new().unwrap();
    let mut linux = MockCatalog::new();
    linux.publish(TARGET, 5, &[("l", b"linux only")]);
    let linux_engine = engine_with(&temp, linux);
    linux_engine.sync().await.unwrap();

    let mut windows = MockCatalog::new();
    windows.publish("windows", 5, &[("w", b"windows only")]);
    let windows_config = SyncConfig::new("http://unused.invalid", "windows")
        .with_storage_path(temp.path())
        .without_retries();
    let windows_engine = SyncEngine::new(windows, windows_config).unwrap();

    assert_eq!(windows_engine.cache().recorded_marker(), None);
    let outcome = windows_engine.sync().await.unwrap();

    assert_eq!(downloaded(outcome), vec!["w", "windows"]);
    assert_eq!(windows_engine.cache().recorded_marker(), Some(5));
    assert_eq!(windows_engine.cache().read_bundle("w").unwrap(), b"windows only");
    assert_eq!(linux_engine.cache().recorded_marker(), Some(5));
    assert!(linux_engine.cache().read_bundle("w").is_none());
}

#[tokio::test]
async fn test_interrupted_commit_keeps_old_version_and_retries() {
    let temp = TempDir::new().unwrap();
    let mut catalog = MockCatalog::new();
    catalog.publish(TARGET, 1, &[("a", b"alpha")]);
    let mut engine = engine_with(&temp, catalog);
    engine.sync().await.unwrap();
    let before = engine.cache().load_manifest().unwrap();

    // A directory where the new bundle b must land makes its move fail
    // after a was already moved into place.
    let blocker = engine.cache().target_dir().join("b");
    fs::create_dir_all(&blocker).unwrap();
    fs::write(blocker.join("stray"), b"x").unwrap();
    engine
        .source_mut()
        .publish(TARGET, 2, &[("a", b"alpha 2"), ("b", b"beta")]);

    let err = engine.sync().await.unwrap_err();

    assert!(matches!(err, SyncError::Cache(_)));
    assert!(matches!(engine.phase(), SyncPhase::Failed(_)));
    assert_eq!(engine.cache().read_bundle("a").unwrap(), b"alpha 2");
    assert_eq!(engine.cache().load_manifest().unwrap(), before);
    assert_eq!(engine.cache().recorded_marker(), Some(1));

    fs::remove_dir_all(&blocker).unwrap();
    let outcome = engine.sync().await.unwrap();

    assert_eq!(downloaded(outcome), vec!["a", "b", "linux"]);
    assert_eq!(engine.cache().read_bundle("b").unwrap(), b"beta");
    assert_eq!(engine.cache().recorded_marker(), Some(2));
}
