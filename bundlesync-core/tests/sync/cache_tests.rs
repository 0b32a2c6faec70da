// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Tests for the local cache
//!
//! - Staging never touches committed files
//! - Commit records manifest and marker
//! - Pruning never deletes the catalog

use std::fs;

use bundlesync_core::{BundleRecord, LocalCache, VersionManifest};
use tempfile::TempDir;

const TARGET: &str = "linux";

fn manifest(version: u32, names: &[&str]) -> VersionManifest {
    VersionManifest::new(
        version,
        names
            .iter()
            .enumerate()
            .map(|(i, name)| BundleRecord::new(*name, i as u32, format!("h{}", i)))
            .collect(),
    )
}

fn commit_files(cache: &LocalCache, version: u32, names: &[&str]) {
    let staging = cache.begin_staging().unwrap();
    for name in names {
        staging
            .write_bundle(name, format!("{} v{}", name, version).as_bytes())
            .unwrap();
        staging.write_sidecar(name, "sidecar").unwrap();
    }
    cache
        .commit(staging, &manifest(version, names), &[])
        .unwrap();
}

#[test]
fn test_state_lists_committed_files() {
    let temp = TempDir::new().unwrap();
    let cache = LocalCache::new(temp.path(), TARGET).unwrap();
    commit_files(&cache, 2, &["ui", "levels/forest"]);

    let state = cache.state();

    assert_eq!(state.target, TARGET);
    assert_eq!(state.marker, Some(2));
    assert_eq!(state.manifest.unwrap().len(), 2);
    assert_eq!(
        state.files,
        vec![
            "levels/forest",
            "levels/forest.manifest",
            "ui",
            "ui.manifest",
            "version.txt",
            "versionData.json"
        ]
    );
}

#[test]
fn test_staged_files_are_invisible_until_commit() {
    let temp = TempDir::new().unwrap();
    let cache = LocalCache::new(temp.path(), TARGET).unwrap();
    commit_files(&cache, 1, &["ui"]);

    let staging = cache.begin_staging().unwrap();
    staging.write_bundle("ui", b"ui v2").unwrap();

    assert_eq!(cache.read_bundle("ui").unwrap(), b"ui v1");
    assert_eq!(cache.recorded_marker(), Some(1));
    assert!(!staging.path().starts_with(cache.target_dir()));
}

#[test]
fn test_begin_staging_wipes_leftovers() {
    let temp = TempDir::new().unwrap();
    let cache = LocalCache::new(temp.path(), TARGET).unwrap();

    let staging = cache.begin_staging().unwrap();
    staging.write_bundle("stale", b"from an interrupted cycle").unwrap();
    let path = staging.path().to_path_buf();
    drop(staging);

    let staging = cache.begin_staging().unwrap();
    assert_eq!(staging.path(), path);
    assert!(!path.join("stale").exists());
}

#[test]
fn test_commit_overwrites_changed_bundle() {
    let temp = TempDir::new().unwrap();
    let cache = LocalCache::new(temp.path(), TARGET).unwrap();
    commit_files(&cache, 1, &["ui", "fonts"]);
    commit_files(&cache, 2, &["ui"]);

    assert_eq!(cache.read_bundle("ui").unwrap(), b"ui v2");
    // Not pruned: the bundle stays on disk
    assert_eq!(cache.read_bundle("fonts").unwrap(), b"fonts v1");
    assert_eq!(cache.load_manifest().unwrap().unwrap(), manifest(2, &["ui"]));
}

#[test]
fn test_prune_removes_bundle_and_sidecar_but_not_catalog() {
    let temp = TempDir::new().unwrap();
    let cache = LocalCache::new(temp.path(), TARGET).unwrap();
    commit_files(&cache, 1, &["ui", "fonts", TARGET]);

    let staging = cache.begin_staging().unwrap();
    let prune = vec![
        "fonts".to_string(),
        TARGET.to_string(),
        "version.txt".to_string(),
        "../x".to_string(),
    ];
    let summary = cache.commit(staging, &manifest(2, &["ui"]), &prune).unwrap();

    assert_eq!(summary.files, 0);
    assert_eq!(summary.pruned, vec!["fonts".to_string()]);
    assert!(cache.read_bundle("fonts").is_none());
    assert!(cache.read_sidecar("fonts").is_none());
    assert!(cache.read_bundle(TARGET).is_some());
    assert_eq!(cache.recorded_marker(), Some(2));
}

#[test]
fn test_marker_is_kept_per_target() {
    let temp = TempDir::new().unwrap();
    let linux = LocalCache::new(temp.path(), TARGET).unwrap();
    let windows = LocalCache::new(temp.path(), "windows").unwrap();
    commit_files(&linux, 4, &["ui"]);

    assert_eq!(linux.marker_path(), temp.path().join(TARGET).join("version.txt"));
    assert_eq!(linux.recorded_marker(), Some(4));
    assert_eq!(windows.recorded_marker(), None);
    assert_eq!(windows.state().manifest, None);
}

#[test]
fn test_unreadable_marker_counts_as_missing() {
    let temp = TempDir::new().unwrap();
    let cache = LocalCache::new(temp.path(), TARGET).unwrap();
    fs::create_dir_all(cache.target_dir()).unwrap();
    fs::write(cache.marker_path(), "garbage").unwrap();

    assert_eq!(cache.recorded_marker(), None);
}
