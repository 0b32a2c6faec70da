// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Manifest diffing
//!
//! The same function runs on the build side (to decide what goes into the
//! delta archive) and on the client (to decide what to download).

use std::collections::HashSet;

use super::types::{BundleRecord, DeltaSet, VersionManifest};

/// Computes the records of `new` that are not structurally present in `old`.
///
/// `None` stands for "no previous manifest", in which case every record of
/// `new` is part of the delta. Removals are never reported. Output keeps the
/// build order of `new`.
pub fn diff(old: Option<&VersionManifest>, new: &VersionManifest) -> DeltaSet {
    let known: HashSet<&BundleRecord> = old
        .map(|manifest| manifest.records().iter().collect())
        .unwrap_or_default();

    let changed = new
        .records()
        .iter()
        .filter(|record| !known.contains(record))
        .cloned()
        .collect();

    DeltaSet::new(changed)
}

/// Names listed in `old` that no longer appear (by name) in `new`.
pub fn stale_names(old: Option<&VersionManifest>, new: &VersionManifest) -> Vec<String> {
    let Some(old) = old else {
        return Vec::new();
    };
    let current: HashSet<&str> = new.names().collect();

    old.names()
        .filter(|name| !current.contains(name))
        .map(str::to_string)
        .collect()
}
