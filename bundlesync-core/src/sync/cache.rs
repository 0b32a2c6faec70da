// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Local bundle cache
//!
//! Layout below the cache root:
//!
//! ```text
//! <target>/version.txt        last version marker recorded for the target
//! <target>/versionData.json   committed manifest
//! <target>/<name>             committed blobs and sidecars
//! .staging/<target>/...       downloads of the running cycle
//! ```
//!
//! Targets sharing a root never see each other's marker. Downloads only
//! ever land in the staging area. [`LocalCache::commit`] moves them into
//! place and only then rewrites the manifest, so the manifest never lists
//! content that is not on disk.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::bundle::{
    parse_version_marker, sidecar_name, validate_bundle_name, InvalidBundleName,
    SerializationError, VersionManifest, MANIFEST_FILE_NAME, VERSION_MARKER_FILE_NAME,
};

const STAGING_DIR: &str = ".staging";

/// Snapshot of what the cache holds for its target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCacheState {
    /// Target identifier
    pub target: String,
    /// Last recorded version marker
    pub marker: Option<u32>,
    /// Committed manifest, `None` if missing or unreadable
    pub manifest: Option<VersionManifest>,
    /// Committed files (blobs, sidecars, manifest, marker), relative to the target directory
    pub files: Vec<String>,
}

/// What a commit changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Number of staged files moved into the cache
    pub files: usize,
    /// Bundles deleted because the new manifest dropped them
    pub pruned: Vec<String>,
}

/// Durable on-disk mirror of one target's manifest and bundles
#[derive(Debug, Clone)]
pub struct LocalCache {
    root: PathBuf,
    target: String,
}

impl LocalCache {
    /// Opens the cache for `target` below `root`.
    ///
    /// Nothing is created until the first download phase.
    pub fn new(root: &Path, target: &str) -> Result<Self, CacheError> {
        validate_bundle_name(target)?;
        Ok(Self {
            root: root.to_path_buf(),
            target: target.to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Directory holding the committed files of the target.
    pub fn target_dir(&self) -> PathBuf {
        self.root.join(&self.target)
    }

    /// Path of the target's recorded version marker.
    pub fn marker_path(&self) -> PathBuf {
        self.target_dir().join(VERSION_MARKER_FILE_NAME)
    }

    /// Last version marker recorded by a successful commit for this target.
    ///
    /// A malformed marker file counts as no marker.
    pub fn recorded_marker(&self) -> Option<u32> {
        let text = fs::read_to_string(self.marker_path()).ok()?;
        match parse_version_marker(&text) {
            Ok(marker) => Some(marker),
            Err(e) => {
                warn!(
                    sync_target = %self.target,
                    error = %e,
                    "ignoring unreadable version marker in cache"
                );
                None
            }
        }
    }

    /// Loads the committed manifest.
    ///
    /// `Ok(None)` if no manifest was committed yet. The version is the
    /// recorded marker (0 if none).
    pub fn load_manifest(&self) -> Result<Option<VersionManifest>, CacheError> {
        let path = self.target_dir().join(MANIFEST_FILE_NAME);
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let version = self.recorded_marker().unwrap_or_default();
        Ok(Some(VersionManifest::from_json(version, &json)?))
    }

    /// Get a committed bundle blob if it exists
    pub fn read_bundle(&self, name: &str) -> Option<Vec<u8>> {
        validate_bundle_name(name).ok()?;
        fs::read(self.target_dir().join(name)).ok()
    }

    /// Get a committed sidecar if it exists
    pub fn read_sidecar(&self, name: &str) -> Option<String> {
        validate_bundle_name(name).ok()?;
        fs::read_to_string(self.target_dir().join(sidecar_name(name))).ok()
    }

    /// Describes the committed state.
    pub fn state(&self) -> LocalCacheState {
        let manifest = self.load_manifest().unwrap_or_else(|e| {
            warn!(error = %e, "cached manifest is unreadable");
            None
        });

        LocalCacheState {
            target: self.target.clone(),
            marker: self.recorded_marker(),
            manifest,
            files: list_files(&self.target_dir()),
        }
    }

    /// Prepares an empty staging area for a download phase.
    ///
    /// Leftovers of an interrupted cycle are wiped.
    pub fn begin_staging(&self) -> Result<StagingArea, CacheError> {
        let dir = self.root.join(STAGING_DIR).join(&self.target);
        remove_dir_if_exists(&dir)?;
        fs::create_dir_all(&dir)?;
        debug!(staging = %dir.display(), "staging area ready");
        Ok(StagingArea { dir })
    }

    /// Drops everything staged; the committed cache is not touched.
    pub fn discard(&self, staging: StagingArea) -> Result<(), CacheError> {
        remove_dir_if_exists(&staging.dir)?;
        Ok(())
    }

    /// Moves staged files into the cache, then records `manifest` and its
    /// version marker.
    ///
    /// `prune` names bundles to delete after the manifest is committed.
    pub fn commit(
        &self,
        staging: StagingArea,
        manifest: &VersionManifest,
        prune: &[String],
    ) -> Result<CommitSummary, CacheError> {
        let target_dir = self.target_dir();
        fs::create_dir_all(&target_dir)?;

        let mut summary = CommitSummary::default();
        for relative in list_files(&staging.dir) {
            let dest = target_dir.join(&relative);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::rename(staging.dir.join(&relative), &dest)?;
            summary.files += 1;
        }

        atomic_write(
            &target_dir.join(MANIFEST_FILE_NAME),
            manifest.to_json()?.as_bytes(),
        )?;
        atomic_write(&self.marker_path(), manifest.version().to_string().as_bytes())?;

        for name in prune {
            if name == &self.target
                || name == MANIFEST_FILE_NAME
                || name == VERSION_MARKER_FILE_NAME
                || validate_bundle_name(name).is_err()
            {
                continue;
            }
            remove_file_if_exists(&target_dir.join(name))?;
            remove_file_if_exists(&target_dir.join(sidecar_name(name)))?;
            summary.pruned.push(name.clone());
        }

        remove_dir_if_exists(&staging.dir)?;
        Ok(summary)
    }
}

/// Per-cycle download area, separate from the committed cache
#[derive(Debug)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Stages a bundle blob.
    pub fn write_bundle(&self, name: &str, data: &[u8]) -> Result<(), CacheError> {
        validate_bundle_name(name)?;
        self.write(name, data)
    }

    /// Stages a bundle sidecar.
    pub fn write_sidecar(&self, name: &str, text: &str) -> Result<(), CacheError> {
        validate_bundle_name(name)?;
        self.write(&sidecar_name(name), text.as_bytes())
    }

    fn write(&self, relative: &str, data: &[u8]) -> Result<(), CacheError> {
        let path = self.dir.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(atomic_write(&path, data)?)
    }
}

/// Atomic file write (write to temp, then rename)
///
/// Either the old content remains or the new content is fully written.
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    fs::write(&temp_path, data)?;
    fs::rename(&temp_path, path)
}

/// Relative `/`-separated paths of every file below `dir`, sorted.
fn list_files(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let relative = e.path().strip_prefix(dir).ok()?;
            let parts: Option<Vec<&str>> = relative
                .components()
                .map(|c| match c {
                    Component::Normal(part) => part.to_str(),
                    _ => None,
                })
                .collect();
            Some(parts?.join("/"))
        })
        .collect();
    files.sort();
    files
}

fn remove_dir_if_exists(dir: &Path) -> io::Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

/// Errors that can occur with the local cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Cached manifest could not be read or written
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Name cannot be stored below the cache root
    #[error(transparent)]
    InvalidName(#[from] InvalidBundleName),
}
