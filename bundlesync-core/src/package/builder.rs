// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Package builder
//!
//! Each call to [`PackageBuilder::build`] works on its own request: the
//! previous and new manifests are explicit values, nothing is shared
//! between builds.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{info, warn};

use super::archive::{archive_name, extract_overwrite, write_archive};
use super::discover::discover_bundles;
use crate::bundle::{
    diff, parse_version_marker, sidecar_name, BundleHasher, BundleRecord, DeltaSet, FileHasher,
    SerializationError, VersionManifest, MANIFEST_FILE_NAME, VERSION_MARKER_FILE_NAME,
};
use crate::sync::atomic_write;

/// Parameters of one build invocation.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Directory holding `version.txt`, the archives and one output
    /// directory per target
    pub publish_root: PathBuf,
    /// Target identifier; also the catalog name
    pub target: String,
    /// Operator assigned version number
    pub version: u32,
    /// Previously published manifest for the same target
    pub previous: Option<VersionManifest>,
    /// Secondary distribution directory to unpack the archive into
    pub mirror_path: Option<PathBuf>,
}

impl BuildRequest {
    /// Creates a request for a first build (no previous manifest, no mirror).
    pub fn new(publish_root: impl Into<PathBuf>, target: impl Into<String>, version: u32) -> Self {
        Self {
            publish_root: publish_root.into(),
            target: target.into(),
            version,
            previous: None,
            mirror_path: None,
        }
    }

    /// Diff against a previously published manifest.
    pub fn with_previous(mut self, previous: Option<VersionManifest>) -> Self {
        self.previous = previous;
        self
    }

    /// Stage the archive into a mirror directory after building.
    pub fn with_mirror(mut self, mirror_path: impl Into<PathBuf>) -> Self {
        self.mirror_path = Some(mirror_path.into());
        self
    }

    /// Build output directory of the target.
    pub fn output_dir(&self) -> PathBuf {
        self.publish_root.join(&self.target)
    }
}

/// A bundle left out of the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedBundle {
    /// Bundle name
    pub name: String,
    /// Why it was skipped
    pub reason: String,
}

/// Result of a successful build.
#[derive(Debug, Clone)]
pub struct BuildReport {
    /// The new manifest snapshot
    pub manifest: VersionManifest,
    /// Records that changed since the previous manifest
    pub delta: DeltaSet,
    /// Path of the delta archive
    pub archive_path: PathBuf,
    /// Archive entry names, in archive order
    pub entries: Vec<String>,
    /// Bundles that could not be hashed or have no sidecar
    pub skipped: Vec<SkippedBundle>,
    /// Mirror directory the archive was unpacked into
    pub mirrored_to: Option<PathBuf>,
}

/// Builds delta packages from a populated output directory.
#[derive(Debug, Clone, Default)]
pub struct PackageBuilder<H = FileHasher> {
    hasher: H,
}

impl PackageBuilder {
    /// Creates a builder using the default CRC-32 / SHA-256 hasher.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<H: BundleHasher> PackageBuilder<H> {
    /// Creates a builder with a custom hasher.
    pub fn with_hasher(hasher: H) -> Self {
        Self { hasher }
    }

    /// Runs a complete build.
    ///
    /// Fatal errors abort before anything is written to the publish root.
    pub fn build(&self, request: &BuildRequest) -> Result<BuildReport, BuildError> {
        let output_dir = request.output_dir();
        let target = request.target.as_str();

        if !output_dir.is_dir() {
            return Err(BuildError::MissingOutputDir(output_dir));
        }
        for catalog_file in [target.to_string(), sidecar_name(target)] {
            let path = output_dir.join(catalog_file);
            if !path.is_file() {
                return Err(BuildError::MissingCatalog(path));
            }
        }

        let (manifest, skipped) = self.hash_bundles(&output_dir, target, request.version)?;
        let delta = diff(request.previous.as_ref(), &manifest);
        info!(
            build_target = target,
            version = request.version,
            bundles = manifest.len(),
            changed = delta.len(),
            "computed delta"
        );

        // The published manifest is the next build's diff base, so it is
        // only replaced once the archive exists.
        let manifest_json = manifest.to_json()?;
        let files = archive_file_list(&delta, target);
        let archive_path = request
            .publish_root
            .join(archive_name(target, request.version));
        write_archive(
            &archive_path,
            &output_dir,
            &files,
            &[(MANIFEST_FILE_NAME, manifest_json.as_bytes())],
        )?;
        atomic_write(&output_dir.join(MANIFEST_FILE_NAME), manifest_json.as_bytes())?;

        let mut entries = files;
        entries.push(MANIFEST_FILE_NAME.to_string());

        // Marker goes last: pollers must never see a version without its archive.
        let marker_path = request.publish_root.join(VERSION_MARKER_FILE_NAME);
        atomic_write(&marker_path, request.version.to_string().as_bytes())?;

        let mirrored_to = match &request.mirror_path {
            Some(mirror) => {
                stage_mirror(&archive_path, &marker_path, mirror, target)?;
                Some(mirror.clone())
            }
            None => None,
        };

        info!(
            archive = %archive_path.display(),
            entries = entries.len(),
            skipped = skipped.len(),
            "build finished"
        );

        Ok(BuildReport {
            manifest,
            delta,
            archive_path,
            entries,
            skipped,
            mirrored_to,
        })
    }

    /// Hashes every discovered bundle; failures are reported, not fatal.
    fn hash_bundles(
        &self,
        output_dir: &Path,
        target: &str,
        version: u32,
    ) -> Result<(VersionManifest, Vec<SkippedBundle>), BuildError> {
        let discovered = discover_bundles(output_dir, target)?;
        let mut skipped = Vec::new();

        for name in discovered.missing_sidecar {
            warn!(bundle = %name, "bundle has no sidecar manifest, leaving it out");
            skipped.push(SkippedBundle {
                reason: format!("missing sidecar {}", sidecar_name(&name)),
                name,
            });
        }

        let mut records = Vec::with_capacity(discovered.bundles.len());
        for name in discovered.bundles {
            match self.hasher.digest(&output_dir.join(&name)) {
                Ok(digest) => {
                    records.push(BundleRecord::new(name, digest.checksum, digest.content_hash))
                }
                Err(e) => {
                    warn!(bundle = %name, error = %e, "hashing failed, leaving bundle out");
                    skipped.push(SkippedBundle {
                        name,
                        reason: e.to_string(),
                    });
                }
            }
        }

        if records.is_empty() {
            return Err(BuildError::NoBundles {
                target: target.to_string(),
            });
        }

        Ok((VersionManifest::new(version, records), skipped))
    }
}

/// Changed bundles with their sidecars, then the catalog pair.
fn archive_file_list(delta: &DeltaSet, target: &str) -> Vec<String> {
    let mut entries = Vec::with_capacity(delta.len() * 2 + 3);
    for record in delta {
        entries.push(record.name().to_string());
        entries.push(record.sidecar_name());
    }
    entries.push(target.to_string());
    entries.push(sidecar_name(target));
    entries
}

/// Copies the archive and marker into `mirror` and unpacks the archive
/// into `mirror/<target>`, overwriting what is there.
fn stage_mirror(
    archive_path: &Path,
    marker_path: &Path,
    mirror: &Path,
    target: &str,
) -> Result<(), BuildError> {
    fs::create_dir_all(mirror)?;

    if let Some(file_name) = archive_path.file_name() {
        fs::copy(archive_path, mirror.join(file_name))?;
    }
    let extracted = extract_overwrite(archive_path, &mirror.join(target))?;
    fs::copy(marker_path, mirror.join(VERSION_MARKER_FILE_NAME))?;

    info!(
        mirror = %mirror.display(),
        files = extracted.len(),
        "staged archive into mirror"
    );
    Ok(())
}

/// Loads the manifest published by the previous build of `target`.
///
/// Returns `Ok(None)` when the target was never built. A manifest that
/// exists but cannot be parsed is an error: diffing against it would
/// silently republish everything.
pub fn read_published_manifest(
    publish_root: &Path,
    target: &str,
) -> Result<Option<VersionManifest>, BuildError> {
    let manifest_path = publish_root.join(target).join(MANIFEST_FILE_NAME);
    let json = match fs::read_to_string(&manifest_path) {
        Ok(json) => json,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let version = match fs::read_to_string(publish_root.join(VERSION_MARKER_FILE_NAME)) {
        Ok(text) => parse_version_marker(&text)?,
        Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
        Err(e) => return Err(e.into()),
    };

    Ok(Some(VersionManifest::from_json(version, &json)?))
}

/// Errors that abort a build
#[derive(Debug, Error)]
pub enum BuildError {
    /// The target's build output directory does not exist
    #[error("build output directory not found: {0}")]
    MissingOutputDir(PathBuf),

    /// The catalog or its sidecar is missing from the output directory
    #[error("catalog file not found: {0}")]
    MissingCatalog(PathBuf),

    /// No bundle could be hashed
    #[error("no bundles could be hashed for target {target}")]
    NoBundles {
        /// Target being built
        target: String,
    },

    /// Previously published manifest or marker is malformed
    #[error("Serialization error: {0}")]
    Serialization(#[from] SerializationError),

    /// Archive container error
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
