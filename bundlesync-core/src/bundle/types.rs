// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bundle type definitions
//!
//! These types describe one build's output for one target and the
//! changed-set between two builds.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// File name of a serialized manifest, inside the target directory.
pub const MANIFEST_FILE_NAME: &str = "versionData.json";

/// File name of the plain-text version marker polled by clients.
pub const VERSION_MARKER_FILE_NAME: &str = "version.txt";

/// Extension appended to a bundle name to form its sidecar name.
pub const SIDECAR_EXTENSION: &str = "manifest";

/// A single built bundle.
///
/// Equality and hashing are structural over all three fields: a bundle that
/// keeps its name but whose bytes changed is a different record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleRecord {
    name: String,
    /// CRC-32 of the bundle bytes
    #[serde(alias = "crc")]
    checksum: u32,
    /// Content identity digest (hex)
    #[serde(alias = "hash")]
    content_hash: String,
}

impl BundleRecord {
    /// Creates a record.
    pub fn new(name: impl Into<String>, checksum: u32, content_hash: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            checksum,
            content_hash: content_hash.into(),
        }
    }

    /// Bundle name, a `/`-separated path relative to the target directory.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    /// Name of the text sidecar that accompanies this bundle.
    pub fn sidecar_name(&self) -> String {
        sidecar_name(&self.name)
    }
}

/// The versioned list of bundle records produced by one build.
///
/// Only the records are serialized (as a JSON array). The version travels
/// separately in the version marker file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct VersionManifest {
    version: u32,
    records: Vec<BundleRecord>,
}

impl VersionManifest {
    /// Creates a manifest from records in build order.
    pub fn new(version: u32, records: Vec<BundleRecord>) -> Self {
        Self { version, records }
    }

    /// Creates a manifest without records.
    pub fn empty(version: u32) -> Self {
        Self::new(version, Vec::new())
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn records(&self) -> &[BundleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterates over bundle names in build order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(BundleRecord::name)
    }

    /// Finds the record for a bundle name.
    pub fn find(&self, name: &str) -> Option<&BundleRecord> {
        self.records.iter().find(|r| r.name == name)
    }

    /// Returns true if a structurally equal record is listed.
    pub fn contains(&self, record: &BundleRecord) -> bool {
        self.records.contains(record)
    }

    pub fn into_records(self) -> Vec<BundleRecord> {
        self.records
    }

    /// Serializes the records as a pretty-printed JSON array.
    pub fn to_json(&self) -> Result<String, SerializationError> {
        Ok(serde_json::to_string_pretty(&self.records)?)
    }

    /// Parses a JSON record array and attaches the given version.
    pub fn from_json(version: u32, json: &str) -> Result<Self, SerializationError> {
        let records: Vec<BundleRecord> = serde_json::from_str(json)?;
        Ok(Self::new(version, records))
    }
}

/// Records of a new manifest that are absent from an old one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DeltaSet {
    records: Vec<BundleRecord>,
}

impl DeltaSet {
    pub(crate) fn new(records: Vec<BundleRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[BundleRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, BundleRecord> {
        self.records.iter()
    }

    /// Iterates over changed bundle names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(BundleRecord::name)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.name() == name)
    }

    pub fn into_records(self) -> Vec<BundleRecord> {
        self.records
    }
}

impl<'a> IntoIterator for &'a DeltaSet {
    type Item = &'a BundleRecord;
    type IntoIter = std::slice::Iter<'a, BundleRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Returns the sidecar file name for a bundle (or catalog) name.
pub fn sidecar_name(name: &str) -> String {
    format!("{}.{}", name, SIDECAR_EXTENSION)
}

/// Parses the contents of a version marker file.
pub fn parse_version_marker(text: &str) -> Result<u32, SerializationError> {
    let trimmed = text.trim();
    trimmed
        .parse()
        .map_err(|_| SerializationError::Marker(trimmed.to_string()))
}

/// Checks that a bundle name is a safe relative path.
///
/// Names come from remote manifests and end up joined onto cache paths, so
/// anything that could escape the target directory is rejected.
pub fn validate_bundle_name(name: &str) -> Result<(), InvalidBundleName> {
    let reject = |reason| {
        Err(InvalidBundleName {
            name: name.to_string(),
            reason,
        })
    };

    if name.is_empty() {
        return reject("empty name");
    }
    if name.starts_with('/') || name.contains('\\') || name.contains(':') {
        return reject("not a relative path");
    }
    if name
        .split('/')
        .any(|part| part.is_empty() || part == "." || part == "..")
    {
        return reject("empty or relative path component");
    }
    if name == MANIFEST_FILE_NAME {
        return reject("reserved for the manifest file");
    }
    Ok(())
}

/// A bundle name that cannot be stored safely.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid bundle name {name:?}: {reason}")]
pub struct InvalidBundleName {
    /// The rejected name
    pub name: String,
    /// Why it was rejected
    pub reason: &'static str,
}

/// Malformed manifest or version marker payload.
#[derive(Debug, Error)]
pub enum SerializationError {
    /// Manifest JSON could not be parsed or written
    #[error("malformed manifest: {0}")]
    Json(#[from] serde_json::Error),

    /// Version marker is not an unsigned integer
    #[error("malformed version marker: {0:?}")]
    Marker(String),
}
