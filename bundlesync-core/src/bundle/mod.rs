// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bundle data model
//!
//! Records, manifests and the delta between two manifests. Shared by the
//! package builder and the sync engine so both sides compute exactly the
//! same changed-set.

mod diff;
mod hasher;
mod types;

pub use diff::{diff, stale_names};
pub use hasher::{BundleDigest, BundleHasher, FileHasher, HashError};
pub use types::{
    parse_version_marker, sidecar_name, validate_bundle_name, BundleRecord,
    DeltaSet, InvalidBundleName, SerializationError, VersionManifest, MANIFEST_FILE_NAME,
    SIDECAR_EXTENSION, VERSION_MARKER_FILE_NAME,
};
