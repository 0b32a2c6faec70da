// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Delta package builder
//!
//! Turns a populated build output directory into:
//! - a new manifest snapshot (`<target>/versionData.json`)
//! - a delta archive with only the bundles that changed
//! - a plain-text version marker for cheap client polling
//!
//! Optionally the archive is unpacked into a secondary mirror directory
//! for offline distribution.

mod archive;
mod builder;
mod discover;

pub use archive::{archive_entries, archive_name};
pub use builder::{
    read_published_manifest, BuildError, BuildReport, BuildRequest, PackageBuilder, SkippedBundle,
};
