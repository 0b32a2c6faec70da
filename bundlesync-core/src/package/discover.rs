// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Bundle enumeration in a build output directory.

use std::io;
use std::path::{Component, Path};

use tracing::debug;
use walkdir::WalkDir;

use crate::bundle::{sidecar_name, MANIFEST_FILE_NAME, SIDECAR_EXTENSION};

/// Bundles found in an output directory.
#[derive(Debug, Default)]
pub(crate) struct Discovered {
    /// Bundle names that have a sidecar, sorted
    pub bundles: Vec<String>,
    /// Bundle names without a sidecar
    pub missing_sidecar: Vec<String>,
}

/// Lists every bundle below `output_dir`.
///
/// The catalog pair, sidecars, the manifest file, hidden entries and
/// leftover temp files are not bundles.
pub(crate) fn discover_bundles(output_dir: &Path, target: &str) -> io::Result<Discovered> {
    let catalog_sidecar = sidecar_name(target);
    let sidecar_suffix = format!(".{}", SIDECAR_EXTENSION);
    let mut found = Discovered::default();

    for entry in WalkDir::new(output_dir).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let Ok(relative) = entry.path().strip_prefix(output_dir) else {
            continue;
        };
        let Some(name) = bundle_name(relative) else {
            debug!(path = %entry.path().display(), "skipping non UTF-8 path");
            continue;
        };

        if name == target
            || name == catalog_sidecar
            || name == MANIFEST_FILE_NAME
            || name.ends_with(&sidecar_suffix)
            || name.ends_with(".tmp")
            || name.split('/').any(|part| part.starts_with('.'))
        {
            continue;
        }

        if output_dir.join(sidecar_name(&name)).is_file() {
            found.bundles.push(name);
        } else {
            found.missing_sidecar.push(name);
        }
    }

    Ok(found)
}

/// Joins the normal components of a relative path with `/`.
fn bundle_name(relative: &Path) -> Option<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_str()?),
            _ => return None,
        }
    }
    Some(parts.join("/"))
}
