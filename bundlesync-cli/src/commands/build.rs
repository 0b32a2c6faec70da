// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Build Command
//!
//! Hashes a pipeline's output directory and writes the delta archive.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bundlesync_core::{read_published_manifest, BuildRequest, PackageBuilder};

use crate::config::CliConfig;
use crate::display;

/// Runs a build for the configured target.
pub fn run(
    config: &CliConfig,
    publish_root: &Path,
    version: u32,
    mirror: Option<PathBuf>,
    full: bool,
) -> Result<()> {
    let previous = if full {
        None
    } else {
        read_published_manifest(publish_root, &config.target)
            .context("Cannot read the previously published manifest")?
    };

    if let Some(previous) = &previous {
        display::info(&format!(
            "Diffing against published version {} ({} bundles)",
            previous.version(),
            previous.len()
        ));
    }

    let mut request = BuildRequest::new(publish_root, config.target.as_str(), version)
        .with_previous(previous);
    if let Some(mirror) = mirror {
        request = request.with_mirror(mirror);
    }

    let report = PackageBuilder::new()
        .build(&request)
        .with_context(|| format!("Build of {} version {} failed", config.target, version))?;

    for skipped in &report.skipped {
        display::warning(&format!("Skipped {}: {}", skipped.name, skipped.reason));
    }

    display::success(&format!(
        "Built {} version {}: {} of {} bundles changed",
        config.target,
        version,
        report.delta.len(),
        report.manifest.len()
    ));
    display::display_records(report.delta.iter());
    println!();
    println!("  Archive: {}", report.archive_path.display());
    if let Some(mirror) = &report.mirrored_to {
        println!("  Mirror:  {}", mirror.display());
    }

    Ok(())
}
