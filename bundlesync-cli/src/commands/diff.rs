// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Diff Command
//!
//! Prints the delta between two manifest files.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use bundlesync_core::{diff, stale_names, VersionManifest};

use crate::display;

fn load(path: &Path) -> Result<VersionManifest> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    VersionManifest::from_json(0, &json).with_context(|| format!("Cannot parse {}", path.display()))
}

/// Runs the diff command.
pub fn run(old: &Path, new: &Path, json: bool) -> Result<()> {
    let old = load(old)?;
    let new = load(new)?;
    let delta = diff(Some(&old), &new);

    if json {
        println!("{}", serde_json::to_string_pretty(delta.records())?);
        return Ok(());
    }

    if delta.is_empty() {
        display::info("No changed bundles");
    } else {
        display::info(&format!("{} changed bundle(s)", delta.len()));
        display::display_records(delta.iter());
    }

    let removed = stale_names(Some(&old), &new);
    if !removed.is_empty() {
        println!();
        display::info(&format!("{} bundle(s) no longer listed", removed.len()));
        for name in removed {
            println!("  {}", name);
        }
    }

    Ok(())
}
