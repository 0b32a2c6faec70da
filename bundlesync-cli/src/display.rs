// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Display Helpers
//!
//! Terminal output formatting and styling.

use bundlesync_core::{BundleRecord, LocalCacheState, SyncError, SyncOutcome};
use console::style;

/// Prints a success message.
pub fn success(msg: &str) {
    println!("{} {}", style("✓").green().bold(), msg);
}

/// Prints an error message.
pub fn error(msg: &str) {
    eprintln!("{} {}", style("✗").red().bold(), msg);
}

/// Prints a warning message.
pub fn warning(msg: &str) {
    println!("{} {}", style("⚠").yellow().bold(), msg);
}

/// Prints an info message.
pub fn info(msg: &str) {
    println!("{} {}", style("ℹ").blue().bold(), msg);
}

/// Prints one record per line: name, checksum, short content hash.
pub fn display_records<'a>(records: impl IntoIterator<Item = &'a BundleRecord>) {
    for record in records {
        let hash = record.content_hash();
        let short = hash.get(..12).unwrap_or(hash);
        println!(
            "  {:40} {:08x}  {}",
            record.name(),
            record.checksum(),
            style(short).dim()
        );
    }
}

/// Reports the result of one sync cycle.
pub fn display_sync_result(result: &Result<SyncOutcome, SyncError>) {
    match result {
        Ok(SyncOutcome::UpToDate { version }) => {
            info(&format!("Already up to date (version {})", version));
        }
        Ok(SyncOutcome::Updated {
            version,
            downloaded,
            pruned,
        }) => {
            success(&format!(
                "Synced version {} ({} downloaded)",
                version,
                downloaded.len()
            ));
            for name in downloaded {
                println!("  {}", name);
            }
            if !pruned.is_empty() {
                info(&format!("Pruned {} stale bundle(s)", pruned.len()));
            }
        }
        Err(SyncError::Incomplete { failures }) => {
            error(&format!(
                "Sync incomplete, {} download(s) failed; cache left unchanged",
                failures.len()
            ));
            for failure in failures {
                eprintln!("  {}: {}", failure.name, failure.error);
            }
        }
        Err(e) => error(&format!("Sync failed: {}", e)),
    }
}

/// Prints the cache summary.
pub fn display_cache_state(state: &LocalCacheState, cache_dir: &str) {
    println!("{}", "─".repeat(40));
    println!("  {}", style(&state.target).bold().cyan());
    println!("{}", "─".repeat(40));
    println!("  Cache dir: {}", cache_dir);
    match state.marker {
        Some(marker) => println!("  Version:   {}", marker),
        None => println!("  Version:   {}", style("(never synced)").dim()),
    }
    match &state.manifest {
        Some(manifest) => println!("  Bundles:   {}", manifest.len()),
        None => println!("  Bundles:   {}", style("(no manifest)").dim()),
    }
    println!("  Files:     {}", state.files.len());
    println!("{}", "─".repeat(40));
}
