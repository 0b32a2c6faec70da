// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Zip container for delta packages.

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::builder::BuildError;

/// Deterministic archive file name for a target and version.
pub fn archive_name(target: &str, version: u32) -> String {
    format!("{}_version_{}.zip", target, version)
}

/// Lists the entry names of an archive, in archive order.
pub fn archive_entries(path: &Path) -> Result<Vec<String>, BuildError> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(path)?))?;
    let mut names = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        names.push(archive.by_index_raw(i)?.name().to_string());
    }
    Ok(names)
}

/// Writes `entries` (relative to `source_dir`) into a fresh archive,
/// followed by the in-memory `generated` entries.
///
/// The archive is assembled next to `path` and renamed into place, so an
/// interrupted build never leaves a truncated archive under the final name.
pub(crate) fn write_archive(
    path: &Path,
    source_dir: &Path,
    entries: &[String],
    generated: &[(&str, &[u8])],
) -> Result<(), BuildError> {
    let temp_path = temp_sibling(path);
    let mut zip = ZipWriter::new(BufWriter::new(File::create(&temp_path)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        let mut source = File::open(source_dir.join(entry))?;
        zip.start_file(entry.as_str(), options)?;
        io::copy(&mut source, &mut zip)?;
        debug!(entry = %entry, "added archive entry");
    }
    for (entry, data) in generated {
        zip.start_file(*entry, options)?;
        zip.write_all(data)?;
        debug!(entry = %entry, "added generated archive entry");
    }

    zip.finish()?;
    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Extracts every file of an archive under `dest`, replacing existing files.
pub(crate) fn extract_overwrite(archive: &Path, dest: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let mut archive = ZipArchive::new(BufReader::new(File::open(archive)?))?;
    let mut extracted = Vec::with_capacity(archive.len());
    fs::create_dir_all(dest)?;

    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let Some(relative) = file.enclosed_name() else {
            debug!(entry = %file.name(), "skipping archive entry outside destination");
            continue;
        };
        let out_path = dest.join(relative);

        if file.is_dir() {
            fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        io::copy(&mut file, &mut out)?;
        extracted.push(out_path);
    }

    Ok(extracted)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
