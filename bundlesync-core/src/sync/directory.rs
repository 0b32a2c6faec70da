// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Catalog source backed by a local directory
//!
//! Reads the layout written by the package builder (publish root or
//! mirror): `version.txt` at the root and one directory per target. Used
//! for offline distribution where no HTTP host is available.

use std::io;
use std::path::{Path, PathBuf};

use super::fetcher::{CatalogSource, NetworkError};
use crate::bundle::{
    parse_version_marker, sidecar_name, BundleRecord, MANIFEST_FILE_NAME, VERSION_MARKER_FILE_NAME,
};

/// Catalog stored in a local directory
#[derive(Debug, Clone)]
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    async fn read(&self, path: PathBuf) -> Result<Vec<u8>, NetworkError> {
        tokio::fs::read(&path).await.map_err(|e| io_error(&path, e))
    }

    async fn read_text(&self, path: PathBuf) -> Result<String, NetworkError> {
        let data = self.read(path.clone()).await?;
        String::from_utf8(data).map_err(|e| NetworkError::Decode {
            url: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

impl CatalogSource for DirectoryCatalog {
    async fn fetch_version_marker(&self) -> Result<u32, NetworkError> {
        let path = self.root.join(VERSION_MARKER_FILE_NAME);
        let text = self.read_text(path.clone()).await?;
        parse_version_marker(&text).map_err(|e| NetworkError::Decode {
            url: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    async fn fetch_manifest(&self, target: &str) -> Result<Vec<BundleRecord>, NetworkError> {
        let path = self.root.join(target).join(MANIFEST_FILE_NAME);
        let data = self.read(path.clone()).await?;
        serde_json::from_slice(&data).map_err(|e| NetworkError::Decode {
            url: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    async fn fetch_bundle(&self, target: &str, name: &str) -> Result<Vec<u8>, NetworkError> {
        self.read(self.root.join(target).join(name)).await
    }

    async fn fetch_sidecar(&self, target: &str, name: &str) -> Result<String, NetworkError> {
        self.read_text(self.root.join(target).join(sidecar_name(name)))
            .await
    }
}

/// Missing files look like a 404, anything else like a failed connection.
fn io_error(path: &Path, error: io::Error) -> NetworkError {
    let url = path.display().to_string();
    if error.kind() == io::ErrorKind::NotFound {
        NetworkError::Protocol { url, status: 404 }
    } else {
        NetworkError::Connection {
            url,
            reason: error.to_string(),
        }
    }
}
