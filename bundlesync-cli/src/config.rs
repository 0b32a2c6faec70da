// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! CLI Configuration

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bundlesync_core::{LocalCache, SyncConfig};

/// CLI configuration.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Local cache root.
    pub cache_dir: PathBuf,
    /// Base URL of the static host.
    pub base_url: String,
    /// Target identifier.
    pub target: String,
}

impl CliConfig {
    /// Opens the local cache of the configured target.
    pub fn cache(&self) -> Result<LocalCache> {
        LocalCache::new(&self.cache_dir, &self.target)
            .with_context(|| format!("Cannot use target {:?}", self.target))
    }

    /// Base sync configuration; the sync command adds its flags on top.
    pub fn sync_config(&self) -> Result<SyncConfig> {
        let url = url::Url::parse(&self.base_url)
            .with_context(|| format!("Invalid base URL: {}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            bail!("Unsupported URL scheme {:?}, expected http or https", url.scheme());
        }

        Ok(SyncConfig::new(self.base_url.as_str(), self.target.as_str())
            .with_storage_path(&self.cache_dir))
    }
}
