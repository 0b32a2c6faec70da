// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Configuration for the sync client

use std::path::PathBuf;
use std::time::Duration;

use super::backoff::RetryPolicy;

/// Configuration for the sync engine and its HTTP fetcher
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Local cache root
    pub storage_path: PathBuf,

    /// Static host serving the published files (e.g., "https://cdn.example.com")
    pub base_url: String,

    /// Target identifier whose bundles are synced
    pub target: String,

    /// Path segment in front of the version marker and manifest URLs
    pub index_prefix: String,

    /// Interval between polls in watch mode
    pub check_interval: Duration,

    /// HTTP timeout for a single request
    pub timeout: Duration,

    /// Maximum accepted payload size (bytes)
    pub max_content_size: u64,

    /// Proxy URL
    pub proxy_url: Option<String>,

    /// Retry policy for transient network failures
    pub retry: RetryPolicy,

    /// Upper bound on download tasks in flight
    pub max_concurrent_downloads: usize,

    /// Delete cached bundles that the new manifest no longer lists
    pub prune_stale_bundles: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            storage_path: PathBuf::from("."),
            base_url: "http://localhost:8000".to_string(),
            target: platform_target(),
            index_prefix: "game".to_string(),
            check_interval: Duration::from_secs(3600), // 1 hour
            timeout: Duration::from_secs(30),
            max_content_size: 256 * 1024 * 1024, // 256 MB
            proxy_url: None,
            retry: RetryPolicy::default(),
            max_concurrent_downloads: 8,
            prune_stale_bundles: false,
        }
    }
}

impl SyncConfig {
    /// Creates a config for one host and target, other fields default.
    pub fn new(base_url: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            target: target.into(),
            ..Default::default()
        }
    }

    /// Set the cache root
    pub fn with_storage_path(mut self, storage_path: impl Into<PathBuf>) -> Self {
        self.storage_path = storage_path.into();
        self
    }

    /// Configure with custom proxy
    pub fn with_proxy(mut self, proxy_url: String) -> Self {
        self.proxy_url = Some(proxy_url);
        self
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Single attempt per request
    pub fn without_retries(self) -> Self {
        self.with_retry(RetryPolicy::none())
    }

    /// Delete bundles dropped from the manifest on commit
    pub fn with_pruning(mut self) -> Self {
        self.prune_stale_bundles = true;
        self
    }
}

/// Target identifier derived from the host platform, e.g. `linux-x86_64`.
pub fn platform_target() -> String {
    format!("{}-{}", std::env::consts::OS, std::env::consts::ARCH)
}
