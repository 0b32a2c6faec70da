// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Remote catalog fetching
//!
//! This module provides:
//! - The [`CatalogSource`] trait the sync engine downloads through
//! - The URL layout of a published catalog
//! - An HTTP implementation over reqwest (feature `http`)
//!
//! Every call is a single attempt. Retrying is the engine's business.

use thiserror::Error;

use crate::bundle::{sidecar_name, BundleRecord, MANIFEST_FILE_NAME, VERSION_MARKER_FILE_NAME};

#[cfg(feature = "http")]
use super::config::SyncConfig;
#[cfg(feature = "http")]
use crate::bundle::parse_version_marker;
#[cfg(feature = "http")]
use reqwest::Client;

/// Read access to a published catalog.
///
/// Implementations hold their own location (base URL, directory, ...).
#[allow(async_fn_in_trait)]
pub trait CatalogSource {
    /// Fetches the version marker.
    async fn fetch_version_marker(&self) -> Result<u32, NetworkError>;

    /// Fetches the manifest records of `target`.
    async fn fetch_manifest(&self, target: &str) -> Result<Vec<BundleRecord>, NetworkError>;

    /// Fetches a bundle blob (or the catalog, whose name is the target).
    async fn fetch_bundle(&self, target: &str, name: &str) -> Result<Vec<u8>, NetworkError>;

    /// Fetches the text sidecar of a bundle.
    async fn fetch_sidecar(&self, target: &str, name: &str) -> Result<String, NetworkError>;
}

/// URL layout of a published catalog.
///
/// ```text
/// <base>/<index_prefix>/version.txt
/// <base>/<index_prefix>/<target>/versionData.json
/// <base>/<target>/<name>
/// <base>/<target>/<name>.manifest
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayout {
    base_url: String,
    index_prefix: String,
}

impl RemoteLayout {
    /// Creates a layout; trailing and leading slashes are normalized.
    pub fn new(base_url: &str, index_prefix: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            index_prefix: index_prefix.trim_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn version_marker_url(&self) -> String {
        self.index_url(VERSION_MARKER_FILE_NAME)
    }

    pub fn manifest_url(&self, target: &str) -> String {
        self.index_url(&format!("{}/{}", target, MANIFEST_FILE_NAME))
    }

    pub fn bundle_url(&self, target: &str, name: &str) -> String {
        format!("{}/{}/{}", self.base_url, target, name)
    }

    pub fn sidecar_url(&self, target: &str, name: &str) -> String {
        self.bundle_url(target, &sidecar_name(name))
    }

    fn index_url(&self, path: &str) -> String {
        if self.index_prefix.is_empty() {
            format!("{}/{}", self.base_url, path)
        } else {
            format!("{}/{}/{}", self.base_url, self.index_prefix, path)
        }
    }
}

/// Fetches catalog files over plain HTTP GET
#[cfg(feature = "http")]
pub struct HttpCatalogFetcher {
    client: Client,
    layout: RemoteLayout,
    max_content_size: u64,
}

#[cfg(feature = "http")]
impl HttpCatalogFetcher {
    /// Create a new fetcher from config
    pub fn new(config: &SyncConfig) -> Result<Self, NetworkError> {
        let layout = RemoteLayout::new(&config.base_url, &config.index_prefix);
        let setup_error = |e: reqwest::Error| NetworkError::Connection {
            url: layout.base_url().to_string(),
            reason: e.to_string(),
        };

        let mut builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(format!(
                "bundlesync/{}",
                option_env!("CARGO_PKG_VERSION").unwrap_or("0.1.0")
            ));

        if let Some(proxy_url) = &config.proxy_url {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url).map_err(setup_error)?);
        }

        Ok(Self {
            client: builder.build().map_err(setup_error)?,
            layout: layout.clone(),
            max_content_size: config.max_content_size,
        })
    }

    /// Get the URL layout
    pub fn layout(&self) -> &RemoteLayout {
        &self.layout
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|e| NetworkError::Connection {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

        if !response.status().is_success() {
            return Err(NetworkError::Protocol {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        // Check content length before downloading
        if let Some(len) = response.content_length() {
            if len > self.max_content_size {
                return Err(NetworkError::TooLarge {
                    url: url.to_string(),
                    size: len,
                    max: self.max_content_size,
                });
            }
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| NetworkError::Connection {
                url: url.to_string(),
                reason: e.to_string(),
            })?
            .to_vec();

        // Verify size after download (in case content-length was missing)
        if data.len() as u64 > self.max_content_size {
            return Err(NetworkError::TooLarge {
                url: url.to_string(),
                size: data.len() as u64,
                max: self.max_content_size,
            });
        }

        Ok(data)
    }

    async fn get_text(&self, url: &str) -> Result<String, NetworkError> {
        let data = self.get_bytes(url).await?;
        String::from_utf8(data).map_err(|e| NetworkError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

#[cfg(feature = "http")]
impl CatalogSource for HttpCatalogFetcher {
    async fn fetch_version_marker(&self) -> Result<u32, NetworkError> {
        let url = self.layout.version_marker_url();
        let text = self.get_text(&url).await?;
        parse_version_marker(&text).map_err(|e| NetworkError::Decode {
            url,
            reason: e.to_string(),
        })
    }

    async fn fetch_manifest(&self, target: &str) -> Result<Vec<BundleRecord>, NetworkError> {
        let url = self.layout.manifest_url(target);
        let data = self.get_bytes(&url).await?;
        serde_json::from_slice(&data).map_err(|e| NetworkError::Decode {
            url,
            reason: e.to_string(),
        })
    }

    async fn fetch_bundle(&self, target: &str, name: &str) -> Result<Vec<u8>, NetworkError> {
        self.get_bytes(&self.layout.bundle_url(target, name)).await
    }

    async fn fetch_sidecar(&self, target: &str, name: &str) -> Result<String, NetworkError> {
        self.get_text(&self.layout.sidecar_url(target, name)).await
    }
}

/// Errors that can occur while fetching catalog files
///
/// Every variant carries the URL (or path) that failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NetworkError {
    /// Request could not be sent or the response body was cut off
    #[error("Connection failed for {url}: {reason}")]
    Connection {
        /// Requested URL
        url: String,
        /// Underlying error message
        reason: String,
    },

    /// Server answered with a non-success status
    #[error("HTTP error {status} for {url}")]
    Protocol {
        /// Requested URL
        url: String,
        /// HTTP status code
        status: u16,
    },

    /// Payload arrived but could not be decoded
    #[error("Could not decode payload from {url}: {reason}")]
    Decode {
        /// Requested URL
        url: String,
        /// Decoding error message
        reason: String,
    },

    /// Content too large
    #[error("Content from {url} too large: {size} bytes (max {max})")]
    TooLarge {
        /// Requested URL
        url: String,
        /// Actual size in bytes
        size: u64,
        /// Maximum allowed size in bytes
        max: u64,
    },
}

impl NetworkError {
    /// The URL (or path) of the failed request.
    pub fn url(&self) -> &str {
        match self {
            NetworkError::Connection { url, .. }
            | NetworkError::Protocol { url, .. }
            | NetworkError::Decode { url, .. }
            | NetworkError::TooLarge { url, .. } => url,
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            NetworkError::Connection { .. } => true,
            NetworkError::Protocol { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            NetworkError::Decode { .. } | NetworkError::TooLarge { .. } => false,
        }
    }
}
