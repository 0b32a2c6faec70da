// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sync engine - orchestrates one update cycle
//!
//! ```text
//! Idle -> CheckingVersion -> NoUpdate
//!                         -> FetchingManifest -> Diffing -> Downloading -> Committing -> Idle
//! any failure -> Failed(reason)
//! ```
//!
//! The terminal phase of a cycle stays observable until the next cycle
//! starts. Downloads go to a staging area; the cache and its manifest are
//! only touched once every task of the cycle succeeded.

use std::collections::HashSet;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future;
use futures_util::stream::{self, StreamExt};
use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use super::cache::{CacheError, LocalCache, StagingArea};
use super::config::SyncConfig;
use super::fetcher::{CatalogSource, NetworkError};
use crate::bundle::{
    diff, stale_names, validate_bundle_name, InvalidBundleName, VersionManifest,
};

/// Observable state of the engine
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SyncPhase {
    /// No cycle has run yet, or the last cycle committed
    #[default]
    Idle,
    /// Fetching the remote version marker
    CheckingVersion,
    /// Remote marker equals the recorded one
    NoUpdate,
    /// Fetching the remote manifest
    FetchingManifest,
    /// Computing the delta against the cached manifest
    Diffing,
    /// Download tasks running
    Downloading {
        /// Tasks not yet finished
        outstanding: usize,
    },
    /// Moving staged files into the cache
    Committing,
    /// The cycle failed; the cache was not modified.
    ///
    /// Unlike a plain return to `Idle`, the reason stays readable through
    /// [`SyncEngine::phase`] until the next cycle starts. The engine accepts
    /// a new cycle in this phase exactly as it does in `Idle`.
    Failed(String),
}

/// Result of a successful cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Recorded marker already matches the remote one
    UpToDate {
        /// The current version
        version: u32,
    },
    /// New version committed
    Updated {
        /// The committed version
        version: u32,
        /// Downloaded bundle names, catalog included
        downloaded: Vec<String>,
        /// Bundles deleted by pruning
        pruned: Vec<String>,
    },
}

/// Drives sync cycles for one target
pub struct SyncEngine<S> {
    source: S,
    cache: LocalCache,
    config: SyncConfig,
    phase: watch::Sender<SyncPhase>,
    cycle: Mutex<()>,
    outstanding: AtomicUsize,
}

impl<S: CatalogSource> SyncEngine<S> {
    /// Create a new engine caching below `config.storage_path`
    pub fn new(source: S, config: SyncConfig) -> Result<Self, SyncError> {
        let cache = LocalCache::new(&config.storage_path, &config.target)?;
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Ok(Self {
            source,
            cache,
            config,
            phase,
            cycle: Mutex::new(()),
            outstanding: AtomicUsize::new(0),
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Current phase
    pub fn phase(&self) -> SyncPhase {
        self.phase.borrow().clone()
    }

    /// Receiver notified on every phase change
    pub fn subscribe(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Runs one cycle, waiting for a running cycle to finish first.
    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        let _guard = self.cycle.lock().await;
        self.run_guarded().await
    }

    /// Runs one cycle unless another one is in progress.
    pub async fn try_sync(&self) -> Result<SyncOutcome, SyncError> {
        let _guard = self.cycle.try_lock().map_err(|_| SyncError::Busy)?;
        self.run_guarded().await
    }

    /// Runs cycles separated by `interval`, forever if `cycles` is `None`.
    ///
    /// Failed cycles are reported to `on_cycle` and polling goes on.
    pub async fn run_polling<F>(&self, interval: Duration, cycles: Option<usize>, mut on_cycle: F)
    where
        F: FnMut(&Result<SyncOutcome, SyncError>),
    {
        let mut completed = 0usize;
        loop {
            let result = self.sync().await;
            on_cycle(&result);
            completed += 1;

            if cycles.is_some_and(|limit| completed >= limit) {
                break;
            }
            debug!(?interval, "waiting for next poll");
            tokio::time::sleep(interval).await;
        }
    }

    async fn run_guarded(&self) -> Result<SyncOutcome, SyncError> {
        let result = self.run_cycle().await;
        if let Err(e) = &result {
            warn!(sync_target = self.cache.target(), error = %e, "sync cycle failed");
            self.set_phase(SyncPhase::Failed(e.to_string()));
        }
        result
    }

    async fn run_cycle(&self) -> Result<SyncOutcome, SyncError> {
        let target = self.cache.target();

        self.set_phase(SyncPhase::CheckingVersion);
        let marker = self
            .with_retry(move || self.source.fetch_version_marker())
            .await?;

        if self.cache.recorded_marker() == Some(marker) {
            debug!(sync_target = target, version = marker, "cache is up to date");
            self.set_phase(SyncPhase::NoUpdate);
            return Ok(SyncOutcome::UpToDate { version: marker });
        }

        self.set_phase(SyncPhase::FetchingManifest);
        let records = self
            .with_retry(move || self.source.fetch_manifest(target))
            .await?;
        let remote = VersionManifest::new(marker, records);

        let local = self.cache.load_manifest().unwrap_or_else(|e| {
            warn!(sync_target = target, error = %e, "cached manifest unreadable, syncing everything");
            None
        });

        self.set_phase(SyncPhase::Diffing);
        let delta = diff(local.as_ref(), &remote);
        let names = download_names(target, delta.names());
        info!(
            sync_target = target,
            version = marker,
            changed = delta.len(),
            "downloading changed bundles"
        );

        let staging = self.cache.begin_staging()?;
        self.outstanding.store(names.len(), Ordering::SeqCst);
        self.set_phase(SyncPhase::Downloading {
            outstanding: names.len(),
        });

        let results: Vec<Result<(), TaskFailure>> = stream::iter(names.iter())
            .map(|name| self.run_task(&staging, target, name))
            .buffer_unordered(self.config.max_concurrent_downloads.max(1))
            .collect()
            .await;
        let failures: Vec<TaskFailure> = results.into_iter().filter_map(Result::err).collect();

        if !failures.is_empty() {
            if let Err(e) = self.cache.discard(staging) {
                warn!(error = %e, "could not remove staging area");
            }
            return Err(SyncError::Incomplete { failures });
        }

        self.set_phase(SyncPhase::Committing);
        let prune = if self.config.prune_stale_bundles {
            stale_names(local.as_ref(), &remote)
        } else {
            Vec::new()
        };
        let summary = self.cache.commit(staging, &remote, &prune)?;

        info!(
            sync_target = target,
            version = marker,
            files = summary.files,
            pruned = summary.pruned.len(),
            "sync committed"
        );
        self.set_phase(SyncPhase::Idle);

        Ok(SyncOutcome::Updated {
            version: marker,
            downloaded: names,
            pruned: summary.pruned,
        })
    }

    async fn run_task(
        &self,
        staging: &StagingArea,
        target: &str,
        name: &str,
    ) -> Result<(), TaskFailure> {
        let result = self.download(staging, target, name).await;

        let left = self.outstanding.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        self.set_phase(SyncPhase::Downloading { outstanding: left });

        result.map_err(|error| {
            warn!(bundle = name, error = %error, "download task failed");
            TaskFailure {
                name: name.to_string(),
                error,
            }
        })
    }

    async fn download(&self, staging: &StagingArea, target: &str, name: &str) -> Result<(), TaskError> {
        validate_bundle_name(name)?;

        let (blob, sidecar) = future::join(
            self.with_retry(move || self.source.fetch_bundle(target, name)),
            self.with_retry(move || self.source.fetch_sidecar(target, name)),
        )
        .await;

        staging.write_bundle(name, &blob?)?;
        staging.write_sidecar(name, &sidecar?)?;
        debug!(bundle = name, "staged");
        Ok(())
    }

    async fn with_retry<T, F, Fut>(&self, mut request: F) -> Result<T, NetworkError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, NetworkError>>,
    {
        let policy = self.config.retry;
        let mut failures = 0u32;
        loop {
            match request().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    failures += 1;
                    if !policy.should_retry(failures, &e) {
                        warn!(url = e.url(), attempts = failures, error = %e, "request failed");
                        return Err(e);
                    }
                    let delay = policy.delay_for(failures);
                    debug!(url = e.url(), attempt = failures, ?delay, "retrying request");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    fn set_phase(&self, phase: SyncPhase) {
        self.phase.send_replace(phase);
    }
}

/// Delta names in manifest order, deduplicated, with the catalog appended
/// unless already listed.
fn download_names<'a>(target: &str, delta: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names: Vec<String> = delta
        .filter(|name| seen.insert(*name))
        .map(str::to_string)
        .collect();
    if !seen.contains(target) {
        names.push(target.to_string());
    }
    names
}

/// A download task that did not reach the staging area
#[derive(Debug)]
pub struct TaskFailure {
    /// Bundle name
    pub name: String,
    /// What went wrong
    pub error: TaskError,
}

/// Why a single download task failed
#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    InvalidName(#[from] InvalidBundleName),
}

/// Errors that end a sync cycle
#[derive(Debug, Error)]
pub enum SyncError {
    /// Version marker or manifest could not be fetched
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    /// Cache or staging area could not be written
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    /// Some download tasks failed; nothing was committed
    #[error("{} of the downloads failed", failures.len())]
    Incomplete {
        /// Failed tasks
        failures: Vec<TaskFailure>,
    },

    /// Another cycle is running
    #[error("A sync cycle is already running")]
    Busy,
}

impl SyncError {
    /// Names of the bundles whose download failed, if any.
    pub fn failed_names(&self) -> Vec<&str> {
        match self {
            SyncError::Incomplete { failures } => failures.iter().map(|f| f.name.as_str()).collect(),
            _ => Vec::new(),
        }
    }
}
