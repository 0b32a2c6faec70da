// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Incremental sync client
//!
//! Polls a published catalog, downloads the bundles that changed since the
//! last committed version and commits them into a local cache:
//! - [`CatalogSource`]: where catalog files come from (HTTP, directory, mock)
//! - [`SyncEngine`]: the update state machine
//! - [`LocalCache`]: committed files plus a per-cycle staging area

mod backoff;
mod cache;
mod config;
mod directory;
mod engine;
mod fetcher;
mod mock;

pub use backoff::RetryPolicy;
pub(crate) use cache::atomic_write;
pub use cache::{CacheError, CommitSummary, LocalCache, LocalCacheState, StagingArea};
pub use config::{platform_target, SyncConfig};
pub use directory::DirectoryCatalog;
pub use engine::{SyncEngine, SyncError, SyncOutcome, SyncPhase, TaskError, TaskFailure};
#[cfg(feature = "http")]
pub use fetcher::HttpCatalogFetcher;
pub use fetcher::{CatalogSource, NetworkError, RemoteLayout};
pub use mock::MockCatalog;
