// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Sync Command
//!
//! Runs one sync cycle, or keeps polling with `--watch`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Result};
use bundlesync_core::{
    CatalogSource, DirectoryCatalog, RetryPolicy, SyncConfig, SyncEngine, SyncError,
};
use tracing::info;

use crate::config::CliConfig;
use crate::display;

/// Flags of the sync command.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub watch: bool,
    pub interval: u64,
    pub cycles: Option<usize>,
    pub from_dir: Option<PathBuf>,
    pub index_prefix: String,
    pub proxy: Option<String>,
    pub timeout: u64,
    pub retries: u32,
    pub max_concurrent: usize,
    pub prune: bool,
}

impl SyncOptions {
    fn apply(&self, mut config: SyncConfig) -> SyncConfig {
        config.index_prefix = self.index_prefix.clone();
        config.timeout = Duration::from_secs(self.timeout);
        config.check_interval = Duration::from_secs(self.interval);
        config.max_concurrent_downloads = self.max_concurrent;
        config = config.with_retry(RetryPolicy {
            max_attempts: self.retries.max(1),
            ..RetryPolicy::default()
        });
        if let Some(proxy) = &self.proxy {
            config = config.with_proxy(proxy.clone());
        }
        if self.prune {
            config = config.with_pruning();
        }
        config
    }
}

/// Runs the sync command.
pub async fn run(config: &CliConfig, options: SyncOptions) -> Result<()> {
    let sync_config = options.apply(config.sync_config()?);

    if let Some(dir) = &options.from_dir {
        info!(source = %dir.display(), "syncing from directory");
        let engine = SyncEngine::new(DirectoryCatalog::new(dir), sync_config)?;
        return drive(&engine, &options).await;
    }

    #[cfg(feature = "http")]
    {
        use bundlesync_core::HttpCatalogFetcher;

        println!("Syncing {} from {}...", config.target, config.base_url);
        let fetcher = HttpCatalogFetcher::new(&sync_config)?;
        let engine = SyncEngine::new(fetcher, sync_config)?;
        drive(&engine, &options).await
    }

    #[cfg(not(feature = "http"))]
    {
        bail!("Built without HTTP support, use --from-dir")
    }
}

async fn drive<S: CatalogSource>(engine: &SyncEngine<S>, options: &SyncOptions) -> Result<()> {
    if options.watch {
        let cycles = options.cycles;
        engine
            .run_polling(engine.config().check_interval, cycles, display::display_sync_result)
            .await;
        return Ok(());
    }

    let result = engine.sync().await;
    display::display_sync_result(&result);
    match result {
        Ok(_) => Ok(()),
        Err(SyncError::Incomplete { failures }) => {
            bail!("{} download(s) failed", failures.len())
        }
        Err(e) => Err(e.into()),
    }
}
