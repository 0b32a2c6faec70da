// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! bundlesync CLI
//!
//! Builds delta packages on the publishing side and keeps a local bundle
//! cache in sync on the consuming side.

mod commands;
mod config;
mod display;

use std::io;
use std::path::PathBuf;

use anyhow::Result;
use bundlesync_core::sync::platform_target;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use tracing_subscriber::EnvFilter;

use config::CliConfig;

#[derive(Parser)]
#[command(name = "bundlesync")]
#[command(version, about = "Versioned bundle packaging and incremental sync")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Local cache directory (default: platform cache dir + /bundlesync)
    #[arg(long, global = true, env = "BUNDLESYNC_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Base URL of the static host serving published bundles
    #[arg(
        long,
        global = true,
        env = "BUNDLESYNC_URL",
        default_value = "http://localhost:8000"
    )]
    url: String,

    /// Target identifier (platform)
    #[arg(long, global = true, env = "BUNDLESYNC_TARGET", default_value_t = platform_target())]
    target: String,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Hash a build output, diff it and write the delta archive
    Build {
        /// Directory holding version.txt, the archives and one directory per target
        #[arg(long)]
        publish_root: PathBuf,

        /// Version number to publish
        #[arg(long = "version", value_name = "VERSION")]
        build_version: u32,

        /// Also unpack the archive into this directory
        #[arg(long)]
        mirror: Option<PathBuf>,

        /// Ignore the previously published manifest and package everything
        #[arg(long)]
        full: bool,
    },

    /// Download changed bundles into the local cache
    Sync {
        /// Keep polling instead of syncing once
        #[arg(long)]
        watch: bool,

        /// Seconds between polls in watch mode
        #[arg(long, default_value = "3600")]
        interval: u64,

        /// Stop watching after this many cycles
        #[arg(long)]
        cycles: Option<usize>,

        /// Read from a local publish root or mirror instead of the URL
        #[arg(long)]
        from_dir: Option<PathBuf>,

        /// Path segment in front of version.txt and manifest URLs
        #[arg(long, default_value = "game")]
        index_prefix: String,

        /// Proxy for all requests
        #[arg(long)]
        proxy: Option<String>,

        /// Request timeout in seconds
        #[arg(long, default_value = "30")]
        timeout: u64,

        /// Attempts per request, including the first one
        #[arg(long, default_value = "3")]
        retries: u32,

        /// Downloads in flight at the same time
        #[arg(long, default_value = "8")]
        max_concurrent: usize,

        /// Delete cached bundles the new manifest no longer lists
        #[arg(long)]
        prune: bool,
    },

    /// Print the bundles of NEW that are not in OLD
    Diff {
        /// Previous manifest file (versionData.json)
        old: PathBuf,

        /// New manifest file
        new: PathBuf,

        /// Print the changed records as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show what the local cache holds
    Status,

    /// Generate shell completions
    Completions {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    // Resolve cache directory
    let cache_dir = cli.cache_dir.unwrap_or_else(|| {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("bundlesync")
    });

    let config = CliConfig {
        cache_dir,
        base_url: cli.url,
        target: cli.target,
    };

    match cli.command {
        Commands::Build {
            publish_root,
            build_version,
            mirror,
            full,
        } => {
            commands::build::run(&config, &publish_root, build_version, mirror, full)?;
        }
        Commands::Sync {
            watch,
            interval,
            cycles,
            from_dir,
            index_prefix,
            proxy,
            timeout,
            retries,
            max_concurrent,
            prune,
        } => {
            let options = commands::sync::SyncOptions {
                watch,
                interval,
                cycles,
                from_dir,
                index_prefix,
                proxy,
                timeout,
                retries,
                max_concurrent,
                prune,
            };
            commands::sync::run(&config, options).await?;
        }
        Commands::Diff { old, new, json } => {
            commands::diff::run(&old, &new, json)?;
        }
        Commands::Status => {
            commands::status::run(&config)?;
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            generate(shell, &mut cmd, "bundlesync", &mut io::stdout());
        }
    }

    Ok(())
}

/// Installs the stderr log subscriber; `RUST_LOG` adds to the defaults.
fn init_logging(verbose: bool) -> Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::from_default_env()
        .add_directive(format!("bundlesync={}", level).parse()?)
        .add_directive(format!("bundlesync_core={}", level).parse()?);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
    Ok(())
}
