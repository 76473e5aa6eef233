//! `ld-migrate` command line
//!
//! ## Commands
//!
//! - `ld-migrate snapshot -p <key>` - capture a source project to disk
//! - `ld-migrate migrate -p <source> -d <dest>` - replay a snapshot into a new project
//!
//! ## Exit codes
//!
//! - 0: completed cleanly
//! - 1: completed, some entities need review
//! - 2: fatal setup or configuration error
//! - 3: cancelled by the operator

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use ld_migrate_core::MigrateConfig;
use tokio_util::sync::CancellationToken;

pub mod migrate_cmd;
mod output;
pub mod snapshot_cmd;

pub use migrate_cmd::MigrateArgs;
pub use snapshot_cmd::SnapshotArgs;

pub const EXIT_OK: i32 = 0;
pub const EXIT_REVIEW: i32 = 1;
pub const EXIT_FATAL: i32 = 2;
pub const EXIT_CANCELLED: i32 = 3;

/// Copy a feature-flag project between accounts via a local snapshot
#[derive(Debug, Parser)]
#[command(name = "ld-migrate", version)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Config file (default: $LD_MIGRATE_CONFIG or ~/.config/ld-migrate/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// API access token
    #[arg(short = 'k', long, global = true, env = "LD_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// API host or base URL (default: app.launchdarkly.com)
    #[arg(short = 'u', long, global = true)]
    pub domain: Option<String>,

    /// Root of the snapshot tree (default: ./source)
    #[arg(long, global = true, value_name = "DIR")]
    pub snapshot_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a captured project into a new destination project
    Migrate(MigrateArgs),

    /// Capture a source project into the snapshot directory
    Snapshot(SnapshotArgs),
}

impl Cli {
    /// Log level used when `RUST_LOG` is unset.
    pub fn default_log_level(&self) -> &'static str {
        if self.global.verbose { "debug" } else { "info" }
    }

    pub async fn run(self, cancel: CancellationToken) -> i32 {
        let config = match self.global.resolve() {
            Ok(config) => config,
            Err(err) => {
                tracing::error!("{err:#}");
                eprintln!("error: {err:#}");
                return EXIT_FATAL;
            }
        };

        match self.command {
            Command::Migrate(args) => migrate_cmd::run(args, &config, cancel).await,
            Command::Snapshot(args) => snapshot_cmd::run(args, &config, cancel).await,
        }
    }
}

impl GlobalArgs {
    /// Config file values with command line overrides applied.
    pub fn resolve(&self) -> anyhow::Result<MigrateConfig> {
        let mut config =
            MigrateConfig::load(self.config.as_deref()).context("loading configuration")?;
        if let Some(api_key) = &self.api_key {
            config.api_key = Some(api_key.clone());
        }
        if let Some(domain) = &self.domain {
            config.domain = domain.clone();
        }
        if let Some(dir) = &self.snapshot_dir {
            config.snapshot_dir = dir.clone();
        }
        Ok(config)
    }
}
