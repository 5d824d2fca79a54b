//! CLI command definitions and implementations.

pub mod check;
pub mod run;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use tagsweep_registry::{RegistryClient, RegistryConfig};

/// tagsweep - prune old image tags from a Docker Registry v2.
#[derive(Parser)]
#[command(name = "tagsweep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Options shared by every command
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Directory holding config.yaml, jobs.yaml and manual.yaml
    #[arg(long, global = true, env = "TAGSWEEP_CONFIG_DIR", default_value = "config")]
    pub config_dir: PathBuf,

    /// Directory holding the state file and the history log
    #[arg(long, global = true, env = "TAGSWEEP_STATE_DIR", default_value = "cache")]
    pub state_dir: PathBuf,

    /// Evaluate and log the tags that would be deleted, without deleting them
    #[arg(long, global = true)]
    pub debug: bool,

    /// Log every registry request and response
    #[arg(long, global = true)]
    pub http_logs: bool,
}

impl GlobalArgs {
    /// Builds a registry client from `config` with the CLI's logging switch applied.
    pub fn registry(&self, config: RegistryConfig) -> Result<Arc<RegistryClient>> {
        let client = RegistryClient::new(config.with_http_logs(self.http_logs))
            .context("Failed to create registry client")?;
        Ok(Arc::new(client))
    }
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run forever, executing watch jobs when they are due
    Watch(watch::WatchArgs),

    /// Run manual jobs once and exit
    Run(run::RunArgs),

    /// Validate the configuration without contacting the registry
    Check,

    /// Show version information
    Version,
}
