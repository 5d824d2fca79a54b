//! tagsweep CLI - prunes old image tags from a Docker Registry v2.

use anyhow::Result;
use clap::Parser;
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;

use commands::{Cli, Commands};

const DEFAULT_FILTER: &str =
    "tagsweep=info,tagsweep_core=info,tagsweep_registry=info,tagsweep_scheduler=info";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| DEFAULT_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    if cli.global.debug {
        warn!("running in debug mode, found tags will not be deleted");
    }

    match cli.command {
        Commands::Watch(args) => commands::watch::run(&cli.global, &args).await,
        Commands::Run(args) => commands::run::run(&cli.global, &args).await,
        Commands::Check => commands::check::run(&cli.global),
        Commands::Version => {
            println!("tagsweep {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
