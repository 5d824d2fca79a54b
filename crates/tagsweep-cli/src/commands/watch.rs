//! Watch command implementation.
//!
//! Loads `jobs.yaml` and runs the scheduler loop until the process is stopped.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use tagsweep_scheduler::{SchedulerConfig, Sweeper};

use super::GlobalArgs;
use crate::config::{self, JobFile};

/// Arguments for the watch command.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Minutes between two scheduler ticks
    #[arg(long, default_value = "15", value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval_minutes: u64,
}

/// Runs the watch command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the state directory
/// cannot be prepared.
pub async fn run(global: &GlobalArgs, args: &WatchArgs) -> Result<()> {
    let settings = config::load(&global.config_dir, JobFile::Watch)?;
    let registry = global.registry(settings.registry)?;

    let scheduler_config = SchedulerConfig::builder()
        .state_dir(&global.state_dir)
        .poll_interval(Duration::from_secs(args.poll_interval_minutes * 60))
        .debug(global.debug)
        .build();

    for job in &settings.jobs {
        info!(
            job = %job.name,
            every_hours = job.clean_every_n_hours,
            "watching job"
        );
    }

    let sweeper = Sweeper::new(registry, scheduler_config, settings.jobs)
        .await
        .context("Failed to initialize scheduler")?;

    sweeper.watch().await;
    Ok(())
}
