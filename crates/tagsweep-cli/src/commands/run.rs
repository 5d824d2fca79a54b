//! Run command implementation.
//!
//! Executes the jobs of `manual.yaml` once, ignoring their schedule.

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::warn;

use tagsweep_core::JobRunResult;
use tagsweep_scheduler::{SchedulerConfig, Sweeper};

use super::GlobalArgs;
use crate::config::{self, JobFile};

/// Arguments for the run command.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Names of the jobs to run; all manual jobs when omitted
    pub jobs: Vec<String>,
}

/// Runs the run command.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, a requested job does not
/// exist, or any job failed.
pub async fn run(global: &GlobalArgs, args: &RunArgs) -> Result<()> {
    warn!("running in manual mode, one-time cleanup");

    let settings = config::load(&global.config_dir, JobFile::Manual)?;
    let registry = global.registry(settings.registry)?;

    let scheduler_config = SchedulerConfig::builder()
        .state_dir(&global.state_dir)
        .debug(global.debug)
        .build();

    let sweeper = Sweeper::new(registry, scheduler_config, settings.jobs)
        .await
        .context("Failed to initialize scheduler")?
        .select(&args.jobs)
        .context("Unknown job requested")?;

    let results = sweeper.run_once().await;
    print_summary(&results);

    let failed = results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        bail!("{failed} of {} jobs failed", results.len());
    }
    Ok(())
}

fn print_summary(results: &[JobRunResult]) {
    println!();
    println!("tagsweep run summary");
    println!("====================");
    for result in results {
        let status = if result.success { "✓" } else { "✗" };
        let verb = if result.debug { "would delete" } else { "deleted" };
        println!(
            "{status} {}: {} repositories, {} tags evaluated, {} {verb}",
            result.job_name,
            result.repositories.len(),
            result.tags_evaluated(),
            result.tags_deleted()
        );
        for error in &result.errors {
            println!("    error: {error}");
        }
    }
}
