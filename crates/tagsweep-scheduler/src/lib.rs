//! tagsweep scheduler
//!
//! Runs retention jobs against a registry, periodically or on demand, and
//! remembers when each job last succeeded.
//!
//! # Overview
//!
//! - **State Store**: one JSON document with the last run of every job
//! - **History Log**: an append-only, human-readable event log
//! - **Scheduler**: decides which jobs are due and runs them concurrently
//! - **Run Coordinator**: executes one job across its repositories
//!
//! # Architecture
//!
//! ```text
//!            ┌──────────────┐
//!            │   Sweeper    │
//!            └──────┬───────┘
//!                   ▼
//!            ┌──────────────┐   commit   ┌──────────────┐
//!            │  Scheduler   │──────────► │  StateStore  │
//!            └──────┬───────┘            └──────────────┘
//!                   ▼ per due job
//!            ┌──────────────┐            ┌──────────────┐
//!            │RunCoordinator│──────────► │  Registry    │
//!            └──────────────┘            └──────────────┘
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tagsweep_core::{Job, NamePattern};
//! use tagsweep_registry::{RegistryClient, RegistryConfig};
//! use tagsweep_scheduler::{SchedulerConfig, Sweeper};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let registry = Arc::new(RegistryClient::new(RegistryConfig::new("https://registry.example.com"))?);
//!     let jobs = vec![Job::builder("dev")
//!         .repository("backend")
//!         .tag_pattern(NamePattern::new("dev-")?)
//!         .save_last(5)
//!         .older_than_days(7)
//!         .clean_every_n_hours(24)
//!         .build()];
//!
//!     let sweeper = Sweeper::new(registry, SchedulerConfig::default(), jobs).await?;
//!     sweeper.watch().await;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod history;
pub mod scheduler;
pub mod state;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use tagsweep_core::{Job, JobRunResult};
use tagsweep_registry::Registry;

pub use config::SchedulerConfig;
pub use coordinator::RunCoordinator;
pub use error::{Result, SchedulerError};
pub use history::{FileBackend, HistoryBackend, HistoryLog, InMemoryBackend};
pub use scheduler::{check_due, JobPhase, Readiness, Scheduler};
pub use state::{JobState, PersistedState, StateStore};

/// The assembled service: store, history, coordinator and scheduler.
#[derive(Debug)]
pub struct Sweeper {
    scheduler: Scheduler,
}

impl Sweeper {
    /// Builds a sweeper over `jobs`, loading state from `config.state_dir`.
    ///
    /// The state directory is created if missing.
    pub async fn new(
        registry: Arc<dyn Registry>,
        config: SchedulerConfig,
        jobs: Vec<Job>,
    ) -> Result<Self> {
        tokio::fs::create_dir_all(&config.state_dir)
            .await
            .map_err(|e| SchedulerError::state_io(&config.state_dir, e))?;

        let store = StateStore::open(config.state_file()).await?;
        let history = HistoryLog::file(config.history_file());
        let coordinator = RunCoordinator::new(registry, history.clone(), config.debug);
        let scheduler = Scheduler::new(jobs, coordinator, store, history, config.poll_interval);

        Ok(Self { scheduler })
    }

    /// Restricts the sweeper to the named jobs. An empty list keeps all jobs.
    pub fn select(mut self, names: &[String]) -> Result<Self> {
        if !names.is_empty() {
            self.scheduler.retain(names)?;
        }
        Ok(self)
    }

    /// Returns the scheduler.
    pub const fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Runs in watch mode until the process is stopped.
    pub async fn watch(&self) {
        self.scheduler.watch().await;
    }

    /// Runs every job once in manual mode and returns the results.
    pub async fn run_once(&self) -> Vec<JobRunResult> {
        self.scheduler.run_once().await
    }
}
