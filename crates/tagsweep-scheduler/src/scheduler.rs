//! Job scheduling.
//!
//! Each tick evaluates every job against its persisted state, runs the due
//! ones concurrently and commits each result as soon as it completes.
//!
//! ```text
//!   Idle ──tick──► Due ──► Running ──commit──► Cooldown ──interval──► Due
//!                   ▲                                                  │
//!                   └──────────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use tagsweep_core::{Job, JobRunResult, RunMode};

use crate::coordinator::RunCoordinator;
use crate::error::{Result, SchedulerError};
use crate::history::{format_remaining, HistoryLog};
use crate::state::{JobState, StateStore};

/// Lifecycle phase of a job inside the scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobPhase {
    /// Not evaluated yet.
    Idle,
    /// Selected to run in the current tick.
    Due,
    /// Running.
    Running,
    /// Waiting for its interval to elapse.
    Cooldown,
}

impl JobPhase {
    /// Returns a string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Due => "due",
            Self::Running => "running",
            Self::Cooldown => "cooldown",
        }
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a job should run now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Run in this tick.
    Due,
    /// Skip; the job becomes due after `next_run_in`.
    NotDue {
        /// Time left until the job is due.
        next_run_in: chrono::Duration,
    },
}

impl Readiness {
    /// Returns true for [`Readiness::Due`].
    #[must_use]
    pub const fn is_due(&self) -> bool {
        matches!(self, Self::Due)
    }
}

/// Decides whether `job` is due at `now`.
///
/// Manual runs are always due. A watch run is due when the job has never
/// succeeded, when its last run was manual, or when its interval has elapsed
/// since the last success.
#[must_use]
pub fn check_due(job: &Job, entry: Option<&JobState>, now: DateTime<Utc>, mode: RunMode) -> Readiness {
    if mode == RunMode::Manual {
        return Readiness::Due;
    }
    let Some(entry) = entry else {
        return Readiness::Due;
    };
    if entry.last_run.mode == RunMode::Manual {
        return Readiness::Due;
    }
    let Some(last_success_at) = entry.last_success_at else {
        return Readiness::Due;
    };

    let interval = chrono::Duration::hours(i64::from(job.clean_every_n_hours));
    let elapsed = now - last_success_at;
    if elapsed >= interval {
        Readiness::Due
    } else {
        Readiness::NotDue {
            next_run_in: interval - elapsed,
        }
    }
}

/// Drives jobs through their phases.
#[derive(Debug)]
pub struct Scheduler {
    jobs: Vec<Job>,
    coordinator: RunCoordinator,
    store: StateStore,
    history: HistoryLog,
    poll_interval: Duration,
    phases: Mutex<HashMap<String, JobPhase>>,
}

impl Scheduler {
    /// Creates a scheduler over `jobs`.
    #[must_use]
    pub fn new(
        jobs: Vec<Job>,
        coordinator: RunCoordinator,
        store: StateStore,
        history: HistoryLog,
        poll_interval: Duration,
    ) -> Self {
        let phases = jobs
            .iter()
            .map(|job| (job.name.clone(), JobPhase::Idle))
            .collect();
        Self {
            jobs,
            coordinator,
            store,
            history,
            poll_interval,
            phases: Mutex::new(phases),
        }
    }

    /// Returns the scheduled jobs.
    #[must_use]
    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    /// Returns the state store.
    #[must_use]
    pub const fn store(&self) -> &StateStore {
        &self.store
    }

    /// Returns the current phase of `job_name`.
    #[must_use]
    pub fn phase(&self, job_name: &str) -> Option<JobPhase> {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(job_name)
            .copied()
    }

    fn set_phase(&self, job_name: &str, phase: JobPhase) {
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(job_name.to_string(), phase);
    }

    /// Keeps only the jobs named in `names`, in the order given.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::UnknownJob`] for the first name that is not
    /// configured.
    pub fn retain(&mut self, names: &[String]) -> Result<()> {
        let mut selected = Vec::with_capacity(names.len());
        for name in names {
            let job = self
                .jobs
                .iter()
                .find(|job| &job.name == name)
                .ok_or_else(|| SchedulerError::UnknownJob { name: name.clone() })?;
            selected.push(job.clone());
        }
        self.phases
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|name, _| names.contains(name));
        self.jobs = selected;
        Ok(())
    }

    /// Evaluates every job at `now` and runs the due ones.
    ///
    /// Results are committed to the state store as they complete and
    /// returned in completion order.
    pub async fn tick(&self, now: DateTime<Utc>, mode: RunMode) -> Vec<JobRunResult> {
        let state = self.store.snapshot().await;
        let mut seen = HashSet::new();
        let mut due = Vec::new();

        for job in &self.jobs {
            if !seen.insert(job.name.as_str()) {
                continue;
            }
            match check_due(job, state.get(&job.name), now, mode) {
                Readiness::Due => {
                    self.set_phase(&job.name, JobPhase::Due);
                    due.push(job);
                }
                Readiness::NotDue { next_run_in } => {
                    self.set_phase(&job.name, JobPhase::Cooldown);
                    tracing::info!(
                        job = %job.name,
                        next_run_in = %format_remaining(next_run_in),
                        "job not due, skipping"
                    );
                    self.history.job_skipped(job, next_run_in).await;
                }
            }
        }

        let mut running: FuturesUnordered<_> = due
            .into_iter()
            .map(|job| async move {
                self.set_phase(&job.name, JobPhase::Running);
                self.coordinator.run_job_at(job, mode, now).await
            })
            .collect();

        let mut results = Vec::new();
        while let Some(result) = running.next().await {
            if let Err(e) = self.store.commit(&result).await {
                tracing::error!(job = %result.job_name, error = %e, "failed to persist job state");
            }
            self.history.job_finished(&result).await;

            self.set_phase(&result.job_name, JobPhase::Cooldown);
            results.push(result);
        }
        results
    }

    /// Ticks forever, pausing `poll_interval` between ticks.
    pub async fn watch(&self) {
        tracing::info!(
            jobs = self.jobs.len(),
            poll_interval_secs = self.poll_interval.as_secs(),
            "watching"
        );
        loop {
            self.tick(Utc::now(), RunMode::Watch).await;
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Runs every job once in manual mode.
    pub async fn run_once(&self) -> Vec<JobRunResult> {
        self.tick(Utc::now(), RunMode::Manual).await
    }
}
