//! Persisted per-job run state.
//!
//! The whole state is one JSON document mapping job names to their last run.
//! Commits are serialised through an async mutex and written atomically by
//! renaming a temporary file over the previous document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tagsweep_core::JobRunResult;
use tokio::sync::Mutex;

use crate::error::{Result, SchedulerError};

/// Persisted state of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobState {
    /// Outcome of the most recent run, successful or not.
    pub last_run: JobRunResult,

    /// End time of the most recent successful run.
    #[serde(default)]
    pub last_success_at: Option<DateTime<Utc>>,
}

/// The full persisted document.
pub type PersistedState = BTreeMap<String, JobState>;

/// File-backed store of [`JobState`] entries.
#[derive(Debug)]
pub struct StateStore {
    path: PathBuf,
    state: Mutex<PersistedState>,
}

impl StateStore {
    /// Loads the store from `path`.
    ///
    /// A missing or empty file yields an empty state. An unparseable file is
    /// logged and also yields an empty state.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let state = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => PersistedState::new(),
            Ok(contents) => serde_json::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "state file is not valid, starting with empty state"
                );
                PersistedState::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PersistedState::new(),
            Err(e) => return Err(SchedulerError::state_io(&path, e)),
        };

        tracing::debug!(path = %path.display(), jobs = state.len(), "loaded state");

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Returns the persisted state of `job_name`.
    pub async fn entry(&self, job_name: &str) -> Option<JobState> {
        self.state.lock().await.get(job_name).cloned()
    }

    /// Returns a copy of the whole state.
    pub async fn snapshot(&self) -> PersistedState {
        self.state.lock().await.clone()
    }

    /// Records `result` as the job's last run and persists the document.
    ///
    /// `last_success_at` advances only when the run succeeded.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be written. The in-memory
    /// state is left unchanged in that case.
    pub async fn commit(&self, result: &JobRunResult) -> Result<JobState> {
        let mut state = self.state.lock().await;

        let previous_success = state
            .get(&result.job_name)
            .and_then(|entry| entry.last_success_at);
        let entry = JobState {
            last_run: result.clone(),
            last_success_at: if result.success {
                Some(result.finished_at)
            } else {
                previous_success
            },
        };

        let mut next = state.clone();
        next.insert(result.job_name.clone(), entry.clone());
        self.write(&next).await?;
        *state = next;

        tracing::debug!(job = %result.job_name, success = result.success, "committed job state");
        Ok(entry)
    }

    async fn write(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SchedulerError::state_io(parent, e))?;
        }

        let json = serde_json::to_vec_pretty(state)?;
        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|e| SchedulerError::state_io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| SchedulerError::state_io(&self.path, e))
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}
