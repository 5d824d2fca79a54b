//! Human-readable history log.
//!
//! One line per event, `[<RFC 3339 UTC>] <message>`. Write failures are
//! logged and never fail a run.

use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tagsweep_core::{Job, JobRunResult, RunMode};
use tokio::io::AsyncWriteExt;

use crate::error::{Result, SchedulerError};

/// Sink for history lines.
#[async_trait]
pub trait HistoryBackend: Send + Sync + Debug {
    /// Appends one formatted line.
    ///
    /// # Errors
    ///
    /// Returns an error if the line cannot be stored.
    async fn append(&self, line: &str) -> Result<()>;

    /// Returns the backend name for identification.
    fn name(&self) -> &'static str;
}

/// Append-only file backend.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    lock: tokio::sync::Mutex<()>,
}

impl FileBackend {
    /// Creates a backend appending to `path`.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: tokio::sync::Mutex::new(()),
        }
    }
}

#[async_trait]
impl HistoryBackend for FileBackend {
    async fn append(&self, line: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let to_error = |source| SchedulerError::HistoryIo {
            path: self.path.clone(),
            source,
        };

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(to_error)?;
        file.write_all(format!("{line}\n").as_bytes())
            .await
            .map_err(to_error)?;
        file.flush().await.map_err(to_error)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// In-memory backend for testing.
#[derive(Debug, Default)]
pub struct InMemoryBackend {
    lines: Mutex<Vec<String>>,
}

impl InMemoryBackend {
    /// Creates a new in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all recorded lines.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl HistoryBackend for InMemoryBackend {
    async fn append(&self, line: &str) -> Result<()> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "in_memory"
    }
}

/// History log writing to every configured backend.
#[derive(Debug, Default, Clone)]
pub struct HistoryLog {
    backends: Vec<Arc<dyn HistoryBackend>>,
}

impl HistoryLog {
    /// Creates a history log with no backends.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a history log appending to the file at `path`.
    #[must_use]
    pub fn file(path: impl AsRef<Path>) -> Self {
        Self::new().with_backend(Arc::new(FileBackend::new(path)))
    }

    /// Adds a backend.
    #[must_use]
    pub fn with_backend(mut self, backend: Arc<dyn HistoryBackend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Records `message` stamped with `at`.
    pub async fn record_at(&self, at: DateTime<Utc>, message: &str) {
        let line = format!("[{}] {message}", at.to_rfc3339_opts(SecondsFormat::Secs, true));
        for backend in &self.backends {
            if let Err(e) = backend.append(&line).await {
                tracing::error!(backend = backend.name(), error = %e, "failed to write history");
            }
        }
    }

    /// Records `message` stamped with the current time.
    pub async fn record(&self, message: &str) {
        self.record_at(Utc::now(), message).await;
    }

    /// Records that a job was not due.
    pub async fn job_skipped(&self, job: &Job, next_run_in: chrono::Duration) {
        self.record(&format!(
            "Job '{}' skipped, next run in {}",
            job.name,
            format_remaining(next_run_in)
        ))
        .await;
    }

    /// Records that a job started.
    pub async fn job_started(&self, job: &Job, mode: RunMode, debug: bool) {
        let suffix = if debug { " (debug, no deletions)" } else { "" };
        self.record(&format!("Job '{}' started in {mode} mode{suffix}", job.name))
            .await;
    }

    /// Records that a job finished.
    pub async fn job_finished(&self, result: &JobRunResult) {
        let outcome = if result.success { "succeeded" } else { "failed" };
        self.record(&format!(
            "Job '{}' {outcome}: {} repositories, {} tags evaluated, {} tags deleted, {} errors",
            result.job_name,
            result.repositories.len(),
            result.tags_evaluated(),
            result.tags_deleted(),
            result.errors.len()
        ))
        .await;
    }
}

/// Formats a remaining duration as `"<h> h. <m> min."`.
#[must_use]
pub fn format_remaining(remaining: chrono::Duration) -> String {
    let minutes = remaining.num_minutes().max(0);
    format!("{} h. {} min.", minutes / 60, minutes % 60)
}
