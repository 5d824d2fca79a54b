//! Job run outcomes.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::retention::RetentionDecision;

/// How a run was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Periodic run from the watch loop.
    Watch,
    /// One-shot run requested by an operator.
    Manual,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Watch => write!(f, "watch"),
            Self::Manual => write!(f, "manual"),
        }
    }
}

/// Per-repository counters for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryStats {
    /// Repository name.
    pub repository: String,
    /// Tags fetched and fed to the retention engine.
    pub tags_evaluated: usize,
    /// Tags that survive.
    pub tags_kept: usize,
    /// Tags removed, counting every tag of a deleted digest.
    pub tags_deleted: usize,
    /// First failure seen while processing the repository.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RepositoryStats {
    /// Creates empty stats for `repository`.
    #[must_use]
    pub fn new(repository: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tags_evaluated: 0,
            tags_kept: 0,
            tags_deleted: 0,
            error: None,
        }
    }

    /// Stats seeded from a retention decision, before any deletion happened.
    #[must_use]
    pub fn from_decision(decision: &RetentionDecision) -> Self {
        Self {
            repository: decision.repository.clone(),
            tags_evaluated: decision.tags_evaluated(),
            tags_kept: decision.tags_kept(),
            tags_deleted: 0,
            error: None,
        }
    }

    /// Creates stats for a repository that failed before evaluation.
    #[must_use]
    pub fn failed(repository: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(repository)
        }
    }

    /// Returns true if processing hit an error.
    #[must_use]
    pub const fn is_failed(&self) -> bool {
        self.error.is_some()
    }
}

/// A tag that was removed from the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedTag {
    /// Repository name.
    pub repository: String,
    /// Tag name.
    pub tag: String,
    /// Manifest digest the tag pointed at.
    pub digest: String,
}

/// Outcome of one job run; the value persisted as `last_run`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRunResult {
    /// Name of the job.
    pub job_name: String,
    /// Trigger of the run.
    pub mode: RunMode,
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub finished_at: DateTime<Utc>,
    /// True if deletions were suppressed.
    #[serde(default)]
    pub debug: bool,
    /// Per-repository counters.
    #[serde(default)]
    pub repositories: Vec<RepositoryStats>,
    /// Tags removed during the run.
    #[serde(default)]
    pub deleted: Vec<DeletedTag>,
    /// True if every repository was processed without error.
    pub success: bool,
    /// Failure messages, in the order they were recorded.
    #[serde(default)]
    pub errors: Vec<String>,
}

impl JobRunResult {
    /// Starts a result for `job_name` at `started_at`.
    #[must_use]
    pub fn new(job_name: impl Into<String>, mode: RunMode, started_at: DateTime<Utc>) -> Self {
        Self {
            job_name: job_name.into(),
            mode,
            started_at,
            finished_at: started_at,
            debug: false,
            repositories: Vec::new(),
            deleted: Vec::new(),
            success: true,
            errors: Vec::new(),
        }
    }

    /// Marks the run as a dry run.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Records the outcome of one repository.
    ///
    /// A repository error fails the whole run, but its sibling stats and
    /// deletions are kept.
    pub fn record_repository(&mut self, stats: RepositoryStats, deleted: Vec<DeletedTag>) {
        if let Some(error) = &stats.error {
            self.fail(format!("{}: {error}", stats.repository));
        }
        self.deleted.extend(deleted);
        self.repositories.push(stats);
    }

    /// Records a failure that is not tied to one repository.
    pub fn fail(&mut self, error: impl Into<String>) {
        self.success = false;
        self.errors.push(error.into());
    }

    /// Stamps the end time.
    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.finished_at = finished_at;
    }

    /// Total tags evaluated across repositories.
    #[must_use]
    pub fn tags_evaluated(&self) -> usize {
        self.repositories.iter().map(|r| r.tags_evaluated).sum()
    }

    /// Total tags deleted across repositories.
    #[must_use]
    pub fn tags_deleted(&self) -> usize {
        self.deleted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deleted(repository: &str, tag: &str) -> DeletedTag {
        DeletedTag {
            repository: repository.to_string(),
            tag: tag.to_string(),
            digest: format!("sha256:{tag}"),
        }
    }

    #[test]
    fn test_new_result_is_successful() {
        let result = JobRunResult::new("job", RunMode::Watch, Utc::now());
        assert!(result.success);
        assert!(result.errors.is_empty());
        assert_eq!(result.tags_deleted(), 0);
    }

    #[test]
    fn test_repository_error_fails_run_but_keeps_siblings() {
        let mut result = JobRunResult::new("job", RunMode::Manual, Utc::now());

        let mut ok = RepositoryStats::new("a");
        ok.tags_evaluated = 4;
        ok.tags_deleted = 1;
        result.record_repository(ok, vec![deleted("a", "old")]);

        let mut broken = RepositoryStats::new("b");
        broken.tags_evaluated = 2;
        broken.tags_deleted = 1;
        broken.error = Some("delete failed".to_string());
        result.record_repository(broken, vec![deleted("b", "older")]);

        assert!(!result.success);
        assert_eq!(result.errors, vec!["b: delete failed"]);
        assert_eq!(result.tags_evaluated(), 6);
        assert_eq!(result.tags_deleted(), 2);
    }

    #[test]
    fn test_failed_stats() {
        let stats = RepositoryStats::failed("repo", "boom");
        assert!(stats.is_failed());
        assert_eq!(stats.tags_evaluated, 0);
    }

    #[test]
    fn test_mode_serializes_lowercase() {
        let json = serde_json::to_string(&RunMode::Manual).unwrap();
        assert_eq!(json, "\"manual\"");
        assert_eq!(RunMode::Watch.to_string(), "watch");
    }

    #[test]
    fn test_result_roundtrips_through_json() {
        let mut result = JobRunResult::new("job", RunMode::Watch, Utc::now()).with_debug(true);
        result.record_repository(RepositoryStats::failed("repo", "timeout"), Vec::new());
        result.finish(Utc::now());

        let json = serde_json::to_string(&result).unwrap();
        let parsed: JobRunResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, result);
    }
}
