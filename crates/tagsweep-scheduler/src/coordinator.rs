//! Run coordination.
//!
//! Executes one job end to end: resolve repositories, fetch tag metadata,
//! decide, delete. Repositories are processed concurrently and independently;
//! the registry client's shared limiter bounds the requests in flight.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use tagsweep_core::{
    decide, resolve_repositories, DeletedTag, Job, JobRunResult, RepositoryStats, RunMode,
    TagRecord,
};
use tagsweep_registry::Registry;

use crate::history::HistoryLog;

/// Executes jobs against a registry.
pub struct RunCoordinator {
    registry: Arc<dyn Registry>,
    history: HistoryLog,
    debug: bool,
}

impl std::fmt::Debug for RunCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunCoordinator")
            .field("history", &self.history)
            .field("debug", &self.debug)
            .finish_non_exhaustive()
    }
}

impl RunCoordinator {
    /// Creates a coordinator. In debug mode nothing is deleted.
    #[must_use]
    pub fn new(registry: Arc<dyn Registry>, history: HistoryLog, debug: bool) -> Self {
        Self {
            registry,
            history,
            debug,
        }
    }

    /// Runs `job`, judging tag ages against `now`.
    pub async fn run_job_at(&self, job: &Job, mode: RunMode, now: DateTime<Utc>) -> JobRunResult {
        let clock = Instant::now();
        tracing::info!(job = %job.name, %mode, debug = self.debug, "job started");
        self.history.job_started(job, mode, self.debug).await;

        let mut result = JobRunResult::new(&job.name, mode, now).with_debug(self.debug);

        let repositories = self.resolve(job).await;
        let outcomes = join_all(
            repositories
                .iter()
                .map(|repository| self.sweep_repository(job, repository, now)),
        )
        .await;

        for (stats, deleted) in outcomes {
            result.record_repository(stats, deleted);
        }
        let elapsed = chrono::Duration::from_std(clock.elapsed()).unwrap_or_else(|_| chrono::Duration::zero());
        result.finish(now + elapsed);

        tracing::info!(
            job = %job.name,
            success = result.success,
            repositories = result.repositories.len(),
            tags_evaluated = result.tags_evaluated(),
            tags_deleted = result.tags_deleted(),
            errors = result.errors.len(),
            "job finished"
        );
        result
    }

    /// Resolves the job's selectors to concrete repository names.
    ///
    /// The catalog is only listed when a pattern selector is present. A
    /// catalog failure leaves the literal selectors in place.
    async fn resolve(&self, job: &Job) -> Vec<String> {
        let catalog = if job.needs_catalog() {
            match self.registry.list_repositories().await {
                Ok(catalog) => catalog,
                Err(e) => {
                    tracing::warn!(job = %job.name, error = %e, "failed to list repository catalog");
                    self.history.record(&format!(
                        "Job '{}': failed to list repository catalog: {e}",
                        job.name
                    ))
                    .await;
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let resolved = resolve_repositories(&job.repositories, &catalog);
        for pattern in &resolved.unmatched_patterns {
            tracing::warn!(job = %job.name, %pattern, "repository pattern matched nothing");
            self.history.record(&format!(
                "Job '{}': repository pattern {pattern} matched nothing",
                job.name
            ))
            .await;
        }
        tracing::info!(
            job = %job.name,
            repositories = %resolved.repositories.join(" "),
            "resolved repositories"
        );
        resolved.repositories
    }

    async fn sweep_repository(
        &self,
        job: &Job,
        repository: &str,
        now: DateTime<Utc>,
    ) -> (RepositoryStats, Vec<DeletedTag>) {
        let tags = match self.registry.list_tags(repository).await {
            Ok(tags) => tags,
            Err(e) => {
                tracing::error!(job = %job.name, repository, error = %e, "failed to list tags");
                return (
                    RepositoryStats::failed(repository, format!("listing tags: {e}")),
                    Vec::new(),
                );
            }
        };

        if !tags.iter().any(|tag| job.matches_tag(tag)) {
            tracing::info!(job = %job.name, repository, tags = tags.len(), "no tags match, nothing to do");
            let mut stats = RepositoryStats::new(repository);
            stats.tags_evaluated = tags.len();
            stats.tags_kept = tags.len();
            return (stats, Vec::new());
        }

        let records = match self.fetch_records(repository, &tags).await {
            Ok(records) => records,
            Err(message) => {
                tracing::error!(job = %job.name, repository, error = %message, "failed to fetch tag metadata");
                return (RepositoryStats::failed(repository, message), Vec::new());
            }
        };

        let decision = decide(repository, &records, job, now);
        let mut stats = RepositoryStats::from_decision(&decision);
        let mut deleted = Vec::new();

        if self.debug {
            for tag in &decision.delete {
                tracing::info!(job = %job.name, repository, tag = %tag.name, digest = %tag.digest, "would delete");
            }
        } else {
            let deletions = join_all(decision.digests_to_delete.iter().map(|digest| async move {
                (digest, self.registry.delete_manifest(repository, digest).await)
            }))
            .await;

            let mut failures = Vec::new();
            for (digest, outcome) in deletions {
                match outcome {
                    Ok(()) => {}
                    Err(e) if e.is_not_found() => {
                        tracing::debug!(repository, %digest, "manifest already gone");
                    }
                    Err(e) => {
                        tracing::error!(job = %job.name, repository, %digest, error = %e, "failed to delete manifest");
                        failures.push(format!("deleting {digest}: {e}"));
                        stats.tags_kept += decision.tags_for_digest(digest).count();
                        continue;
                    }
                }
                deleted.extend(decision.tags_for_digest(digest).map(|tag| DeletedTag {
                    repository: repository.to_string(),
                    tag: tag.name.clone(),
                    digest: digest.clone(),
                }));
            }
            if !failures.is_empty() {
                stats.error = Some(failures.join("; "));
            }
        }

        stats.tags_deleted = deleted.len();
        tracing::info!(
            job = %job.name,
            repository,
            evaluated = stats.tags_evaluated,
            kept = stats.tags_kept,
            deleted = stats.tags_deleted,
            "repository processed"
        );
        (stats, deleted)
    }

    /// Fetches metadata for every tag. Tags that vanished are skipped; any
    /// other failure aborts the repository.
    async fn fetch_records(
        &self,
        repository: &str,
        tags: &[String],
    ) -> std::result::Result<Vec<TagRecord>, String> {
        let fetched = join_all(
            tags.iter()
                .map(|tag| self.registry.tag_metadata(repository, tag)),
        )
        .await;

        let mut records = Vec::with_capacity(tags.len());
        for (tag, outcome) in tags.iter().zip(fetched) {
            match outcome {
                Ok(record) => records.push(record),
                Err(e) if e.is_not_found() => {
                    tracing::debug!(repository, tag = %tag, "tag vanished before metadata fetch");
                }
                Err(e) => return Err(format!("fetching metadata for {tag}: {e}")),
            }
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::InMemoryBackend;
    use crate::testing::{now, tag, FakeRegistry};
    use tagsweep_core::{NamePattern, RepositorySelector};

    fn coordinator(registry: Arc<FakeRegistry>, debug: bool) -> (RunCoordinator, Arc<InMemoryBackend>) {
        let backend = Arc::new(InMemoryBackend::new());
        let history = HistoryLog::new().with_backend(backend.clone());
        (RunCoordinator::new(registry, history, debug), backend)
    }

    fn dev_job(repositories: &[&str]) -> Job {
        let mut builder = Job::builder("dev")
            .tag_pattern(NamePattern::new("dev-").unwrap())
            .save_last(1)
            .older_than_days(5);
        for repository in repositories {
            builder = builder.selector(RepositorySelector::parse(repository).unwrap());
        }
        builder.build()
    }

    #[tokio::test]
    async fn test_deletes_old_tags() {
        let registry = Arc::new(FakeRegistry::new().with_tags(vec![
            tag("app", "dev-3", "sha256:3", 1),
            tag("app", "dev-2", "sha256:2", 10),
            tag("app", "dev-1", "sha256:1", 20),
            tag("app", "latest", "sha256:9", 30),
        ]));
        let (coordinator, history) = coordinator(registry.clone(), false);

        let result = coordinator.run_job_at(&dev_job(&["app"]), RunMode::Watch, now()).await;

        assert!(result.success);
        assert_eq!(
            registry.deleted(),
            vec![
                ("app".to_string(), "sha256:1".to_string()),
                ("app".to_string(), "sha256:2".to_string())
            ]
        );
        assert_eq!(result.tags_deleted(), 2);
        let stats = &result.repositories[0];
        assert_eq!(stats.tags_evaluated, 4);
        assert_eq!(stats.tags_kept, 2);
        assert_eq!(stats.tags_deleted, 2);
        assert!(history.lines()[0].contains("Job 'dev' started in watch mode"));
    }

    #[tokio::test]
    async fn test_debug_mode_deletes_nothing() {
        let registry = Arc::new(FakeRegistry::new().with_tags(vec![
            tag("app", "dev-2", "sha256:2", 10),
            tag("app", "dev-1", "sha256:1", 20),
        ]));
        let (coordinator, _) = coordinator(registry.clone(), true);

        let result = coordinator.run_job_at(&dev_job(&["app"]), RunMode::Manual, now()).await;

        assert!(result.success);
        assert!(result.debug);
        assert!(registry.deleted().is_empty());
        assert_eq!(result.tags_deleted(), 0);
        assert_eq!(result.repositories[0].tags_evaluated, 2);
    }

    #[tokio::test]
    async fn test_catalog_only_listed_for_patterns() {
        let registry = Arc::new(FakeRegistry::new().with_tags(vec![tag("app", "dev-1", "sha256:1", 1)]));
        let (coordinator, _) = coordinator(registry.clone(), false);

        coordinator.run_job_at(&dev_job(&["app"]), RunMode::Watch, now()).await;
        assert_eq!(registry.catalog_calls(), 0);

        coordinator.run_job_at(&dev_job(&["r/ap/"]), RunMode::Watch, now()).await;
        assert_eq!(registry.catalog_calls(), 1);
    }

    #[tokio::test]
    async fn test_pattern_selector_resolves_against_catalog() {
        let registry = Arc::new(FakeRegistry::new().with_tags(vec![
            tag("team-a", "dev-2", "sha256:a2", 1),
            tag("team-a", "dev-1", "sha256:a1", 30),
            tag("team-b", "dev-2", "sha256:b2", 1),
            tag("team-b", "dev-1", "sha256:b1", 30),
            tag("other", "dev-1", "sha256:o1", 30),
            tag("other", "dev-0", "sha256:o0", 40),
        ]));
        let (coordinator, _) = coordinator(registry.clone(), false);

        let result = coordinator
            .run_job_at(&dev_job(&[r"r/team-\w+/"]), RunMode::Watch, now())
            .await;

        let mut repositories: Vec<_> = result.repositories.iter().map(|r| r.repository.as_str()).collect();
        repositories.sort_unstable();
        assert_eq!(repositories, vec!["team-a", "team-b"]);
        assert_eq!(registry.deleted().len(), 2);
    }

    #[tokio::test]
    async fn test_catalog_failure_is_not_job_failure() {
        let registry = Arc::new(
            FakeRegistry::new()
                .with_tags(vec![
                    tag("app", "dev-2", "sha256:2", 1),
                    tag("app", "dev-1", "sha256:1", 30),
                ])
                .failing_catalog(),
        );
        let (coordinator, history) = coordinator(registry.clone(), false);

        let result = coordinator
            .run_job_at(&dev_job(&["app", "r/team-.*/"]), RunMode::Watch, now())
            .await;

        assert!(result.success);
        assert_eq!(result.repositories.len(), 1);
        assert_eq!(registry.deleted().len(), 1);
        assert!(history
            .lines()
            .iter()
            .any(|line| line.contains("failed to list repository catalog")));
    }

    #[tokio::test]
    async fn test_vanished_tag_is_skipped() {
        let registry = Arc::new(
            FakeRegistry::new()
                .with_tags(vec![
                    tag("app", "dev-3", "sha256:3", 1),
                    tag("app", "dev-2", "sha256:2", 10),
                    tag("app", "dev-1", "sha256:1", 20),
                ])
                .vanished_tag("app", "dev-2"),
        );
        let (coordinator, _) = coordinator(registry.clone(), false);

        let result = coordinator.run_job_at(&dev_job(&["app"]), RunMode::Watch, now()).await;

        assert!(result.success);
        assert_eq!(result.repositories[0].tags_evaluated, 2);
        assert_eq!(registry.deleted(), vec![("app".to_string(), "sha256:1".to_string())]);
    }

    #[tokio::test]
    async fn test_metadata_failure_fails_only_that_repository() {
        let registry = Arc::new(
            FakeRegistry::new()
                .with_tags(vec![
                    tag("a", "dev-2", "sha256:a2", 1),
                    tag("a", "dev-1", "sha256:a1", 30),
                    tag("b", "dev-2", "sha256:b2", 1),
                    tag("b", "dev-1", "sha256:b1", 30),
                ])
                .failing_metadata("a", "dev-2"),
        );
        let (coordinator, _) = coordinator(registry.clone(), false);

        let result = coordinator.run_job_at(&dev_job(&["a", "b"]), RunMode::Watch, now()).await;

        assert!(!result.success);
        assert_eq!(result.errors.len(), 1);
        assert!(result.errors[0].starts_with("a: "));
        assert_eq!(registry.deleted(), vec![("b".to_string(), "sha256:b1".to_string())]);
        assert_eq!(result.tags_deleted(), 1);
    }

    #[tokio::test]
    async fn test_delete_failures_continue_with_remaining_digests() {
        let registry = Arc::new(
            FakeRegistry::new()
                .with_tags(vec![
                    tag("app", "dev-4", "sha256:4", 1),
                    tag("app", "dev-3", "sha256:3", 10),
                    tag("app", "dev-2", "sha256:2", 20),
                    tag("app", "dev-1", "sha256:1", 30),
                ])
                .failing_delete("sha256:2")
                .missing_on_delete("sha256:3"),
        );
        let (coordinator, _) = coordinator(registry.clone(), false);

        let result = coordinator.run_job_at(&dev_job(&["app"]), RunMode::Watch, now()).await;

        assert!(!result.success);
        assert_eq!(registry.deleted(), vec![("app".to_string(), "sha256:1".to_string())]);
        let deleted: Vec<_> = result.deleted.iter().map(|d| d.tag.as_str()).collect();
        assert_eq!(deleted.len(), 2);
        assert!(deleted.contains(&"dev-1"));
        assert!(deleted.contains(&"dev-3"));
        assert!(result.repositories[0].error.as_deref().unwrap().contains("sha256:2"));
    }

    #[tokio::test]
    async fn test_listing_failure_is_isolated() {
        let registry = Arc::new(
            FakeRegistry::new()
                .with_tags(vec![
                    tag("good", "dev-2", "sha256:g2", 1),
                    tag("good", "dev-1", "sha256:g1", 30),
                ])
                .with_empty_repository("bad")
                .failing_listing("bad"),
        );
        let (coordinator, _) = coordinator(registry.clone(), false);

        let result = coordinator.run_job_at(&dev_job(&["good", "bad"]), RunMode::Watch, now()).await;

        assert!(!result.success);
        assert_eq!(result.repositories.len(), 2);
        assert_eq!(registry.deleted().len(), 1);
    }

    #[tokio::test]
    async fn test_shared_digest_is_not_deleted() {
        let registry = Arc::new(FakeRegistry::new().with_tags(vec![
            tag("app", "dev-2", "sha256:new", 1),
            tag("app", "dev-1", "sha256:old", 30),
            tag("app", "stable", "sha256:old", 30),
        ]));
        let (coordinator, _) = coordinator(registry.clone(), false);

        let result = coordinator.run_job_at(&dev_job(&["app"]), RunMode::Watch, now()).await;

        assert!(result.success);
        assert!(registry.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_repository_without_matching_tags_skips_metadata() {
        let registry = Arc::new(
            FakeRegistry::new()
                .with_tags(vec![tag("app", "latest", "sha256:1", 30)])
                .failing_metadata("app", "latest"),
        );
        let (coordinator, _) = coordinator(registry.clone(), false);

        let result = coordinator.run_job_at(&dev_job(&["app"]), RunMode::Watch, now()).await;

        assert!(result.success);
        assert_eq!(result.repositories[0].tags_evaluated, 1);
        assert_eq!(result.repositories[0].tags_kept, 1);
    }
}
