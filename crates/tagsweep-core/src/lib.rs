//! # tagsweep Core
//!
//! Core types and the retention engine for the tagsweep registry pruner.
//!
//! This crate holds everything that does not touch the network or the disk:
//!
//! - [`Job`] - a named retention policy over one or more repositories
//! - [`NamePattern`] / [`RepositorySelector`] - ordered pattern matching over
//!   tag and repository names
//! - [`TagRecord`] - a tag with its digest and creation time
//! - [`decide`] - the retention engine that splits a repository's tags into
//!   `keep` and `delete`
//! - [`JobRunResult`] - the outcome of one job execution, as persisted
//!
//! ## Example
//!
//! ```rust
//! use chrono::{Duration, Utc};
//! use tagsweep_core::{decide, Job, NamePattern, TagRecord};
//!
//! let job = Job::builder("prune-releases")
//!     .repository("backend")
//!     .tag_pattern(NamePattern::new(r"v\d+\.\d+\.\d+$").unwrap())
//!     .save_last(1)
//!     .older_than_days(5)
//!     .build();
//!
//! let now = Utc::now();
//! let records = vec![
//!     TagRecord::new("backend", "v1.0.0", "sha256:aa", now - Duration::days(30)),
//!     TagRecord::new("backend", "v1.1.0", "sha256:bb", now - Duration::days(1)),
//! ];
//!
//! let decision = decide("backend", &records, &job, now);
//! assert_eq!(decision.digests_to_delete, vec!["sha256:aa".to_string()]);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod job;
pub mod pattern;
pub mod retention;
pub mod run;
pub mod tag;
pub mod validation;


// Re-export main types at crate root
pub use error::{Error, Result};
pub use job::{Job, JobBuilder};
pub use pattern::{resolve_repositories, NamePattern, RepositorySelector, ResolvedRepositories};
pub use retention::{decide, group_tags, KeepReason, RetainedTag, RetentionDecision, TagGroups};
pub use run::{DeletedTag, JobRunResult, RepositoryStats, RunMode};
pub use tag::TagRecord;
pub use validation::{validate_jobs, Validate, ValidationError, ValidationErrors};
