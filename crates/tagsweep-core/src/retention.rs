//! Retention engine.
//!
//! [`decide`] is a pure function of its inputs: for the same records, job and
//! `now` it always returns the same [`RetentionDecision`].
//!
//! ```text
//!   records ──► group by first matching pattern ──► unmatched (kept)
//!                        │
//!                        ▼  per group, newest first
//!              [0, save_last)        → keep (SaveLast)
//!              older than threshold  → delete candidate
//!              otherwise             → keep (TooYoung)
//!                        │
//!                        ▼
//!              candidate whose digest is still referenced
//!              by a kept or unmatched tag → keep (SharedDigest)
//! ```

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::job::Job;
use crate::pattern::NamePattern;
use crate::tag::TagRecord;

/// Why a matched tag survives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeepReason {
    /// Among the `save_last` newest tags of its group.
    SaveLast,

    /// Outside the saved window but not older than the age threshold.
    TooYoung,

    /// Marked for deletion, but its digest is still referenced by a kept tag.
    SharedDigest,
}

impl KeepReason {
    /// Returns a string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SaveLast => "save_last",
            Self::TooYoung => "too_young",
            Self::SharedDigest => "shared_digest",
        }
    }
}

impl fmt::Display for KeepReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A matched tag that is kept, with the rule that kept it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetainedTag {
    /// The kept tag.
    pub tag: TagRecord,

    /// The rule that kept it.
    pub reason: KeepReason,
}

impl RetainedTag {
    /// Creates a retained tag.
    #[must_use]
    pub const fn new(tag: TagRecord, reason: KeepReason) -> Self {
        Self { tag, reason }
    }
}

/// Retention outcome for one repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionDecision {
    /// Repository the decision applies to.
    pub repository: String,

    /// Matched tags that survive.
    pub keep: Vec<RetainedTag>,

    /// Matched tags that are removed with their manifest.
    pub delete: Vec<TagRecord>,

    /// Tags that matched no pattern; always kept.
    pub unmatched: Vec<TagRecord>,

    /// Manifest digests to delete, each listed once.
    pub digests_to_delete: Vec<String>,
}

impl RetentionDecision {
    /// Number of tags the decision covered.
    #[must_use]
    pub fn tags_evaluated(&self) -> usize {
        self.keep.len() + self.delete.len() + self.unmatched.len()
    }

    /// Number of tags that survive, matched or not.
    #[must_use]
    pub fn tags_kept(&self) -> usize {
        self.keep.len() + self.unmatched.len()
    }

    /// Returns true if nothing is to be deleted.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.digests_to_delete.is_empty()
    }

    /// Tags that will disappear when `digest` is deleted.
    pub fn tags_for_digest<'a>(&'a self, digest: &'a str) -> impl Iterator<Item = &'a TagRecord> {
        self.delete.iter().filter(move |tag| tag.digest == digest)
    }
}

/// Tags partitioned by the first pattern they match.
#[derive(Debug, Default)]
pub struct TagGroups<'a> {
    /// One group per pattern, in pattern order, each sorted newest first.
    pub groups: Vec<Vec<&'a TagRecord>>,

    /// Tags that matched no pattern, sorted newest first.
    pub unmatched: Vec<&'a TagRecord>,
}

/// Partitions `records` by the first pattern in `patterns` each one matches.
///
/// A record is never placed in more than one group, even when several
/// patterns match its name.
#[must_use]
pub fn group_tags<'a>(records: &'a [TagRecord], patterns: &[NamePattern]) -> TagGroups<'a> {
    let mut grouped = TagGroups {
        groups: vec![Vec::new(); patterns.len()],
        unmatched: Vec::new(),
    };

    for record in records {
        match patterns.iter().position(|p| p.is_match(&record.name)) {
            Some(index) => grouped.groups[index].push(record),
            None => grouped.unmatched.push(record),
        }
    }

    for group in &mut grouped.groups {
        group.sort_by(|a, b| TagRecord::newest_first(a, b));
    }
    grouped
        .unmatched
        .sort_by(|a, b| TagRecord::newest_first(a, b));

    grouped
}

/// Computes which tags of `repository` to delete under `job` at time `now`.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use tagsweep_core::{decide, Job, KeepReason, NamePattern, TagRecord};
///
/// let job = Job::builder("prune")
///     .repository("app")
///     .tag_pattern(NamePattern::new("build-").unwrap())
///     .save_last(1)
///     .older_than_days(3)
///     .build();
/// let now = Utc::now();
/// let records = vec![
///     TagRecord::new("app", "build-1", "sha256:1", now - Duration::days(10)),
///     TagRecord::new("app", "build-2", "sha256:2", now - Duration::days(9)),
///     TagRecord::new("app", "latest", "sha256:2", now - Duration::days(9)),
/// ];
///
/// let decision = decide("app", &records, &job, now);
/// assert_eq!(decision.keep[0].reason, KeepReason::SaveLast);
/// assert_eq!(decision.delete[0].name, "build-1");
/// assert_eq!(decision.unmatched[0].name, "latest");
/// ```
#[must_use]
pub fn decide(
    repository: &str,
    records: &[TagRecord],
    job: &Job,
    now: DateTime<Utc>,
) -> RetentionDecision {
    let grouped = group_tags(records, &job.tag_regexps);
    let max_age = Duration::days(i64::from(job.older_than_days));
    let save_last = job.save_last as usize;

    let mut keep = Vec::new();
    let mut candidates = Vec::new();

    for group in grouped.groups {
        for (index, record) in group.into_iter().enumerate() {
            if index < save_last {
                keep.push(RetainedTag::new(record.clone(), KeepReason::SaveLast));
            } else if now - record.created > max_age {
                candidates.push(record.clone());
            } else {
                keep.push(RetainedTag::new(record.clone(), KeepReason::TooYoung));
            }
        }
    }

    let unmatched: Vec<TagRecord> = grouped.unmatched.into_iter().cloned().collect();

    // Deleting a manifest removes every tag that points at it.
    let protected: HashSet<String> = keep
        .iter()
        .map(|retained| retained.tag.digest.clone())
        .chain(unmatched.iter().map(|tag| tag.digest.clone()))
        .collect();

    let (delete, shared): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|tag| !protected.contains(&tag.digest));

    keep.extend(
        shared
            .into_iter()
            .map(|tag| RetainedTag::new(tag, KeepReason::SharedDigest)),
    );

    let mut seen = HashSet::new();
    let digests_to_delete = delete
        .iter()
        .filter(|tag| seen.insert(tag.digest.as_str()))
        .map(|tag| tag.digest.clone())
        .collect();

    RetentionDecision {
        repository: repository.to_string(),
        keep,
        delete,
        unmatched,
        digests_to_delete,
    }
}
