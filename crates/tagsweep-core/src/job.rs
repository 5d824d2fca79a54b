//! Retention job definitions.

use serde::{Deserialize, Serialize};

use crate::pattern::{NamePattern, RepositorySelector};
use crate::validation::{Validate, ValidationError, ValidationErrors};

/// A named retention policy over one or more repositories.
///
/// Each entry of `tag_regexps` defines one retention group. A tag belongs to
/// the group of the first pattern it matches, in declaration order.
///
/// # Examples
///
/// ```rust
/// use tagsweep_core::{Job, NamePattern, RepositorySelector};
///
/// let job = Job::builder("clean-dev")
///     .repository("backend")
///     .selector(RepositorySelector::parse(r"r/team-\w+/").unwrap())
///     .tag_pattern(NamePattern::new("dev-").unwrap())
///     .save_last(5)
///     .older_than_days(7)
///     .clean_every_n_hours(24)
///     .build();
///
/// assert_eq!(job.repositories.len(), 2);
/// assert!(!job.is_manual_only());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job name; the key of the persisted state.
    pub name: String,

    /// Free-form description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Repository selectors, literal names or `r/<regex>/` patterns.
    pub repositories: Vec<RepositorySelector>,

    /// Tag patterns, one retention group each.
    pub tag_regexps: Vec<NamePattern>,

    /// Newest tags per group that are kept regardless of age.
    pub save_last: u32,

    /// Age in days beyond which tags outside the saved window are deleted.
    pub older_than_days: u32,

    /// Interval between runs in watch mode; zero means always due.
    #[serde(default)]
    pub clean_every_n_hours: u32,
}

impl Job {
    /// Creates a job builder.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> JobBuilder {
        JobBuilder::new(name)
    }

    /// Returns true if the job has no periodic interval.
    #[must_use]
    pub const fn is_manual_only(&self) -> bool {
        self.clean_every_n_hours == 0
    }

    /// Returns true if resolving this job's repositories needs the catalog.
    #[must_use]
    pub fn needs_catalog(&self) -> bool {
        self.repositories.iter().any(RepositorySelector::is_pattern)
    }

    /// Returns true if `tag` matches any of the job's tag patterns.
    #[must_use]
    pub fn matches_tag(&self, tag: &str) -> bool {
        self.tag_regexps.iter().any(|p| p.is_match(tag))
    }
}

impl Validate for Job {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.name.trim().is_empty() {
            errors.add(ValidationError::required("name"));
        }

        if self.repositories.is_empty() {
            errors.add(ValidationError::empty(format!("{}.repositories", self.name)));
        }

        for selector in &self.repositories {
            if matches!(selector, RepositorySelector::Literal(name) if name.is_empty()) {
                errors.add(ValidationError::format(
                    format!("{}.repositories", self.name),
                    "repository name must not be blank",
                ));
            }
        }

        if self.tag_regexps.is_empty() {
            errors.add(ValidationError::empty(format!("{}.tag_regexps", self.name)));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Builder for [`Job`].
#[derive(Debug)]
pub struct JobBuilder {
    name: String,
    description: Option<String>,
    repositories: Vec<RepositorySelector>,
    tag_regexps: Vec<NamePattern>,
    save_last: u32,
    older_than_days: u32,
    clean_every_n_hours: u32,
}

impl JobBuilder {
    /// Creates a builder for a job with the given name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            repositories: Vec::new(),
            tag_regexps: Vec::new(),
            save_last: 0,
            older_than_days: 0,
            clean_every_n_hours: 0,
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a literal repository name.
    #[must_use]
    pub fn repository(mut self, name: impl Into<String>) -> Self {
        self.repositories.push(RepositorySelector::Literal(name.into()));
        self
    }

    /// Adds a repository selector.
    #[must_use]
    pub fn selector(mut self, selector: RepositorySelector) -> Self {
        self.repositories.push(selector);
        self
    }

    /// Appends a tag pattern, opening a new retention group.
    #[must_use]
    pub fn tag_pattern(mut self, pattern: NamePattern) -> Self {
        self.tag_regexps.push(pattern);
        self
    }

    /// Sets the number of newest tags kept per group.
    #[must_use]
    pub const fn save_last(mut self, count: u32) -> Self {
        self.save_last = count;
        self
    }

    /// Sets the age threshold in days.
    #[must_use]
    pub const fn older_than_days(mut self, days: u32) -> Self {
        self.older_than_days = days;
        self
    }

    /// Sets the watch-mode interval in hours.
    #[must_use]
    pub const fn clean_every_n_hours(mut self, hours: u32) -> Self {
        self.clean_every_n_hours = hours;
        self
    }

    /// Builds the job.
    #[must_use]
    pub fn build(self) -> Job {
        Job {
            name: self.name,
            description: self.description,
            repositories: self.repositories,
            tag_regexps: self.tag_regexps,
            save_last: self.save_last,
            older_than_days: self.older_than_days,
            clean_every_n_hours: self.clean_every_n_hours,
        }
    }
}
