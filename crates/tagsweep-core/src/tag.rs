//! Tag metadata as reported by the registry.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tag together with the manifest it points at and its creation time.
///
/// Records are fetched fresh for every run and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    /// Repository the tag belongs to.
    pub repository: String,

    /// Tag name.
    pub name: String,

    /// Content digest of the manifest the tag points at.
    pub digest: String,

    /// Creation time reported by the registry.
    pub created: DateTime<Utc>,
}

impl TagRecord {
    /// Creates a new tag record.
    #[must_use]
    pub fn new(
        repository: impl Into<String>,
        name: impl Into<String>,
        digest: impl Into<String>,
        created: DateTime<Utc>,
    ) -> Self {
        Self {
            repository: repository.into(),
            name: name.into(),
            digest: digest.into(),
            created,
        }
    }

    /// Newest-first ordering with ties broken by ascending tag name.
    #[must_use]
    pub fn newest_first(a: &Self, b: &Self) -> Ordering {
        b.created
            .cmp(&a.created)
            .then_with(|| a.name.cmp(&b.name))
    }
}

impl fmt::Display for TagRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.name)
    }
}
