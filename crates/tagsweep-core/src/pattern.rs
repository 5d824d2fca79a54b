//! Ordered pattern matching over tag and repository names.
//!
//! Patterns match from the start of a name but are not anchored at the end,
//! so `release-` matches `release-1.2` while `v\d+$` only matches names that
//! consist of the whole pattern.

use std::collections::HashSet;
use std::fmt;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Prefix that marks a repository selector as a pattern.
const PATTERN_PREFIX: &str = "r/";

/// Suffix that closes a repository pattern selector.
const PATTERN_SUFFIX: &str = "/";

/// A compiled, start-anchored regular expression.
///
/// Equality and serialization use the source text the pattern was built from.
#[derive(Clone)]
pub struct NamePattern {
    source: String,
    regex: Regex,
}

impl NamePattern {
    /// Compiles a new pattern.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the source is not a valid regex.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagsweep_core::NamePattern;
    ///
    /// let pattern = NamePattern::new(r"v\d+").unwrap();
    /// assert!(pattern.is_match("v12-rc"));
    /// assert!(!pattern.is_match("build-v12"));
    /// ```
    pub fn new(source: impl Into<String>) -> Result<Self> {
        let source = source.into();
        let regex = Regex::new(&format!("^(?:{source})")).map_err(|e| Error::InvalidPattern {
            pattern: source.clone(),
            source: e,
        })?;
        Ok(Self { source, regex })
    }

    /// Returns the pattern source as written in configuration.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if `name` matches this pattern.
    #[must_use]
    pub fn is_match(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }
}

impl fmt::Debug for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("NamePattern").field(&self.source).finish()
    }
}

impl fmt::Display for NamePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl PartialEq for NamePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

impl Eq for NamePattern {}

impl Serialize for NamePattern {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.source)
    }
}

impl<'de> Deserialize<'de> for NamePattern {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::new(s).map_err(serde::de::Error::custom)
    }
}

/// Selects repositories for a job.
///
/// Written in configuration either as a plain repository name or as
/// `r/<regex>/`, which is matched against the registry catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositorySelector {
    /// A repository name used verbatim.
    Literal(String),

    /// A pattern matched against every repository in the catalog.
    Pattern(NamePattern),
}

impl RepositorySelector {
    /// Parses a selector from its configuration form.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if a `r/.../` selector does not compile.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagsweep_core::RepositorySelector;
    ///
    /// let literal = RepositorySelector::parse(" backend ").unwrap();
    /// assert_eq!(literal, RepositorySelector::Literal("backend".into()));
    ///
    /// let pattern = RepositorySelector::parse(r"r/team-\w+/").unwrap();
    /// assert!(pattern.is_pattern());
    /// ```
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        match raw
            .strip_prefix(PATTERN_PREFIX)
            .and_then(|rest| rest.strip_suffix(PATTERN_SUFFIX))
        {
            Some(source) => Ok(Self::Pattern(NamePattern::new(source)?)),
            None => Ok(Self::Literal(raw.to_string())),
        }
    }

    /// Returns true if this selector needs the registry catalog.
    #[must_use]
    pub const fn is_pattern(&self) -> bool {
        matches!(self, Self::Pattern(_))
    }
}

impl fmt::Display for RepositorySelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(name) => f.write_str(name),
            Self::Pattern(pattern) => write!(f, "{PATTERN_PREFIX}{pattern}{PATTERN_SUFFIX}"),
        }
    }
}

impl Serialize for RepositorySelector {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RepositorySelector {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Concrete repository set produced from a job's selectors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedRepositories {
    /// Repository names, deduplicated, in first-selected order.
    pub repositories: Vec<String>,

    /// Source text of pattern selectors that matched no repository.
    pub unmatched_patterns: Vec<String>,
}

/// Resolves selectors into repository names.
///
/// Literal selectors are kept verbatim even when they are absent from
/// `catalog`. Pattern selectors are matched against `catalog` in its order.
///
/// # Examples
///
/// ```
/// use tagsweep_core::{resolve_repositories, RepositorySelector};
///
/// let selectors = vec![
///     RepositorySelector::parse("frontend").unwrap(),
///     RepositorySelector::parse(r"r/repo\d+/").unwrap(),
/// ];
/// let catalog: Vec<String> = ["repo1", "repof", "repo22"].map(String::from).into();
///
/// let resolved = resolve_repositories(&selectors, &catalog);
/// assert_eq!(resolved.repositories, ["frontend", "repo1", "repo22"]);
/// ```
#[must_use]
pub fn resolve_repositories(
    selectors: &[RepositorySelector],
    catalog: &[String],
) -> ResolvedRepositories {
    let mut seen = HashSet::new();
    let mut resolved = ResolvedRepositories::default();

    for selector in selectors {
        match selector {
            RepositorySelector::Literal(name) => {
                if seen.insert(name.clone()) {
                    resolved.repositories.push(name.clone());
                }
            }
            RepositorySelector::Pattern(pattern) => {
                let mut matched = false;
                for name in catalog.iter().filter(|name| pattern.is_match(name)) {
                    matched = true;
                    if seen.insert(name.clone()) {
                        resolved.repositories.push(name.clone());
                    }
                }
                if !matched {
                    resolved.unmatched_patterns.push(pattern.to_string());
                }
            }
        }
    }

    resolved
}
