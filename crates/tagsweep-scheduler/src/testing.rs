//! In-memory registry used by the scheduler and coordinator tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use tagsweep_core::TagRecord;
use tagsweep_registry::{Registry, RegistryError, Result};

pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

pub fn tag(repository: &str, name: &str, digest: &str, days_ago: i64) -> TagRecord {
    TagRecord::new(repository, name, digest, now() - Duration::days(days_ago))
}

fn protocol(url: &str) -> RegistryError {
    RegistryError::Protocol {
        url: url.to_string(),
        message: "injected failure".to_string(),
    }
}

#[derive(Debug, Default)]
pub struct FakeRegistry {
    repositories: HashMap<String, Vec<TagRecord>>,
    catalog_fails: bool,
    broken_listing: Mutex<HashSet<String>>,
    vanished: HashSet<(String, String)>,
    broken_metadata: HashSet<(String, String)>,
    missing_digests: HashSet<String>,
    broken_digests: HashSet<String>,
    deleted: Mutex<Vec<(String, String)>>,
    catalog_calls: Mutex<usize>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tags(mut self, records: Vec<TagRecord>) -> Self {
        for record in records {
            self.repositories
                .entry(record.repository.clone())
                .or_default()
                .push(record);
        }
        self
    }

    pub fn with_empty_repository(mut self, repository: &str) -> Self {
        self.repositories.entry(repository.to_string()).or_default();
        self
    }

    pub fn failing_catalog(mut self) -> Self {
        self.catalog_fails = true;
        self
    }

    pub fn failing_listing(self, repository: &str) -> Self {
        self.set_listing_broken(repository, true);
        self
    }

    pub fn set_listing_broken(&self, repository: &str, broken: bool) {
        let mut broken_listing = self.broken_listing.lock().unwrap();
        if broken {
            broken_listing.insert(repository.to_string());
        } else {
            broken_listing.remove(repository);
        }
    }

    pub fn vanished_tag(mut self, repository: &str, tag: &str) -> Self {
        self.vanished.insert((repository.to_string(), tag.to_string()));
        self
    }

    pub fn failing_metadata(mut self, repository: &str, tag: &str) -> Self {
        self.broken_metadata
            .insert((repository.to_string(), tag.to_string()));
        self
    }

    pub fn missing_on_delete(mut self, digest: &str) -> Self {
        self.missing_digests.insert(digest.to_string());
        self
    }

    pub fn failing_delete(mut self, digest: &str) -> Self {
        self.broken_digests.insert(digest.to_string());
        self
    }

    pub fn deleted(&self) -> Vec<(String, String)> {
        let mut deleted = self.deleted.lock().unwrap().clone();
        deleted.sort();
        deleted
    }

    pub fn catalog_calls(&self) -> usize {
        *self.catalog_calls.lock().unwrap()
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn list_repositories(&self) -> Result<Vec<String>> {
        *self.catalog_calls.lock().unwrap() += 1;
        if self.catalog_fails {
            return Err(protocol("_catalog"));
        }
        let mut names: Vec<_> = self.repositories.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        if self.broken_listing.lock().unwrap().contains(repository) {
            return Err(protocol(repository));
        }
        self.repositories
            .get(repository)
            .map(|records| records.iter().map(|r| r.name.clone()).collect())
            .ok_or_else(|| RegistryError::NotFound {
                url: repository.to_string(),
            })
    }

    async fn tag_metadata(&self, repository: &str, tag: &str) -> Result<TagRecord> {
        let key = (repository.to_string(), tag.to_string());
        if self.vanished.contains(&key) {
            return Err(RegistryError::NotFound {
                url: format!("{repository}:{tag}"),
            });
        }
        if self.broken_metadata.contains(&key) {
            return Err(protocol(tag));
        }
        self.repositories
            .get(repository)
            .and_then(|records| records.iter().find(|r| r.name == tag))
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                url: format!("{repository}:{tag}"),
            })
    }

    async fn delete_manifest(&self, repository: &str, digest: &str) -> Result<()> {
        if self.broken_digests.contains(digest) {
            return Err(protocol(digest));
        }
        if self.missing_digests.contains(digest) {
            return Err(RegistryError::NotFound {
                url: digest.to_string(),
            });
        }
        self.deleted
            .lock()
            .unwrap()
            .push((repository.to_string(), digest.to_string()));
        Ok(())
    }
}
