//! Registry API v2 wire types.
//!
//! Covers the subset of Docker and OCI manifest formats needed to find a
//! tag's digest and creation time.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Media types the client is prepared to read.
pub struct MediaType;

impl MediaType {
    /// Docker image manifest, schema 2.
    pub const DOCKER_MANIFEST: &'static str = "application/vnd.docker.distribution.manifest.v2+json";

    /// Docker manifest list.
    pub const DOCKER_MANIFEST_LIST: &'static str =
        "application/vnd.docker.distribution.manifest.list.v2+json";

    /// OCI image manifest.
    pub const OCI_MANIFEST: &'static str = "application/vnd.oci.image.manifest.v1+json";

    /// OCI image index.
    pub const OCI_INDEX: &'static str = "application/vnd.oci.image.index.v1+json";

    /// `Accept` header value sent with manifest requests.
    #[must_use]
    pub fn manifest_accept() -> String {
        [
            Self::DOCKER_MANIFEST,
            Self::DOCKER_MANIFEST_LIST,
            Self::OCI_MANIFEST,
            Self::OCI_INDEX,
        ]
        .join(", ")
    }

    /// Returns true for index-like media types.
    #[must_use]
    pub fn is_index(media_type: &str) -> bool {
        media_type == Self::DOCKER_MANIFEST_LIST || media_type == Self::OCI_INDEX
    }
}

/// Annotation carrying the image creation time.
pub const CREATED_ANNOTATION: &str = "org.opencontainers.image.created";

/// Content descriptor.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    /// Media type of the referenced content.
    #[serde(default)]
    pub media_type: Option<String>,

    /// Digest of the referenced content.
    pub digest: String,

    /// Size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
}

/// An image manifest or an image index.
///
/// Both shapes share one struct: manifests carry `config`, indexes carry
/// `manifests`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Schema version, 2 for every supported format.
    #[serde(default)]
    pub schema_version: Option<u32>,

    /// Media type, when the document declares one.
    #[serde(default)]
    pub media_type: Option<String>,

    /// Image configuration blob.
    #[serde(default)]
    pub config: Option<Descriptor>,

    /// Child manifests of an index.
    #[serde(default)]
    pub manifests: Vec<Descriptor>,

    /// Manifest annotations.
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

impl Manifest {
    /// Returns true if the document is an index or manifest list.
    #[must_use]
    pub fn is_index(&self) -> bool {
        self.media_type.as_deref().is_some_and(MediaType::is_index)
            || (self.config.is_none() && !self.manifests.is_empty())
    }

    /// Creation time from the standard annotation.
    #[must_use]
    pub fn created_annotation(&self) -> Option<DateTime<Utc>> {
        self.annotations
            .get(CREATED_ANNOTATION)
            .and_then(|value| parse_timestamp(value))
    }
}

/// The fields read from an image configuration blob.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    /// Creation time as written by the builder.
    #[serde(default)]
    pub created: Option<String>,
}

/// Response of `GET /v2/<name>/tags/list`.
#[derive(Debug, Clone, Deserialize)]
pub struct TagList {
    /// Repository name.
    #[serde(default)]
    pub name: Option<String>,

    /// Tags; registries send `null` for a repository without tags.
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

/// Response of `GET /v2/_catalog`.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    /// Repository names.
    #[serde(default)]
    pub repositories: Option<Vec<String>>,
}

/// Parses an RFC 3339 timestamp into UTC.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Extracts the `rel="next"` target from a `Link` header value.
///
/// # Examples
///
/// ```
/// use tagsweep_registry::oci::next_link;
///
/// let header = r#"</v2/_catalog?last=b&n=2>; rel="next""#;
/// assert_eq!(next_link(header), Some("/v2/_catalog?last=b&n=2"));
/// assert_eq!(next_link(r#"</x>; rel="prev""#), None);
/// ```
#[must_use]
pub fn next_link(header: &str) -> Option<&str> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim();
            param
                .strip_prefix("rel=")
                .is_some_and(|rel| rel.trim_matches('"') == "next")
        });
        if is_next {
            target.strip_prefix('<')?.strip_suffix('>')
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manifest_with_config() {
        let json = r#"{
            "schemaVersion": 2,
            "mediaType": "application/vnd.docker.distribution.manifest.v2+json",
            "config": {"mediaType": "application/vnd.docker.container.image.v1+json", "digest": "sha256:cfg", "size": 10},
            "layers": []
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert!(!manifest.is_index());
        assert_eq!(manifest.config.unwrap().digest, "sha256:cfg");
    }

    #[test]
    fn test_index_detection_without_media_type() {
        let json = r#"{"schemaVersion": 2, "manifests": [{"digest": "sha256:child"}]}"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert!(manifest.is_index());
    }

    #[test]
    fn test_created_annotation() {
        let json = r#"{
            "schemaVersion": 2,
            "mediaType": "application/vnd.oci.image.manifest.v1+json",
            "config": {"digest": "sha256:cfg"},
            "annotations": {"org.opencontainers.image.created": "2024-03-01T10:00:00Z"}
        }"#;
        let manifest: Manifest = serde_json::from_str(json).unwrap();
        assert_eq!(
            manifest.created_annotation(),
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_timestamp_with_offset_and_fraction() {
        let parsed = parse_timestamp("2024-03-01T12:00:00.123456789+02:00").unwrap();
        assert_eq!(parsed.date_naive(), Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap().date_naive());
        assert_eq!(parsed.timestamp(), Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap().timestamp());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_tag_list_with_null_tags() {
        let list: TagList = serde_json::from_str(r#"{"name": "app", "tags": null}"#).unwrap();
        assert!(list.tags.is_none());
    }

    #[test]
    fn test_next_link_absolute_and_multiple() {
        let header = r#"<https://r.example.com/v2/app/tags/list?last=x>; rel="next", <https://r.example.com/v2/app/tags/list>; rel="first""#;
        assert_eq!(
            next_link(header),
            Some("https://r.example.com/v2/app/tags/list?last=x")
        );
        assert_eq!(next_link("garbage"), None);
    }

    #[test]
    fn test_manifest_accept_lists_all_types() {
        let accept = MediaType::manifest_accept();
        assert!(accept.contains(MediaType::OCI_INDEX));
        assert!(accept.contains(MediaType::DOCKER_MANIFEST));
    }
}
