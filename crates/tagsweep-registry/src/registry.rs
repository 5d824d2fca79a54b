//! The registry operations the scheduler depends on.

use async_trait::async_trait;
use tagsweep_core::TagRecord;

use crate::error::Result;

/// Read and delete access to a Docker Registry v2.
///
/// [`RegistryClient`](crate::RegistryClient) is the HTTP implementation;
/// tests substitute in-memory fakes.
#[async_trait]
pub trait Registry: Send + Sync {
    /// Lists every repository in the catalog, following pagination.
    async fn list_repositories(&self) -> Result<Vec<String>>;

    /// Lists every tag of `repository`, following pagination.
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>>;

    /// Resolves the manifest digest and creation time of `repository:tag`.
    async fn tag_metadata(&self, repository: &str, tag: &str) -> Result<TagRecord>;

    /// Deletes the manifest `digest` and with it every tag pointing at it.
    async fn delete_manifest(&self, repository: &str, digest: &str) -> Result<()>;
}
