//! HTTP client for the Docker Registry API v2.
//!
//! Every exchange, body included, runs under one permit of a shared
//! semaphore and inside the configured timeout.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use tagsweep_core::TagRecord;
use tokio::sync::Semaphore;
use url::Url;

use crate::config::{RegistryAuth, RegistryConfig};
use crate::error::{RegistryError, Result};
use crate::oci::{self, Catalog, ImageConfig, Manifest, MediaType, TagList};
use crate::registry::Registry;

const DIGEST_HEADER: &str = "Docker-Content-Digest";

/// A completed HTTP exchange with its body fully read.
#[derive(Debug)]
struct Exchange {
    url: Url,
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
}

impl Exchange {
    /// Maps the status to the error taxonomy.
    fn check(self) -> Result<Self> {
        let status = self.status;
        if status.is_success() {
            return Ok(self);
        }
        let url = self.url.to_string();
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RegistryError::Auth {
                url,
                status: status.as_u16(),
            }),
            StatusCode::NOT_FOUND => Err(RegistryError::NotFound { url }),
            _ => Err(RegistryError::protocol(
                url,
                format!("unexpected status {status}: {}", self.body_snippet()),
            )),
        }
    }

    fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            RegistryError::protocol(self.url.as_str(), format!("invalid JSON body: {e}"))
        })
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn body_snippet(&self) -> String {
        let text = String::from_utf8_lossy(&self.body);
        text.chars().take(200).collect()
    }
}

/// Client for a Docker Registry v2 endpoint.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    config: RegistryConfig,
    http: reqwest::Client,
    limiter: Arc<Semaphore>,
}

impl RegistryClient {
    /// Creates a new registry client with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidConfig`] if the proxy or credentials
    /// are unusable, or the HTTP client cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use tagsweep_registry::{RegistryAuth, RegistryClient, RegistryConfig};
    ///
    /// let config = RegistryConfig::new("https://registry.example.com")
    ///     .with_auth(RegistryAuth::basic("robot", "secret"))
    ///     .with_max_concurrent_requests(8);
    /// let client = RegistryClient::new(config)?;
    /// # Ok::<(), tagsweep_registry::RegistryError>(())
    /// ```
    pub fn new(config: RegistryConfig) -> Result<Self> {
        Url::parse(&config.api_base()).map_err(|e| RegistryError::InvalidConfig {
            message: format!("invalid registry url '{}': {e}", config.url),
        })?;

        let http = Self::build_http_client(&config)?;
        let limiter = Arc::new(Semaphore::new(config.max_concurrent_requests.max(1)));

        Ok(Self {
            config,
            http,
            limiter,
        })
    }

    /// Returns the registry configuration.
    #[must_use]
    pub const fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn build_http_client(config: &RegistryConfig) -> Result<reqwest::Client> {
        let idle_per_host = (config.max_concurrent_requests / 2).max(1);
        let mut builder = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(Self::default_headers(&config.auth)?)
            .pool_max_idle_per_host(idle_per_host);

        builder = match &config.proxy {
            Some(proxy) => builder.proxy(reqwest::Proxy::all(proxy).map_err(|e| {
                RegistryError::InvalidConfig {
                    message: format!("invalid proxy '{proxy}': {e}"),
                }
            })?),
            None => builder.no_proxy(),
        };

        builder.build().map_err(|e| RegistryError::InvalidConfig {
            message: format!("failed to build HTTP client: {e}"),
        })
    }

    /// Headers sent with every request.
    fn default_headers(auth: &RegistryAuth) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Docker-Distribution-API-Version",
            HeaderValue::from_static("registry/2.0"),
        );

        if let RegistryAuth::Basic { username, password } = auth {
            let credentials = base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                format!("{username}:{password}"),
            );
            let mut value = HeaderValue::from_str(&format!("Basic {credentials}")).map_err(|_| {
                RegistryError::InvalidConfig {
                    message: "credentials contain invalid header characters".to_string(),
                }
            })?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let raw = format!("{}/{path}", self.config.api_base());
        Url::parse(&raw).map_err(|e| RegistryError::InvalidConfig {
            message: format!("invalid request url '{raw}': {e}"),
        })
    }

    /// Performs one exchange under a limiter permit and the timeout.
    async fn execute(&self, method: Method, url: Url, accept: Option<&str>) -> Result<Exchange> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| RegistryError::InvalidConfig {
                message: "request limiter closed".to_string(),
            })?;

        let timeout = self.config.timeout;
        let started = Instant::now();
        let mut request = self.http.request(method.clone(), url.clone());
        if let Some(accept) = accept {
            request = request.header(ACCEPT, accept);
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response.bytes().await?.to_vec();
            Ok::<_, reqwest::Error>((status, headers, body))
        };

        let (status, headers, body) = tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| RegistryError::Timeout {
                url: url.to_string(),
                after: timeout,
            })?
            .map_err(|e| RegistryError::from_reqwest(url.as_str(), e, timeout))?;

        self.log_exchange(&method, &url, status, started.elapsed());

        Ok(Exchange {
            url,
            status,
            headers,
            body,
        })
    }

    fn log_exchange(&self, method: &Method, url: &Url, status: StatusCode, elapsed: Duration) {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        if self.config.http_logs {
            tracing::info!(%method, %url, status = status.as_u16(), elapsed_ms, "registry request");
        } else {
            tracing::trace!(%method, %url, status = status.as_u16(), elapsed_ms, "registry request");
        }
    }

    async fn get(&self, url: Url, accept: Option<&str>) -> Result<Exchange> {
        self.execute(Method::GET, url, accept).await?.check()
    }

    /// Collects every page of a paginated listing.
    async fn paginate<T, F>(&self, mut url: Url, extract: F) -> Result<Vec<String>>
    where
        T: DeserializeOwned,
        F: Fn(T) -> Vec<String>,
    {
        if let Some(n) = self.config.page_size {
            url.query_pairs_mut().append_pair("n", &n.to_string());
        }

        let mut items = Vec::new();
        let mut visited = HashSet::new();
        loop {
            if !visited.insert(url.clone()) {
                return Err(RegistryError::protocol(url.as_str(), "pagination cycle"));
            }
            let exchange = self.get(url.clone(), None).await?;
            items.extend(extract(exchange.json::<T>()?));

            let Some(next) = exchange.header(LINK.as_str()).and_then(oci::next_link) else {
                break;
            };
            let next = url.join(next).map_err(|e| {
                RegistryError::protocol(url.as_str(), format!("invalid Link header '{next}': {e}"))
            })?;
            url = next;
        }
        Ok(items)
    }

    async fn fetch_manifest(&self, repository: &str, reference: &str) -> Result<(Manifest, Exchange)> {
        let url = self.endpoint(&format!("{repository}/manifests/{reference}"))?;
        let exchange = self.get(url, Some(&MediaType::manifest_accept())).await?;
        let manifest = exchange.json::<Manifest>()?;
        Ok((manifest, exchange))
    }

    /// Finds the creation time of a manifest.
    ///
    /// Prefers the `org.opencontainers.image.created` annotation, then the
    /// `created` field of the config blob. An index defers to its first child.
    async fn resolve_created(&self, repository: &str, manifest: &Manifest) -> Result<DateTime<Utc>> {
        if let Some(created) = manifest.created_annotation() {
            return Ok(created);
        }

        let child;
        let image = if manifest.is_index() {
            let first = manifest.manifests.first().ok_or_else(|| {
                RegistryError::protocol(repository, "image index lists no manifests")
            })?;
            child = self.fetch_manifest(repository, &first.digest).await?.0;
            if let Some(created) = child.created_annotation() {
                return Ok(created);
            }
            &child
        } else {
            manifest
        };

        let config = image
            .config
            .as_ref()
            .ok_or_else(|| RegistryError::protocol(repository, "manifest has no config descriptor"))?;
        let url = self.endpoint(&format!("{repository}/blobs/{}", config.digest))?;
        let exchange = self.get(url, None).await?;
        let image_config = exchange.json::<ImageConfig>()?;

        image_config
            .created
            .as_deref()
            .and_then(oci::parse_timestamp)
            .ok_or_else(|| {
                RegistryError::protocol(exchange.url.as_str(), "config blob has no valid 'created' field")
            })
    }

    /// Computes the SHA-256 digest of data.
    fn compute_digest(data: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(data);
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }
}

#[async_trait]
impl Registry for RegistryClient {
    async fn list_repositories(&self) -> Result<Vec<String>> {
        let url = self.endpoint("_catalog")?;
        self.paginate(url, |catalog: Catalog| catalog.repositories.unwrap_or_default())
            .await
    }

    async fn list_tags(&self, repository: &str) -> Result<Vec<String>> {
        let url = self.endpoint(&format!("{repository}/tags/list"))?;
        let tags = self
            .paginate(url, |list: TagList| list.tags.unwrap_or_default())
            .await?;
        if tags.is_empty() {
            tracing::warn!(repository, "no tags found");
        }
        Ok(tags)
    }

    async fn tag_metadata(&self, repository: &str, tag: &str) -> Result<TagRecord> {
        let (manifest, exchange) = self.fetch_manifest(repository, tag).await?;
        let digest = exchange
            .header(DIGEST_HEADER)
            .map_or_else(|| Self::compute_digest(&exchange.body), ToString::to_string);
        let created = self.resolve_created(repository, &manifest).await?;

        Ok(TagRecord::new(repository, tag, digest, created))
    }

    async fn delete_manifest(&self, repository: &str, digest: &str) -> Result<()> {
        let url = self.endpoint(&format!("{repository}/manifests/{digest}"))?;
        let exchange = self.execute(Method::DELETE, url, None).await?;

        if exchange.status == StatusCode::METHOD_NOT_ALLOWED {
            return Err(RegistryError::protocol(
                exchange.url.as_str(),
                "deletion disabled on the registry",
            ));
        }
        exchange.check()?;

        tracing::debug!(repository, digest, "deleted manifest");
        Ok(())
    }
}
