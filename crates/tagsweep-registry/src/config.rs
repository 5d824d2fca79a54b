//! Configuration types for the registry client.

use std::time::Duration;

/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// Default bound on in-flight requests.
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 20;

/// Configuration for the registry client.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Registry base URL without the `/v2` suffix (e.g. `https://registry.example.com`).
    pub url: String,

    /// Authentication configuration.
    pub auth: RegistryAuth,

    /// Proxy URL applied to every request. The environment is never consulted.
    pub proxy: Option<String>,

    /// Timeout for one full HTTP exchange, body included.
    pub timeout: Duration,

    /// Maximum number of requests in flight at any moment.
    pub max_concurrent_requests: usize,

    /// Page size requested from paginated endpoints.
    pub page_size: Option<u32>,

    /// Log every request and response at info level.
    pub http_logs: bool,

    /// User agent string.
    pub user_agent: String,
}

impl RegistryConfig {
    /// Creates a new registry configuration with the given URL.
    ///
    /// Trailing slashes and a trailing `/v2` are stripped.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagsweep_registry::RegistryConfig;
    ///
    /// let config = RegistryConfig::new("https://registry.example.com/v2/");
    /// assert_eq!(config.url, "https://registry.example.com");
    /// assert_eq!(config.api_base(), "https://registry.example.com/v2");
    /// ```
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: normalize_url(&url.into()),
            auth: RegistryAuth::None,
            proxy: None,
            timeout: DEFAULT_TIMEOUT,
            max_concurrent_requests: DEFAULT_MAX_CONCURRENT_REQUESTS,
            page_size: None,
            http_logs: false,
            user_agent: format!("tagsweep/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the authentication method.
    #[must_use]
    pub fn with_auth(mut self, auth: RegistryAuth) -> Self {
        self.auth = auth;
        self
    }

    /// Sets the proxy URL.
    #[must_use]
    pub fn with_proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the in-flight request bound.
    #[must_use]
    pub const fn with_max_concurrent_requests(mut self, max: usize) -> Self {
        self.max_concurrent_requests = max;
        self
    }

    /// Sets the page size for catalog and tag listing.
    #[must_use]
    pub const fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Enables request/response logging at info level.
    #[must_use]
    pub const fn with_http_logs(mut self, enabled: bool) -> Self {
        self.http_logs = enabled;
        self
    }

    /// Returns the API root, `<url>/v2`.
    #[must_use]
    pub fn api_base(&self) -> String {
        format!("{}/v2", self.url)
    }
}

fn normalize_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    trimmed
        .strip_suffix("/v2")
        .unwrap_or(trimmed)
        .trim_end_matches('/')
        .to_string()
}

/// Authentication methods for registry access.
#[derive(Clone, Default, PartialEq, Eq)]
pub enum RegistryAuth {
    /// No authentication.
    #[default]
    None,

    /// Basic authentication sent with every request.
    Basic {
        /// Username.
        username: String,
        /// Password or token.
        password: String,
    },
}

impl RegistryAuth {
    /// Creates basic authentication.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagsweep_registry::RegistryAuth;
    ///
    /// let auth = RegistryAuth::basic("user", "password");
    /// assert!(auth.is_configured());
    /// ```
    #[must_use]
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Returns true if credentials are present.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        matches!(self, Self::Basic { .. })
    }
}

impl std::fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}
