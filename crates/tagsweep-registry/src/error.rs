//! Error types for registry operations.

use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while talking to the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The request never produced a response.
    #[error("transport error for {url}: {source}")]
    Transport {
        /// Request URL.
        url: String,
        /// Underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The exchange did not complete within the configured timeout.
    #[error("request to {url} timed out after {}s", after.as_secs_f64())]
    Timeout {
        /// Request URL.
        url: String,
        /// Configured timeout.
        after: Duration,
    },

    /// The registry rejected the credentials.
    #[error("authentication failed for {url} (HTTP {status})")]
    Auth {
        /// Request URL.
        url: String,
        /// HTTP status code, 401 or 403.
        status: u16,
    },

    /// The repository, tag or manifest does not exist.
    #[error("not found: {url}")]
    NotFound {
        /// Request URL.
        url: String,
    },

    /// Unexpected status or undecodable response.
    #[error("protocol error for {url}: {message}")]
    Protocol {
        /// Request URL.
        url: String,
        /// Error message.
        message: String,
    },

    /// The client could not be built from its configuration.
    #[error("invalid registry configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },
}

impl RegistryError {
    /// Classifies a `reqwest` failure for `url`.
    pub(crate) fn from_reqwest(url: &str, source: reqwest::Error, after: Duration) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
                after,
            }
        } else if source.is_decode() {
            Self::Protocol {
                url: url.to_string(),
                message: source.to_string(),
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                source,
            }
        }
    }

    /// Creates a protocol error.
    pub(crate) fn protocol(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Protocol {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Returns true for [`RegistryError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
