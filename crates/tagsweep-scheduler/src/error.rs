//! Error types for the scheduler crate.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for scheduler operations.
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Errors that can occur while scheduling and persisting job runs.
#[derive(Error, Debug)]
pub enum SchedulerError {
    /// The state file could not be read or written.
    #[error("state file error at {path}: {source}")]
    StateIo {
        /// State file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The state could not be serialized.
    #[error("failed to serialize state: {0}")]
    StateSerialization(#[from] serde_json::Error),

    /// The history log could not be written.
    #[error("history log error at {path}: {source}")]
    HistoryIo {
        /// History file path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A requested job is not configured.
    #[error("unknown job '{name}'")]
    UnknownJob {
        /// Requested job name.
        name: String,
    },
}

impl SchedulerError {
    pub(crate) fn state_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::StateIo {
            path: path.into(),
            source,
        }
    }
}
