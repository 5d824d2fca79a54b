//! Error types for tagsweep core operations.

use thiserror::Error;

/// Result type alias using [`Error`] as the error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tagsweep core operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A tag or repository pattern failed to compile.
    #[error("Invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The offending pattern source.
        pattern: String,
        /// Underlying regex error.
        #[source]
        source: regex::Error,
    },
}
