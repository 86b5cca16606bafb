//! Configuration Error Types

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// No home directory, so there is nowhere to put default files.
    #[display("could not determine the user's home directory")]
    NoHomeDirectory,
    #[display("configuration file not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// A file or environment variable could not be parsed.
    #[display("could not read configuration")]
    Parse,
    #[display("invalid configuration value: {_0}")]
    InvalidValue(#[error(not(source))] &'static str),
    #[display("could not serialize configuration")]
    Serialize,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
