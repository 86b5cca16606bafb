//! Library Error Types
//!
//! Failures from the blob and record stores are wrapped, not flattened: the
//! store's own error stays in the `exn` tree beneath the library's kind.

use derive_more::{Display, Error};
use revisit_priority::models::MaterialId;

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of a library failure.
///
/// ### Validation Errors
/// Raised before any store is touched.
/// - [`ErrorKind::UnsupportedContentType`]
/// - [`ErrorKind::InvalidFilename`]
///
/// ### Dependency Errors
/// - [`ErrorKind::NotFound`]
/// - [`ErrorKind::Storage`]
/// - [`ErrorKind::Records`]
/// - [`ErrorKind::Cleanup`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Only PDFs may be uploaded.
    #[display("unsupported file type {_0:?}, only PDFs can be uploaded")]
    UnsupportedContentType(#[error(not(source))] String),
    #[display("invalid file name {_0:?}")]
    InvalidFilename(#[error(not(source))] String),
    #[display("no material with id {_0}")]
    NotFound(#[error(not(source))] MaterialId),
    /// A blob store operation failed.
    #[display("file storage failed")]
    Storage,
    /// A record store operation failed.
    #[display("material records could not be read or written")]
    Records,
    /// Removing orphaned files failed.
    #[display("could not clean up orphaned files")]
    Cleanup,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Records)
    }
}
