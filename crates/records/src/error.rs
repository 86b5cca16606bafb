//! Record Store Error Types
//!
//! Structured errors using `exn` for automatic location tracking and error
//! tree construction.

use derive_more::{Display, Error};
use revisit_priority::models::MaterialId;

/// A record store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for record store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("database error")]
    Database,
    #[display("database migration error")]
    Migration,
    #[display("material not found: {_0}")]
    NotFound(#[error(not(source))] MaterialId),
    /// The material was changed by someone else since it was read.
    #[display("material was modified concurrently: {_0}")]
    Conflict(#[error(not(source))] MaterialId),
    /// A stored value could not be converted to or from its model.
    #[display("invalid record data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    ///
    /// A [`Conflict`](Self::Conflict) can be retried after re-reading the
    /// material.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
