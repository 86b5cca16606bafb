//! Storage models.

use std::path::PathBuf;
use time::OffsetDateTime;

/// Blob metadata returned by storage backends when listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Key relative to the storage root
    pub path: PathBuf,
    /// Blob size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}
impl FileInfo {
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: OffsetDateTime) -> Self {
        Self {
            path: path.into(),
            size,
            modified,
        }
    }

    /// The key as stored in material records.
    pub fn key(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}
