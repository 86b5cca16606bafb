//! Storage backend trait and implementations.
//!
//! The blob store only ever needs to hold opaque bytes under a generated key
//! and hand out a URL for them. Everything about *which* bytes belong to
//! *which* material lives in the record store.

mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::error::Result;
use crate::models::FileInfo;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;
use url::Url;

pub(crate) type FileInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<FileInfo>> + Send + 'a>>;

/// Unified interface for blob storage backends.
///
/// # Keys
/// All keys are relative to the storage root and must be validated using
/// [`validate_path`](crate::validate_path) before use. Implementations
/// enforce this validation.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use revisit_storage::{StorageBackend, PDF_CONTENT_TYPE, error::Result};
///
/// async fn store_and_link(backend: &dyn StorageBackend, pdf: &[u8]) -> Result<String> {
///     let key = Path::new("1767225600000_a1b2c3d4_notes.pdf");
///     backend.upload(key, pdf, PDF_CONTENT_TYPE).await?;
///     Ok(backend.public_url(key))
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// List all blobs matching an optional prefix.
    ///
    /// Default implementation collects [`list_stream()`](Self::list_stream)
    /// into a [`Vec`].
    async fn list(&self, prefix: Option<&Path>) -> Result<Vec<FileInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream blob metadata matching an optional prefix.
    ///
    /// Asking for a prefix that doesn't exist yields an empty stream, not an
    /// error.
    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a>;

    /// Check if a blob exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Read blob contents.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the blob
    /// does not exist.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Store blob contents under `path`, replacing anything already there.
    ///
    /// `content_type` is recorded by backends that support it (S3) and
    /// logged by those that don't.
    async fn upload(&self, path: &Path, data: &[u8], content_type: &str) -> Result<()>;

    /// Delete a blob.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the blob
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Public URL at which the blob can be fetched.
    ///
    /// Pure string construction: no request is made and the blob is not
    /// required to exist.
    fn public_url(&self, path: &Path) -> String;
}

/// Append each component of `path` to `base` as a percent-encoded path
/// segment.
pub(crate) fn join_url(base: &Url, path: &Path) -> String {
    let mut url = base.clone();
    // Base URLs are checked for `cannot_be_a_base()` on construction, so this
    // only falls through for URLs no backend will ever hold.
    if let Ok(mut segments) = url.path_segments_mut() {
        segments.pop_if_empty();
        for component in path.components() {
            segments.push(&component.as_os_str().to_string_lossy());
        }
    }
    url.to_string()
}

/// Parse and check a public base URL so that [`join_url`] can append keys.
pub(crate) fn parse_base_url(base: &str) -> Result<Url> {
    use crate::error::ErrorKind;
    use exn::ResultExt;
    let url = Url::parse(base).or_raise(|| ErrorKind::InvalidUrl(base.to_string()))?;
    if url.cannot_be_a_base() {
        exn::bail!(ErrorKind::InvalidUrl(base.to_string()));
    }
    Ok(url)
}
