//! In-memory storage backend for testing.

use super::FileInfoStream;
use crate::StorageBackend;
use crate::error::{ErrorKind, Result};
use crate::models::FileInfo;
use crate::path::validate as validate_path;
use async_stream::stream;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use time::OffsetDateTime;
use tokio::sync::RwLock;

/// A blob held by [`MockBackend`].
#[derive(Debug, Clone)]
struct Blob {
    inserted: OffsetDateTime,
    content_type: String,
    data: Vec<u8>,
}

/// In-memory storage backend for testing.
///
/// Blobs are stored in a `HashMap` behind a [`RwLock`], so all trait methods
/// can operate on `&self`. Every trait call is counted, and uploads or
/// deletes can be made to fail on demand to exercise error paths in callers.
///
/// # Examples
///
/// ```
/// use revisit_storage::backend::{MockBackend, StorageBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_files([("lecture-1.pdf", b"%PDF-1.7")]);
/// assert!(backend.exists(Path::new("lecture-1.pdf")).await?);
/// assert_eq!(backend.calls(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<HashMap<PathBuf, Blob>>,
    calls: AtomicUsize,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MockBackend {
    /// Create a mock backend pre-populated with PDF blobs.
    ///
    /// Panics if any key fails validation (e.g. path traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_files(files: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        let now = OffsetDateTime::now_utc();
        for (path, data) in files {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_files: invalid path {}", path.display());
            };
            let blob = Blob {
                inserted: now,
                content_type: crate::PDF_CONTENT_TYPE.to_string(),
                data: data.into(),
            };
            map.insert(validated, blob);
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            calls: AtomicUsize::new(0),
            fail_uploads: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
        }
    }

    /// Make every subsequent upload fail with a network error.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_uploads.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent delete fail with a network error.
    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// Number of trait calls made so far (excluding `name()`).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Content type recorded for a blob, if it exists.
    pub async fn content_type(&self, path: &Path) -> Option<String> {
        let path = validate_path(path).ok()?;
        self.storage.read().await.get(&path).map(|blob| blob.content_type.clone())
    }

    /// Number of blobs currently stored.
    pub async fn len(&self) -> usize {
        self.storage.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let files: [(&str, &[u8]); 0] = [];
        Self::with_files(files)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        self.record_call();
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // Snapshot under the read lock, then drop it before yielding.
            let entries: Vec<FileInfo> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .filter(|(path, _)| match &validated_prefix {
                        Some(pfx) => path.starts_with(pfx),
                        None => true,
                    })
                    .map(|(path, blob)| FileInfo::new(path.clone(), blob.data.len() as u64, blob.inserted))
                    .collect()
            };
            for info in entries {
                yield Ok(info);
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.record_call();
        let path = validate_path(path)?;
        Ok(self.storage.read().await.contains_key(&path))
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.record_call();
        let path = validate_path(path)?;
        let blob =
            self.storage.read().await.get(&path).cloned().ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))?;
        Ok(blob.data)
    }

    async fn upload(&self, path: &Path, data: &[u8], content_type: &str) -> Result<()> {
        self.record_call();
        let path = validate_path(path)?;
        if self.fail_uploads.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Network(format!("simulated upload failure for {}", path.display())));
        }
        let blob = Blob {
            inserted: OffsetDateTime::now_utc(),
            content_type: content_type.to_string(),
            data: data.to_vec(),
        };
        self.storage.write().await.insert(path, blob);
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        self.record_call();
        let path = validate_path(path)?;
        if self.fail_deletes.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Network(format!("simulated delete failure for {}", path.display())));
        }
        self.storage.write().await.remove(&path).map(|_| ()).ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(path)))
    }

    fn public_url(&self, path: &Path) -> String {
        self.record_call();
        format!("mock://{}/{}", self.name, path.display())
    }
}
