//! Local filesystem storage backend.
//!
//! Blobs are stored in a configured directory and accessed using
//! `tokio::fs` for async I/O.

use crate::backend::{FileInfoStream, join_url, parse_base_url};
use crate::error::ErrorKind;
use crate::{FileInfo, StorageBackend, error::Result, path::validate as validate_path};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::{Metadata, create_dir_all as sync_create_dir};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;
use tokio::fs::{self, DirEntry};
use url::Url;

enum WalkEntry {
    File(FileInfo),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem storage backend.
///
/// Stores blobs in a directory on the local filesystem. All keys are
/// relative to the configured root directory.
///
/// # Examples
///
/// ```no_run
/// use revisit_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local", "/srv/revisit/blobs")?
///     .with_public_url("https://files.example.com/pdfs/")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Root directory for the blobs
    root: PathBuf,
    /// Prefix for public URLs, `file://<root>/` unless configured otherwise
    public_base: Url,
}
impl LocalBackend {
    /// Create a new local filesystem backend, creating the root directory if
    /// it doesn't exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists and is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Non-async on purpose; it happens once on startup.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        let public_base = Url::from_directory_path(&root)
            .map_err(|()| ErrorKind::InvalidUrl(format!("file://{}", root.display())))?;
        Ok(Self { name: name.into(), root, public_base })
    }

    /// Serve public URLs from `base` instead of `file://` URLs, for when the
    /// root directory is exposed by a web server.
    pub fn with_public_url(mut self, base: &str) -> Result<Self> {
        self.public_base = parse_base_url(base)?;
        Ok(self)
    }

    /// Get the absolute path for a relative storage key.
    fn absolute_path(&self, path: impl AsRef<Path>) -> Result<PathBuf> {
        let validated = validate_path(path.as_ref())?;
        Ok(self.root.join(validated))
    }

    /// Convert an absolute path back to a relative storage key.
    fn relative_path(&self, absolute: impl AsRef<Path>) -> Result<PathBuf> {
        let absolute = absolute.as_ref();
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{:?}` is not within root `{:?}`", absolute, self.root))
        })?;
        validate_path(relative)
    }

    fn metadata(path: &Path, metadata: Metadata) -> Result<FileInfo> {
        let modified = OffsetDateTime::from(metadata.modified().map_err(ErrorKind::Io)?);
        Ok(FileInfo::new(path, metadata.len(), modified))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Pulled out of the stream loop below, where `?` isn't available.
    async fn process_entry(&self, entry: DirEntry, prefix: Option<&Path>) -> Result<WalkEntry> {
        let path = entry.path();
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &path))?;
        let relative = self.relative_path(&path)?;
        if metadata.is_dir() {
            return Ok(WalkEntry::Descend(path));
        }
        if let Some(pfx) = prefix
            && !relative.starts_with(pfx)
        {
            return Ok(WalkEntry::Skip);
        }
        if metadata.is_file() {
            return Ok(WalkEntry::File(Self::metadata(&relative, metadata)?));
        }
        // Most likely a broken symlink.
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let validated_prefix = match prefix.map(validate_path).transpose() {
            Ok(pfx) => pfx,
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };
        let mut stack = vec![self.root.clone()];

        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current)));
                        continue 'dirs;
                    }
                };
                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => { yield Err(exn::Exn::from(Self::map_io_error(e, &current))); continue 'entries; },
                    };
                    match self.process_entry(entry, validated_prefix.as_deref()).await {
                        Ok(WalkEntry::File(f)) => yield Ok(f),
                        Ok(WalkEntry::Descend(d)) => stack.push(d),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::try_exists(&abs_path).await.map_err(ErrorKind::Io)?)
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::read(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    async fn upload(&self, path: &Path, data: &[u8], content_type: &str) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        if let Some(parent) = abs_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, path))?;
        }
        fs::write(&abs_path, data).await.map_err(|e| Self::map_io_error(e, path))?;
        tracing::debug!(backend = %self.name, key = %path.display(), bytes = data.len(), content_type, "Stored blob");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let abs_path = self.absolute_path(path)?;
        Ok(fs::remove_file(&abs_path).await.map_err(|e| Self::map_io_error(e, path))?)
    }

    fn public_url(&self, path: &Path) -> String {
        // Fall back to the raw key rather than failing: URL resolution has no
        // error path, and an invalid key can't have been uploaded anyway.
        match validate_path(path) {
            Ok(validated) => join_url(&self.public_base, &validated),
            Err(_) => join_url(&self.public_base, path),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::error::ErrorKind;

    use super::*;

    const PDF: &[u8] = b"%PDF-1.7\n%\xe2\xe3\xcf\xd3\n";

    fn backend() -> (tempfile::TempDir, LocalBackend) {
        let temp_dir = tempfile::tempdir().unwrap();
        let backend = LocalBackend::new("local", temp_dir.path()).unwrap();
        (temp_dir, backend)
    }

    #[test]
    fn test_new_requires_absolute_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LocalBackend::new("local", temp_dir.path()).is_ok());
        assert!(LocalBackend::new("local", "relative/path").is_err());
    }

    #[test]
    fn test_new_creates_root() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("nested/blobs");
        LocalBackend::new("local", &root).unwrap();
        assert!(root.is_dir());
    }

    #[test]
    fn test_absolute_path_prevents_traversal() {
        let (temp_dir, backend) = backend();
        let expected = temp_dir.path().join("notes.pdf");
        assert_eq!(backend.absolute_path(Path::new("notes.pdf")).unwrap(), expected);
        assert!(backend.absolute_path(Path::new("../etc/passwd")).is_err());
    }

    #[tokio::test]
    async fn test_upload_and_read() {
        let (_temp_dir, backend) = backend();
        backend.upload(Path::new("1_abcdefgh_notes.pdf"), PDF, "application/pdf").await.unwrap();
        assert_eq!(backend.read(Path::new("1_abcdefgh_notes.pdf")).await.unwrap(), PDF);
        assert!(backend.exists(Path::new("1_abcdefgh_notes.pdf")).await.unwrap());
    }

    #[tokio::test]
    async fn test_upload_creates_directories() {
        let (_temp_dir, backend) = backend();
        backend.upload(Path::new("a/b/notes.pdf"), PDF, "application/pdf").await.unwrap();
        assert!(backend.exists(Path::new("a/b/notes.pdf")).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let (_temp_dir, backend) = backend();
        backend.upload(Path::new("notes.pdf"), PDF, "application/pdf").await.unwrap();
        backend.delete(Path::new("notes.pdf")).await.unwrap();
        assert!(!backend.exists(Path::new("notes.pdf")).await.unwrap());
        let err = backend.delete(Path::new("notes.pdf")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn test_list() {
        let (_temp_dir, backend) = backend();
        assert!(backend.list(None).await.unwrap().is_empty());
        backend.upload(Path::new("one.pdf"), PDF, "application/pdf").await.unwrap();
        backend.upload(Path::new("archive/two.pdf"), PDF, "application/pdf").await.unwrap();
        backend.upload(Path::new("archive/three.pdf"), b"%PDF", "application/pdf").await.unwrap();
        let all = backend.list(None).await.unwrap();
        assert_eq!(all.len(), 3);
        let archived = backend.list(Some(Path::new("archive"))).await.unwrap();
        assert_eq!(archived.len(), 2);
        let three = archived.iter().find(|f| f.path == Path::new("archive/three.pdf")).unwrap();
        assert_eq!(three.size, 4);
    }

    #[tokio::test]
    async fn test_list_nonexistent_prefix() {
        let (_temp_dir, backend) = backend();
        assert!(backend.list(Some(Path::new("missing"))).await.unwrap().is_empty());
    }

    #[test]
    fn test_public_url_defaults_to_file_scheme() {
        let (temp_dir, backend) = backend();
        let url = backend.public_url(Path::new("1_abcdefgh_my notes.pdf"));
        assert!(url.starts_with("file://"));
        assert!(url.ends_with("/1_abcdefgh_my%20notes.pdf"));
        let root = temp_dir.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(url.contains(&root));
    }

    #[test]
    fn test_public_url_with_base() {
        let (_temp_dir, backend) = backend();
        let backend = backend.with_public_url("https://files.example.com/pdfs/").unwrap();
        assert_eq!(backend.public_url(Path::new("notes.pdf")), "https://files.example.com/pdfs/notes.pdf");
    }

    #[tokio::test]
    async fn test_path_security() {
        let (_temp_dir, backend) = backend();
        assert!(backend.read(Path::new("../etc/passwd")).await.is_err());
        assert!(backend.upload(Path::new("../escape.pdf"), PDF, "application/pdf").await.is_err());
        assert!(backend.delete(Path::new("../../file")).await.is_err());
    }
}
