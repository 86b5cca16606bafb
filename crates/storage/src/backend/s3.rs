//! S3-compatible storage backend.
//!
//! Works against AWS S3 and S3-compatible services (Backblaze B2, Tigris,
//! MinIO, Supabase Storage's S3 endpoint, ...). Credentials are provided
//! explicitly via the configuration file.

use crate::{
    FileInfo, StorageBackend,
    backend::{FileInfoStream, join_url, parse_base_url},
    error::{ErrorKind, Result},
    validate_path,
};
use async_stream::stream;
use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::{BehaviorVersion, Credentials, Region, retry::RetryConfig},
    error::DisplayErrorContext,
    primitives::{ByteStream, DateTime},
};
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use url::Url;

/// Generous default for concurrent S3 requests.
const DEFAULT_CONCURRENT_REQUESTS: usize = 100;

/// S3-compatible storage backend.
///
/// Stores blobs in an S3 bucket, optionally under a key prefix. All keys are
/// relative to the configured prefix (if any).
///
/// # Examples
///
/// ```no_run
/// use revisit_storage::backend::S3Backend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = S3Backend::new(
///     "pdfs",
///     "study-material",
///     Some("pdfs/".to_string()),
///     "us-west-004",
///     Some("https://s3.us-west-004.backblazeb2.com".to_string()),
///     "access_key_id",
///     "secret_access_key",
///     None,
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct S3Backend {
    name: String,
    client: Client,
    bucket: String,
    prefix: Option<String>,
    public_base: Url,
    /// Rate limiter for concurrent S3 requests.
    rate_limiter: Arc<Semaphore>,
}

impl S3Backend {
    /// Create a new S3 storage backend.
    ///
    /// # Arguments
    /// * `name` - A name for this backend (used in logging)
    /// * `bucket` - S3 bucket name
    /// * `prefix` - Optional key prefix (acts as virtual directory)
    /// * `region` - AWS region or provider-specific region
    /// * `endpoint` - Custom endpoint URL for S3-compatible services
    /// * `key_id` / `key_secret` - Provider access key pair
    /// * `public_url` - Base URL blobs are publicly served from; defaults to
    ///   path-style `<endpoint>/<bucket>/`
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        bucket: impl Into<String>,
        prefix: Option<String>,
        region: impl Into<String>,
        endpoint: Option<String>,
        key_id: impl Into<String>,
        key_secret: impl Into<String>,
        public_url: Option<String>,
    ) -> Result<Self> {
        let bucket = bucket.into();
        let region = region.into();
        let public_base = match (&public_url, &endpoint) {
            (Some(base), _) => parse_base_url(base)?,
            (None, Some(endpoint)) => parse_base_url(&format!("{}/{}/", endpoint.trim_end_matches('/'), bucket))?,
            (None, None) => parse_base_url(&format!("https://{bucket}.s3.{region}.amazonaws.com/"))?,
        };
        let credentials = Credentials::new(key_id, key_secret, None, None, "revisit-config");
        let mut config_builder = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(region))
            // 1 initial attempt + 3 retries with exponential backoff
            .retry_config(RetryConfig::standard().with_max_attempts(4))
            // Path-style addressing for S3-compatible services.
            .force_path_style(true);
        if let Some(endpoint_url) = endpoint {
            config_builder = config_builder.endpoint_url(endpoint_url);
        }
        Self::with_client(name, Client::from_conf(config_builder.build()), bucket, prefix, public_base)
    }

    /// Wrap an already configured client.
    fn with_client(
        name: impl Into<String>,
        client: Client,
        bucket: String,
        prefix: Option<String>,
        public_base: Url,
    ) -> Result<Self> {
        let prefix = prefix
            .map(validate_path)
            .transpose()?
            .map(|p| p.to_str().map(|s| s.to_string()).ok_or_raise(|| ErrorKind::InvalidPath(p)))
            .transpose()?;
        let rate_limiter = Arc::new(Semaphore::new(DEFAULT_CONCURRENT_REQUESTS));
        Ok(Self {
            name: name.into(),
            client,
            bucket,
            prefix,
            public_base,
            rate_limiter,
        })
    }

    /// Construct the full S3 key from a relative key.
    fn full_key(&self, path: &Path) -> Result<String> {
        let validated = validate_path(path)?;
        let key = validated.to_str().ok_or_raise(|| ErrorKind::InvalidPath(validated.clone()))?;
        Ok(prefixed(self.prefix.as_deref(), key))
    }

    /// Strip the configured prefix from an S3 key to get the relative key.
    fn relative_path(&self, key: &str) -> Result<PathBuf> {
        validate_path(unprefixed(self.prefix.as_deref(), key))
    }

    async fn acquire_permit(&self) -> Result<OwnedSemaphorePermit> {
        self.rate_limiter
            .clone()
            .acquire_owned()
            .await
            .or_raise(|| ErrorKind::BackendError("S3 rate limiter closed".to_string()))
    }

    fn parse_datetime(dt: &DateTime) -> Result<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(dt.as_nanos())
            .or_raise(|| ErrorKind::BackendError("S3 datetime out of range".to_string()))
    }

    fn network<E: std::error::Error>(err: &E) -> ErrorKind {
        ErrorKind::Network(DisplayErrorContext(err).to_string())
    }
}

fn prefixed(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(prefix) => format!("{}/{}", prefix.trim_end_matches('/'), key),
        None => key.to_string(),
    }
}

fn unprefixed<'a>(prefix: Option<&str>, key: &'a str) -> &'a str {
    match prefix {
        Some(prefix) => {
            let prefix = prefix.trim_end_matches('/');
            key.strip_prefix(prefix).and_then(|s| s.strip_prefix('/')).unwrap_or(key)
        },
        None => key,
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: Option<&'a Path>) -> FileInfoStream<'a> {
        let list_prefix = match prefix.map(|p| self.full_key(p)).transpose() {
            Ok(Some(key)) => Some(key),
            Ok(None) => self.prefix.as_ref().map(|p| format!("{}/", p.trim_end_matches('/'))),
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };
        Box::pin(stream! {
            let mut continuation: Option<String> = None;
            loop {
                let _permit = match self.acquire_permit().await {
                    Ok(permit) => permit,
                    Err(e) => { yield Err(e); return; },
                };
                let response = self
                    .client
                    .list_objects_v2()
                    .bucket(&self.bucket)
                    .set_prefix(list_prefix.clone())
                    .set_continuation_token(continuation.take())
                    .send()
                    .await;
                let output = match response {
                    Ok(output) => output,
                    Err(e) => { yield Err(exn::Exn::from(Self::network(&e))); return; },
                };
                for object in output.contents() {
                    let Some(key) = object.key() else { continue };
                    let path = match self.relative_path(key) {
                        Ok(path) => path,
                        Err(e) => { yield Err(e); continue; },
                    };
                    let modified = match object.last_modified().map(Self::parse_datetime).transpose() {
                        Ok(modified) => modified.unwrap_or(OffsetDateTime::UNIX_EPOCH),
                        Err(e) => { yield Err(e); continue; },
                    };
                    let size = u64::try_from(object.size().unwrap_or(0)).unwrap_or(0);
                    yield Ok(FileInfo::new(path, size, modified));
                }
                match output.next_continuation_token() {
                    Some(token) if output.is_truncated().unwrap_or(false) => continuation = Some(token.to_string()),
                    _ => break,
                }
            }
        })
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        match self.client.head_object().bucket(&self.bucket).key(&key).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => exn::bail!(Self::network(&e)),
        }
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        let output = match self.client.get_object().bucket(&self.bucket).key(&key).send().await {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                exn::bail!(ErrorKind::NotFound(path.to_path_buf()))
            },
            Err(e) => exn::bail!(Self::network(&e)),
        };
        let body = output.body.collect().await.map_err(|e| Self::network(&e))?;
        Ok(body.into_bytes().to_vec())
    }

    async fn upload(&self, path: &Path, data: &[u8], content_type: &str) -> Result<()> {
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| Self::network(&e))?;
        tracing::debug!(backend = %self.name, key = %key, bytes = data.len(), content_type, "Stored blob");
        Ok(())
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        // S3 happily "deletes" keys that don't exist; check first so that
        // every backend reports missing blobs the same way.
        if !self.exists(path).await? {
            exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
        }
        let key = self.full_key(path)?;
        let _permit = self.acquire_permit().await?;
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| Self::network(&e))?;
        Ok(())
    }

    fn public_url(&self, path: &Path) -> String {
        let key = match self.full_key(path) {
            Ok(key) => key,
            Err(_) => prefixed(self.prefix.as_deref(), &path.to_string_lossy()),
        };
        join_url(&self.public_base, Path::new(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_s3::operation::delete_object::DeleteObjectOutput;
    use aws_sdk_s3::operation::get_object::{GetObjectError, GetObjectOutput};
    use aws_sdk_s3::operation::head_object::HeadObjectError;
    use aws_sdk_s3::operation::list_objects_v2::ListObjectsV2Output;
    use aws_sdk_s3::types::Object;
    use aws_sdk_s3::types::error::{NoSuchKey, NotFound};
    use aws_smithy_mocks::{RuleMode, mock, mock_client};
    use futures::TryStreamExt;

    fn mocked(client: Client, prefix: Option<&str>) -> S3Backend {
        let public_base = parse_base_url("https://s3.example.com/study/").unwrap();
        S3Backend::with_client("pdfs", client, "study".to_string(), prefix.map(str::to_string), public_base).unwrap()
    }

    fn object(key: &str, size: i64) -> Object {
        Object::builder().key(key).size(size).last_modified(DateTime::from_secs(1_767_225_600)).build()
    }

    #[test]
    fn test_prefixed() {
        assert_eq!(prefixed(None, "notes.pdf"), "notes.pdf");
        assert_eq!(prefixed(Some("pdfs"), "notes.pdf"), "pdfs/notes.pdf");
        assert_eq!(prefixed(Some("pdfs/"), "notes.pdf"), "pdfs/notes.pdf");
    }

    #[test]
    fn test_unprefixed() {
        assert_eq!(unprefixed(None, "notes.pdf"), "notes.pdf");
        assert_eq!(unprefixed(Some("pdfs"), "pdfs/notes.pdf"), "notes.pdf");
        assert_eq!(unprefixed(Some("pdfs/"), "pdfs/notes.pdf"), "notes.pdf");
        assert_eq!(unprefixed(Some("pdfs"), "other/notes.pdf"), "other/notes.pdf");
    }

    #[test]
    fn test_public_url() {
        let backend = S3Backend::new(
            "pdfs",
            "study",
            Some("pdfs".to_string()),
            "auto",
            Some("https://s3.example.com/".to_string()),
            "id",
            "secret",
            None,
        )
        .unwrap();
        assert_eq!(backend.public_url(Path::new("my notes.pdf")), "https://s3.example.com/study/pdfs/my%20notes.pdf");
    }

    #[test]
    fn test_public_url_override() {
        let backend = S3Backend::new(
            "pdfs",
            "study",
            None,
            "auto",
            None::<String>,
            "id",
            "secret",
            Some("https://cdn.example.com/storage/v1/object/public/pdfs/".to_string()),
        )
        .unwrap();
        assert_eq!(
            backend.public_url(Path::new("notes.pdf")),
            "https://cdn.example.com/storage/v1/object/public/pdfs/notes.pdf"
        );
    }

    #[tokio::test]
    async fn test_delete_missing_key() {
        let head = mock!(Client::head_object)
            .match_requests(|req| req.bucket() == Some("study") && req.key() == Some("pdfs/gone.pdf"))
            .then_error(|| HeadObjectError::NotFound(NotFound::builder().build()));
        let delete = mock!(Client::delete_object).then_output(|| DeleteObjectOutput::builder().build());
        let backend = mocked(mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&head, &delete]), Some("pdfs"));

        let err = backend.delete(Path::new("gone.pdf")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(p) if p == Path::new("gone.pdf")));
        assert_eq!(head.num_calls(), 1);
        assert_eq!(delete.num_calls(), 0);
    }

    #[tokio::test]
    async fn test_read() {
        let found = mock!(Client::get_object)
            .match_requests(|req| req.key() == Some("notes.pdf"))
            .then_output(|| GetObjectOutput::builder().body(ByteStream::from_static(b"%PDF-1.7")).build());
        let missing = mock!(Client::get_object)
            .match_requests(|req| req.key() == Some("gone.pdf"))
            .then_error(|| GetObjectError::NoSuchKey(NoSuchKey::builder().build()));
        let backend = mocked(mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&found, &missing]), None);

        assert_eq!(backend.read(Path::new("notes.pdf")).await.unwrap(), b"%PDF-1.7");
        let err = backend.read(Path::new("gone.pdf")).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(p) if p == Path::new("gone.pdf")));
    }

    #[tokio::test]
    async fn test_list_follows_continuation_tokens() {
        let first = mock!(Client::list_objects_v2)
            .match_requests(|req| req.prefix() == Some("pdfs/") && req.continuation_token().is_none())
            .then_output(|| {
                ListObjectsV2Output::builder()
                    .contents(object("pdfs/1767225600000_a1b2c3d4_one.pdf", 3))
                    .is_truncated(true)
                    .next_continuation_token("page-2")
                    .build()
            });
        let second = mock!(Client::list_objects_v2)
            .match_requests(|req| req.continuation_token() == Some("page-2"))
            .then_output(|| {
                ListObjectsV2Output::builder()
                    .contents(object("pdfs/1767225600000_e5f6a7b8_two.pdf", 5))
                    .is_truncated(false)
                    .build()
            });
        let backend = mocked(mock_client!(aws_sdk_s3, RuleMode::MatchAny, [&first, &second]), Some("pdfs/"));

        let files: Vec<FileInfo> = backend.list_stream(None).try_collect().await.unwrap();
        let paths: Vec<_> = files.iter().map(|f| f.path.as_path()).collect();
        assert_eq!(
            paths,
            [Path::new("1767225600000_a1b2c3d4_one.pdf"), Path::new("1767225600000_e5f6a7b8_two.pdf")]
        );
        assert_eq!(files[1].size, 5);
        assert_eq!(files[0].modified, OffsetDateTime::from_unix_timestamp(1_767_225_600).unwrap());
        assert_eq!((first.num_calls(), second.num_calls()), (1, 1));
    }
}
