use crate::error::{ErrorKind, Result};
use crate::key::{basename, storage_key};
use exn::{OptionExt, ResultExt};
use revisit_priority::models::{Material, MaterialId, NewMaterial, Score};
use revisit_priority::{PriorityConfig, Ranked, rank_all};
use revisit_records::RecordHandle;
use revisit_storage::error::ErrorKind as StorageErrorKind;
use revisit_storage::{BackendHandle, PDF_CONTENT_TYPE};
use std::path::Path;
use time::UtcDateTime;
use tracing::instrument;

/// A file handed in for upload.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Original file name; only its last path component is kept.
    pub filename: String,
    /// MIME type as reported by the client.
    pub content_type: String,
    pub data: Vec<u8>,
}
impl Upload {
    pub fn pdf(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            content_type: PDF_CONTENT_TYPE.to_string(),
            data: data.into(),
        }
    }
}

/// Study materials spread over a blob store (the PDF bytes) and a record
/// store (everything else).
///
/// Every action is a short sequence of store calls; nothing is cached
/// between calls, so callers should [`load()`](Self::load) again after any
/// change.
#[derive(Clone)]
pub struct Library {
    blobs: BackendHandle,
    records: RecordHandle,
    priority: PriorityConfig,
}

impl Library {
    pub fn new(blobs: BackendHandle, records: RecordHandle, priority: PriorityConfig) -> Self {
        Self { blobs, records, priority }
    }

    pub(crate) fn blobs(&self) -> &BackendHandle {
        &self.blobs
    }

    pub(crate) fn records(&self) -> &RecordHandle {
        &self.records
    }

    /// All materials, most urgent first.
    #[instrument(level = "debug", skip(self))]
    pub async fn load(&self, now: UtcDateTime) -> Result<Vec<Ranked>> {
        let materials = self.records.list_all().await.or_raise(|| ErrorKind::Records)?;
        Ok(rank_all(materials, now, &self.priority))
    }

    /// A single material.
    pub async fn get(&self, id: &MaterialId) -> Result<Material> {
        self.records
            .get(id)
            .await
            .or_raise(|| ErrorKind::Records)?
            .ok_or_raise(|| ErrorKind::NotFound(id.clone()))
    }

    /// Store a new PDF and record it.
    ///
    /// The upload is validated before either store is touched. If recording
    /// fails after the bytes were stored, the blob is deleted again; should
    /// that also fail the blob is left orphaned (see
    /// [`orphaned_blobs()`](Self::orphaned_blobs)) and the original error is
    /// returned.
    #[instrument(skip_all, fields(filename = %upload.filename, size = upload.data.len()))]
    pub async fn upload(&self, upload: Upload) -> Result<Material> {
        if !is_pdf(&upload.content_type) {
            exn::bail!(ErrorKind::UnsupportedContentType(upload.content_type));
        }
        let filename = basename(&upload.filename)?.to_string();
        let now = UtcDateTime::now();
        let key = storage_key(&filename, now)?;
        let path = revisit_storage::validate_path(&key).or_raise(|| ErrorKind::InvalidFilename(filename.clone()))?;

        self.blobs.upload(&path, &upload.data, PDF_CONTENT_TYPE).await.or_raise(|| ErrorKind::Storage)?;

        let new = NewMaterial {
            filename,
            storage_path: key,
            date_added: now,
        };
        match self.records.insert(new).await {
            Ok(material) => {
                tracing::info!(id = %material.id, key = %material.storage_path, "material uploaded");
                Ok(material)
            },
            Err(err) => {
                if let Err(cleanup) = self.blobs.delete(&path).await {
                    tracing::warn!(
                        key = %path.display(),
                        error = %cleanup,
                        "could not remove uploaded file after failing to record it, file is now orphaned"
                    );
                }
                Err(err).or_raise(|| ErrorKind::Records)
            },
        }
    }

    /// Record a revision of material `id` with the given recall score.
    ///
    /// Fails if the material was rated by someone else in the meantime.
    #[instrument(skip(self), fields(id = %id, score = score.value()))]
    pub async fn rate(&self, id: &MaterialId, score: Score) -> Result<Material> {
        let mut material = self.get(id).await?;
        let expected = material.revision_count;
        material.revise(UtcDateTime::now(), score);
        let material = self.records.update(&material, expected).await.or_raise(|| ErrorKind::Records)?;
        tracing::info!(revisions = material.revision_count, "material rated");
        Ok(material)
    }

    /// Delete material `id`: first its file, then its record.
    ///
    /// A file that is already gone does not stop the record from being
    /// deleted. If deleting the record fails after the file was removed, the
    /// record is left pointing at nothing.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn delete(&self, id: &MaterialId) -> Result<()> {
        let material = self.get(id).await?;
        let path = Path::new(&material.storage_path);
        match self.blobs.delete(path).await {
            Ok(()) => {},
            Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => {
                tracing::warn!(key = %material.storage_path, "file was already missing from storage");
            },
            Err(err) => return Err(err).or_raise(|| ErrorKind::Storage),
        }
        self.records.delete(id).await.or_raise(|| ErrorKind::Records)?;
        tracing::info!(filename = %material.filename, "material deleted");
        Ok(())
    }

    /// Where the material's PDF can be downloaded from.
    pub fn public_url(&self, material: &Material) -> String {
        self.blobs.public_url(Path::new(&material.storage_path))
    }
}

/// Compare the MIME essence, ignoring parameters and case.
fn is_pdf(content_type: &str) -> bool {
    content_type.split(';').next().is_some_and(|essence| essence.trim().eq_ignore_ascii_case(PDF_CONTENT_TYPE))
}
