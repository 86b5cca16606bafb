//! Blobs that no record refers to.
//!
//! Upload and delete both touch two stores without a transaction, so a
//! failure at the wrong moment can leave a file behind with no record
//! pointing at it. These are harmless but take up space.
//!
//! Only files named like an upload's storage key are candidates. The blob
//! store may share its directory with other files (the database, say), and
//! those are never touched.

use crate::Library;
use crate::error::{ErrorKind, Result};
use crate::key::is_storage_key;
use async_stream::stream;
use exn::ResultExt;
use futures::{Stream, StreamExt, TryStreamExt};
use revisit_storage::FileInfo;
use std::collections::HashSet;
use std::path::PathBuf;
use time::{Duration, OffsetDateTime};
use tracing::instrument;

impl Library {
    /// Stream every upload-shaped blob whose key is not the storage path of
    /// any material.
    ///
    /// A failure to read the records ends the stream; listing failures are
    /// yielded and listing continues.
    pub fn orphaned_blobs(&self) -> impl Stream<Item = Result<FileInfo>> + '_ {
        stream!({
            let known: HashSet<PathBuf> = match self.records().list_all().await.or_raise(|| ErrorKind::Records) {
                Ok(materials) => materials.into_iter().map(|m| PathBuf::from(m.storage_path)).collect(),
                Err(e) => {
                    yield Err(e);
                    return;
                },
            };
            let mut files = self.blobs().list_stream(None);
            while let Some(file) = files.next().await {
                match file.or_raise(|| ErrorKind::Storage) {
                    Ok(info) if known.contains(&info.path) => {},
                    Ok(info) if !info.path.to_str().is_some_and(is_storage_key) => {
                        tracing::trace!(key = %info.path.display(), "ignoring file not created by an upload");
                    },
                    other => yield other,
                }
            }
        })
    }

    /// Delete orphaned blobs last modified more than `min_age` ago.
    ///
    /// The age limit keeps a prune from racing an upload whose record has
    /// not been written yet. Every orphan is attempted; if any could not be
    /// deleted the whole prune fails with [`Cleanup`](ErrorKind::Cleanup)
    /// after the rest were removed.
    #[instrument(skip(self))]
    pub async fn prune_orphans(&self, min_age: Duration) -> Result<Vec<FileInfo>> {
        let cutoff = OffsetDateTime::now_utc() - min_age;
        let orphans: Vec<FileInfo> =
            self.orphaned_blobs().try_collect().await.or_raise(|| ErrorKind::Cleanup)?;
        let mut pruned = Vec::new();
        let mut failures = 0usize;
        for orphan in orphans.into_iter().filter(|o| o.modified <= cutoff) {
            match self.blobs().delete(&orphan.path).await {
                Ok(()) => {
                    tracing::info!(key = %orphan.path.display(), size = orphan.size, "orphaned file deleted");
                    pruned.push(orphan);
                },
                Err(e) => {
                    tracing::warn!(key = %orphan.path.display(), error = %e, "could not delete orphaned file");
                    failures += 1;
                },
            }
        }
        if failures > 0 {
            exn::bail!(ErrorKind::Cleanup);
        }
        Ok(pruned)
    }
}
