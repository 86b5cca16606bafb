//! Wire configured stores into a [`Library`].

use miette::{IntoDiagnostic, Result, WrapErr};
use revisit_config::{Config, StorageConfig};
use revisit_library::Library;
use revisit_records::{Database, Repository};
use revisit_storage::BackendHandle;
use revisit_storage::backend::LocalBackend;
use std::sync::Arc;

use crate::report;

/// Name the blob store is logged under.
const BACKEND_NAME: &str = "materials";

pub async fn open(config: &Config) -> Result<(Library, Database)> {
    let blobs = backend(&config.storage)?;
    if let Some(parent) = config.database.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .into_diagnostic()
            .wrap_err_with(|| format!("could not create {}", parent.display()))?;
    }
    let db = Database::connect(&config.database)
        .await
        .map_err(report)
        .wrap_err_with(|| format!("could not open database {}", config.database.display()))?;
    let records = Arc::new(Repository::from(&db));
    tracing::debug!(backend = blobs.name(), database = %config.database.display(), "stores opened");
    Ok((Library::new(blobs, records, config.priority), db))
}

fn backend(storage: &StorageConfig) -> Result<BackendHandle> {
    match storage {
        StorageConfig::Local { root, public_url } => {
            let mut local = LocalBackend::new(BACKEND_NAME, root)
                .map_err(report)
                .wrap_err_with(|| format!("could not use {} for storage", root.display()))?;
            if let Some(url) = public_url {
                local = local.with_public_url(url).map_err(report).wrap_err("invalid storage.public_url")?;
            }
            Ok(Arc::new(local))
        },
        #[cfg(feature = "s3")]
        StorageConfig::S3 { bucket, prefix, region, endpoint, key_id, key_secret, public_url } => {
            let s3 = revisit_storage::backend::S3Backend::new(
                BACKEND_NAME,
                bucket,
                prefix.clone(),
                region,
                endpoint.clone(),
                key_id,
                key_secret.expose(),
                public_url.clone(),
            )
            .map_err(report)
            .wrap_err("could not configure S3 storage")?;
            Ok(Arc::new(s3))
        },
        #[cfg(not(feature = "s3"))]
        StorageConfig::S3 { .. } => {
            miette::bail!("S3 storage is configured but this build does not include S3 support (feature \"s3\")")
        },
    }
}
