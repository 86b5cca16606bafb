use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::PathBuf;

/// Where uploaded PDFs are kept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// A directory on the local filesystem.
    Local {
        root: PathBuf,
        /// Base URL the directory is served from. Defaults to `file://<root>/`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        public_url: Option<String>,
    },
    /// An S3-compatible bucket.
    S3 {
        bucket: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix: Option<String>,
        region: String,
        /// Custom endpoint for S3-compatible services (MinIO, R2, ...).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        endpoint: Option<String>,
        key_id: String,
        key_secret: Secret,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        public_url: Option<String>,
    },
}
impl StorageConfig {
    /// Short name for log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::S3 { .. } => "s3",
        }
    }
}

/// A credential that is never printed.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);
impl Secret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub(crate) fn redacted() -> Self {
        Self("********".to_string())
    }
}
impl Debug for Secret {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("Secret(********)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = Secret::new("hunter2");
        assert_eq!(format!("{secret:?}"), "Secret(********)");
        assert_eq!(secret.expose(), "hunter2");
    }
}
