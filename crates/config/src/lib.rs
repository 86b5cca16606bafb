//! Configuration loading and validation.
//!
//! Values are layered, later sources overriding earlier ones:
//!
//! 1. Built-in defaults (database and PDFs under the user's data directory).
//! 2. A configuration file: the path given on the command line, or
//!    `config.toml` in the user's config directory if it exists. TOML, YAML
//!    and JSON are recognized by extension.
//! 3. Environment variables prefixed with `REVISIT_`, nested keys separated
//!    by `__` (e.g. `REVISIT_PRIORITY__AGE_EXPONENT=1.5`).
//!
//! ```toml
//! database = "/home/me/.local/share/revisit/materials.db"
//!
//! [storage]
//! type = "local"
//! root = "/home/me/.local/share/revisit/materials"
//!
//! [priority]
//! age_exponent = 1.2
//! ```

pub mod error;
mod storage;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use crate::storage::{Secret, StorageConfig};
pub use revisit_priority::PriorityConfig;

const APP_NAME: &str = "revisit";
const CONFIG_FILE: &str = "config.toml";
const DATABASE_FILE: &str = "materials.db";
const STORAGE_DIR: &str = "materials";
const ENV_PREFIX: &str = "REVISIT_";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database holding the material records.
    pub database: PathBuf,
    pub storage: StorageConfig,
    #[serde(default)]
    pub priority: PriorityConfig,
}

impl Config {
    /// Defaults rooted at `data_dir`.
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        let data_dir = data_dir.as_ref();
        Self {
            database: data_dir.join(DATABASE_FILE),
            storage: StorageConfig::Local {
                root: data_dir.join(STORAGE_DIR),
                public_url: None,
            },
            priority: PriorityConfig::default(),
        }
    }

    /// Load, merge and validate configuration.
    ///
    /// An explicitly given `file` must exist; the default file is optional.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::load_with(file, project_dirs())
    }

    /// Without a home directory, an explicit `file` still works: data
    /// defaults to the directory holding it.
    fn load_with(file: Option<&Path>, dirs: Result<ProjectDirs>) -> Result<Self> {
        let (defaults, file) = match file {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::NotFound(path.to_path_buf()));
                }
                let defaults = match dirs {
                    Ok(dirs) => Self::with_data_dir(dirs.data_dir()),
                    Err(_) => Self::with_data_dir(parent_dir(path)),
                };
                (defaults, path.to_path_buf())
            },
            None => {
                let dirs = dirs?;
                (Self::with_data_dir(dirs.data_dir()), dirs.config_dir().join(CONFIG_FILE))
            },
        };
        Self::from_figment(figment(defaults, &file))
    }

    /// Extract and validate configuration from an already layered figment.
    pub fn from_figment(figment: Figment) -> Result<Self> {
        let mut config: Self = figment.extract().or_raise(|| ErrorKind::Parse)?;
        config.resolve_paths()?;
        config.validate()?;
        tracing::debug!(storage = config.storage.kind(), database = %config.database.display(), "configuration loaded");
        Ok(config)
    }

    /// Check values that deserialize fine but make no sense.
    pub fn validate(&self) -> Result<()> {
        self.priority.validate().or_raise(|| ErrorKind::InvalidValue("priority"))?;
        match &self.storage {
            StorageConfig::Local { public_url: Some(url), .. } if url.trim().is_empty() => {
                exn::bail!(ErrorKind::InvalidValue("storage.public_url"))
            },
            StorageConfig::Local { root, .. } => {
                // Orphan pruning deletes files from the root it doesn't know.
                if self.database.starts_with(root) {
                    exn::bail!(ErrorKind::InvalidValue("database"));
                }
            },
            StorageConfig::S3 { bucket, region, key_id, .. } => {
                if bucket.trim().is_empty() {
                    exn::bail!(ErrorKind::InvalidValue("storage.bucket"));
                }
                if region.trim().is_empty() {
                    exn::bail!(ErrorKind::InvalidValue("storage.region"));
                }
                if key_id.trim().is_empty() {
                    exn::bail!(ErrorKind::InvalidValue("storage.key_id"));
                }
            },
        }
        Ok(())
    }

    /// Render as TOML with credentials masked.
    pub fn to_redacted_toml(&self) -> Result<String> {
        let mut redacted = self.clone();
        if let StorageConfig::S3 { key_secret, .. } = &mut redacted.storage {
            *key_secret = Secret::redacted();
        }
        toml::to_string_pretty(&redacted).or_raise(|| ErrorKind::Serialize)
    }

    /// Relative paths are taken relative to the current directory.
    fn resolve_paths(&mut self) -> Result<()> {
        self.database = std::path::absolute(&self.database).or_raise(|| ErrorKind::InvalidValue("database"))?;
        if let StorageConfig::Local { root, .. } = &mut self.storage {
            *root = std::path::absolute(&*root).or_raise(|| ErrorKind::InvalidValue("storage.root"))?;
        }
        Ok(())
    }
}

fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", APP_NAME).ok_or_raise(|| ErrorKind::NoHomeDirectory)
}

fn parent_dir(path: &Path) -> &Path {
    path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."))
}

/// Layer `defaults`, the file at `path` (skipped if missing) and the
/// environment.
fn figment(defaults: Config, path: &Path) -> Figment {
    let figment = Figment::from(Serialized::defaults(defaults));
    let figment = match path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml" | "yml") => figment.merge(Yaml::file(path)),
        Some("json") => figment.merge(Json::file(path)),
        _ => figment.merge(Toml::file(path)),
    };
    figment.merge(Env::prefixed(ENV_PREFIX).split(ENV_SEPARATOR))
}
