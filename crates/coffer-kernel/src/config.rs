//! Process configuration.
//!
//! Loaded once at startup from `~/.config/coffer/config.ron` (or an explicit
//! path), then overlaid with environment variables:
//!
//! | Variable              | Overrides                     |
//! |-----------------------|-------------------------------|
//! | `COFFER_STORAGE_ROOT` | `storage.root`                |
//! | `COFFER_DB_PATH`      | `database.path`               |
//! | `COFFER_AES_KEY`      | `encryption.key_hex`          |
//!
//! The key variable name can be changed with `encryption.key_env`.
//!
//! ```ron
//! (
//!     storage: (root: "~/vault"),
//!     database: (path: "~/.local/share/coffer/metadata.db"),
//!     logging: (filter: "coffer_kernel=debug,info"),
//! )
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::cipher::StreamCipher;
use crate::error::{StorageError, StorageResult};

pub const ENV_STORAGE_ROOT: &str = "COFFER_STORAGE_ROOT";
pub const ENV_DB_PATH: &str = "COFFER_DB_PATH";
pub const DEFAULT_KEY_ENV: &str = "COFFER_AES_KEY";

/// Complete configuration, one section per concern.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CofferConfig {
    pub storage: StorageConfig,
    pub database: DatabaseConfig,
    pub encryption: EncryptionConfig,
    pub logging: LoggingConfig,
}

/// Where encrypted blobs live.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Host directory mapped to the virtual `/`. Required.
    pub root: PathBuf,
    /// Create the root directory if it is missing.
    pub create_root: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::new(),
            create_root: true,
        }
    }
}

/// Where the metadata index lives.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// SQLite file. Empty means `~/.local/share/coffer/metadata.db`.
    pub path: PathBuf,
    /// Keep the index in memory only.
    pub in_memory: bool,
}

/// The encryption key, given inline or through an environment variable.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct EncryptionConfig {
    /// 64 hex characters.
    pub key_hex: String,
    /// Environment variable holding the hex key.
    pub key_env: String,
}

impl Default for EncryptionConfig {
    fn default() -> Self {
        Self {
            key_hex: String::new(),
            key_env: DEFAULT_KEY_ENV.to_string(),
        }
    }
}

impl fmt::Debug for EncryptionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let key = if self.key_hex.is_empty() { "<unset>" } else { "<redacted>" };
        f.debug_struct("EncryptionConfig")
            .field("key_hex", &key)
            .field("key_env", &self.key_env)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

impl CofferConfig {
    /// Default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("coffer").join("config.ron"))
    }

    /// Build the configuration: file, then environment, then validation.
    ///
    /// An explicit `path` must exist. Without one, the default location is
    /// read if present and defaults are used otherwise.
    pub fn load(path: Option<&Path>) -> StorageResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file.
    pub fn from_file(path: &Path) -> StorageResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            StorageError::config(format!("cannot read {}: {e}", path.display()))
        })?;
        ron::from_str(&content)
            .map_err(|e| StorageError::config(format!("{}: {e}", path.display())))
    }

    /// Parse RON text. Missing sections and fields take their defaults.
    pub fn from_ron_str(content: &str) -> StorageResult<Self> {
        ron::from_str(content).map_err(|e| StorageError::config(format!("RON syntax error: {e}")))
    }

    /// Overlay environment variables, read through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup(ENV_STORAGE_ROOT).filter(|v| !v.is_empty()) {
            self.storage.root = PathBuf::from(root);
        }
        if let Some(db) = lookup(ENV_DB_PATH).filter(|v| !v.is_empty()) {
            self.database.path = PathBuf::from(db);
        }
        if let Some(key) = lookup(&self.encryption.key_env).filter(|v| !v.is_empty()) {
            self.encryption.key_hex = key;
        }
    }

    /// Check that everything needed to open a store is present and sane.
    pub fn validate(&self) -> StorageResult<()> {
        if self.storage.root.as_os_str().is_empty() {
            return Err(StorageError::config(format!(
                "storage.root is not set (or set {ENV_STORAGE_ROOT})"
            )));
        }
        self.cipher()?;
        Ok(())
    }

    /// Storage root with `~` expanded.
    pub fn storage_root(&self) -> PathBuf {
        expand(&self.storage.root)
    }

    /// SQLite file to open, or `None` for an in-memory index.
    pub fn database_path(&self) -> StorageResult<Option<PathBuf>> {
        if self.database.in_memory {
            return Ok(None);
        }
        if !self.database.path.as_os_str().is_empty() {
            return Ok(Some(expand(&self.database.path)));
        }
        dirs::data_dir()
            .map(|p| Some(p.join("coffer").join("metadata.db")))
            .ok_or_else(|| StorageError::config("no data directory; set database.path"))
    }

    /// Cipher bound to the configured key.
    pub fn cipher(&self) -> StorageResult<StreamCipher> {
        if self.encryption.key_hex.is_empty() {
            return Err(StorageError::config(format!(
                "no encryption key (set encryption.key_hex or {})",
                self.encryption.key_env
            )));
        }
        StreamCipher::from_hex(&self.encryption.key_hex)
    }
}

fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(&raw).into_owned())
}
