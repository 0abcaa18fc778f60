//! Process-scoped store handle.

use std::sync::Arc;

use crate::cipher::StreamCipher;
use crate::config::CofferConfig;
use crate::controller::{DirectoryController, FileController};
use crate::error::{StorageError, StorageResult};
use crate::fs::{FileStore, LocalFileStore};
use crate::meta::{MetadataStore, SqliteMetadataStore};
use crate::thumbnail::ImageThumbnailer;

/// Everything one process needs to serve files: both stores, the cipher and
/// the controllers built over them.
///
/// Construct it once at startup and pass it by reference. Call
/// [`Coffer::close`] on shutdown to release the metadata connection.
pub struct Coffer {
    meta: Arc<dyn MetadataStore>,
    files: FileController,
    dirs: DirectoryController,
}

impl Coffer {
    /// Open the stores described by a validated configuration.
    pub fn open(config: &CofferConfig) -> StorageResult<Self> {
        let root = config.storage_root();
        if config.storage.create_root {
            std::fs::create_dir_all(&root).map_err(|e| StorageError::from_io(e, &root))?;
        }
        let fs = LocalFileStore::new(&root)?;

        let meta = match config.database_path()? {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| StorageError::from_io(e, parent))?;
                }
                SqliteMetadataStore::open(&path)?
            }
            None => SqliteMetadataStore::in_memory()?,
        };

        tracing::info!(root = %fs.root().display(), "opened coffer");
        Ok(Self::new(Arc::new(fs), Arc::new(meta), config.cipher()?))
    }

    /// Assemble from existing stores, with the default thumbnailer.
    pub fn new(fs: Arc<dyn FileStore>, meta: Arc<dyn MetadataStore>, cipher: StreamCipher) -> Self {
        let files = FileController::new(
            fs.clone(),
            meta.clone(),
            Arc::new(cipher),
            Arc::new(ImageThumbnailer),
        );
        let dirs = DirectoryController::new(fs, meta.clone());
        Self { meta, files, dirs }
    }

    pub fn files(&self) -> &FileController {
        &self.files
    }

    pub fn dirs(&self) -> &DirectoryController {
        &self.dirs
    }

    /// Release the metadata connection.
    pub async fn close(self) -> StorageResult<()> {
        self.meta.close().await?;
        tracing::debug!("closed coffer");
        Ok(())
    }
}
