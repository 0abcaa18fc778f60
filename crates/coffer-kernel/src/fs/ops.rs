//! Filesystem store trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::cursor::Cursor;
use crate::error::StorageResult;

/// Byte-level storage addressed by virtual location.
///
/// All locations are absolute virtual paths under the store's root. Missing
/// targets fail with `NotFound`; occupied targets with `AlreadyExists`.
#[async_trait]
pub trait FileStore: Send + Sync {
    // ========================================================================
    // Reading
    // ========================================================================

    /// Read the full contents of a file.
    async fn read(&self, location: &Path) -> StorageResult<Vec<u8>>;

    /// Immediate children of a directory, sorted by name. Not recursive.
    async fn list_children(&self, location: &Path) -> StorageResult<Cursor<PathBuf>>;

    /// Returns true if anything exists at `location`.
    async fn exists(&self, location: &Path) -> bool;

    /// Returns true if `location` is a directory. A symlink never is.
    async fn is_dir(&self, location: &Path) -> bool;

    // ========================================================================
    // Writing
    // ========================================================================

    /// Write `data` to `location`.
    ///
    /// The parent directory must exist. With `replace = false` an existing
    /// target fails `AlreadyExists`. Readers never observe a partial file.
    async fn write(&self, location: &Path, data: &[u8], replace: bool) -> StorageResult<()>;

    /// Move a file or a whole directory subtree.
    ///
    /// Fails `NotFound` if `from` is missing or the parent of `to` is.
    async fn rename(&self, from: &Path, to: &Path) -> StorageResult<()>;

    /// Create one directory. Its parent must exist.
    ///
    /// An existing directory is fine when `exist_ok` is set.
    async fn make_directory(&self, location: &Path, exist_ok: bool) -> StorageResult<()>;

    /// Remove a file, or a directory and everything below it.
    ///
    /// With `silent = true` a missing target is not an error. The storage
    /// root itself can never be removed.
    async fn remove(&self, location: &Path, silent: bool) -> StorageResult<()>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Every location nested under `root`, `root` itself excluded.
    ///
    /// A directory is listed before anything inside it. Only real
    /// directories are descended into.
    async fn list_all_under(&self, root: &Path) -> StorageResult<Cursor<PathBuf>> {
        let mut found = Vec::new();
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            for child in self.list_children(&dir).await? {
                if self.is_dir(&child).await {
                    pending.push(child.clone());
                }
                found.push(child);
            }
        }

        Ok(Cursor::new(found))
    }
}
