//! Metadata store trait.

use std::path::Path;

use async_trait::async_trait;
use coffer_types::{FileKind, Record, RecordPatch};

use crate::cursor::Cursor;
use crate::error::StorageResult;

/// Persistence for directory and file records.
///
/// Paths passed in are normalized virtual directories (see
/// [`crate::paths::normalize_dir`]).
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Point lookup.
    async fn get(&self, path: &Path, filename: &str) -> StorageResult<Option<Record>>;

    /// Store a record.
    ///
    /// An occupied `(path, filename)` fails `AlreadyExists` unless `replace`
    /// is set, in which case kind, icon and nonce are overwritten in place
    /// and `created_at` is kept.
    async fn save(&self, record: &Record, replace: bool) -> StorageResult<()>;

    /// Move a record. A no-op when nothing matches.
    ///
    /// A record already at the destination is superseded.
    async fn patch(&self, path: &Path, filename: &str, patch: &RecordPatch) -> StorageResult<()>;

    /// Delete one record; with `kind` set, only if the stored kind matches.
    async fn delete(&self, path: &Path, filename: &str, kind: Option<FileKind>)
    -> StorageResult<()>;

    /// Delete every record whose path is `prefix` or lies below it.
    ///
    /// Returns the number of records removed.
    async fn delete_by_path_prefix(&self, prefix: &Path) -> StorageResult<usize>;

    /// Replace the leading `old_prefix` of every matching record's path with
    /// `new_prefix`, keeping the remainder.
    ///
    /// Returns the number of records moved.
    async fn rewrite_path_prefix(&self, old_prefix: &Path, new_prefix: &Path)
    -> StorageResult<usize>;

    /// Records directly inside `path`: files first, then directories, each
    /// group ordered by filename.
    async fn list_children(&self, path: &Path) -> StorageResult<Cursor<Record>>;

    /// Every record, files first, then directories.
    async fn list_all(&self) -> StorageResult<Cursor<Record>>;

    /// Release the underlying connection. Later calls fail `Closed`.
    async fn close(&self) -> StorageResult<()>;

    /// Returns true if a record exists at `(path, filename)`.
    async fn exists(&self, path: &Path, filename: &str) -> StorageResult<bool> {
        Ok(self.get(path, filename).await?.is_some())
    }
}
