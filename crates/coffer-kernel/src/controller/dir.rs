//! Directory lifecycle, subtree cascades and the consistency scan.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use coffer_types::{DirectoryRecord, Record, RecordPatch};

use crate::cursor::Cursor;
use crate::error::{StorageError, StorageResult};
use crate::fs::FileStore;
use crate::integrity::{IntegrityReport, Mismatch};
use crate::meta::MetadataStore;
use crate::paths;

/// Create, move, list and delete directories; reconcile both stores.
#[derive(Clone)]
pub struct DirectoryController {
    fs: Arc<dyn FileStore>,
    meta: Arc<dyn MetadataStore>,
}

impl DirectoryController {
    pub fn new(fs: Arc<dyn FileStore>, meta: Arc<dyn MetadataStore>) -> Self {
        Self { fs, meta }
    }

    /// Make sure `path/filename` exists as a directory in both stores.
    ///
    /// Idempotent: an existing directory and record are left in place.
    #[tracing::instrument(skip(self))]
    pub async fn create_dir(&self, path: &Path, filename: &str) -> StorageResult<PathBuf> {
        let path = paths::normalize_dir(path)?;
        let location = paths::join(&path, filename)?;

        self.fs.make_directory(&location, true).await?;
        self.meta
            .save(&DirectoryRecord::new(path, filename).into(), true)
            .await?;

        tracing::info!(location = %location.display(), "created directory");
        Ok(location)
    }

    /// Move a directory and everything below it.
    ///
    /// Runs in order: ensure the destination, move the subtree on disk, move
    /// the directory's own record, rewrite every descendant's path, then
    /// delete whatever is left at the old location.
    #[tracing::instrument(skip(self))]
    pub async fn rename_dir(
        &self,
        old_path: &Path,
        old_filename: &str,
        new_path: &Path,
        new_filename: &str,
    ) -> StorageResult<PathBuf> {
        let old_path = paths::normalize_dir(old_path)?;
        let new_path = paths::normalize_dir(new_path)?;
        let old_location = paths::join(&old_path, old_filename)?;
        let new_location = paths::join(&new_path, new_filename)?;

        if old_location == new_location {
            return Ok(new_location);
        }
        if paths::is_within(&new_location, &old_location) {
            return Err(StorageError::invalid_path(format!(
                "cannot move {} into itself",
                old_location.display()
            )));
        }
        if !self.fs.is_dir(&old_location).await {
            return Err(StorageError::not_found(&old_location));
        }

        self.create_dir(&new_path, new_filename).await?;
        self.fs.rename(&old_location, &new_location).await?;
        self.meta
            .patch(
                &old_path,
                old_filename,
                &RecordPatch::moved_to(new_path, new_filename),
            )
            .await?;
        let moved = self
            .meta
            .rewrite_path_prefix(&old_location, &new_location)
            .await?;
        self.delete_dir(&old_path, old_filename).await?;

        tracing::info!(
            from = %old_location.display(),
            to = %new_location.display(),
            descendants = moved,
            "renamed directory"
        );
        Ok(new_location)
    }

    /// Remove a directory subtree from disk and every record under it.
    ///
    /// Filesystem errors are logged and ignored; the records go regardless.
    #[tracing::instrument(skip(self))]
    pub async fn delete_dir(&self, path: &Path, filename: &str) -> StorageResult<()> {
        let path = paths::normalize_dir(path)?;
        let location = paths::join(&path, filename)?;

        if let Err(e) = self.fs.remove(&location, true).await {
            tracing::warn!(location = %location.display(), error = %e, "ignoring removal failure");
        }
        let removed = self.meta.delete_by_path_prefix(&location).await?;
        self.meta.delete(&path, filename, None).await?;

        tracing::info!(location = %location.display(), descendants = removed, "deleted directory");
        Ok(())
    }

    /// Locations recorded directly inside `path` that also exist on disk.
    ///
    /// Records whose location is gone are deleted and skipped.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, path: &Path) -> StorageResult<Cursor<PathBuf>> {
        let path = paths::normalize_dir(path)?;
        let mut found = Vec::new();

        for record in self.meta.list_children(&path).await? {
            let location = record.location();
            if self.fs.exists(&location).await {
                found.push(location);
                continue;
            }
            tracing::warn!(location = %location.display(), "stale record, removing it");
            self.meta
                .delete(record.path(), record.filename(), Some(record.kind()))
                .await?;
        }

        Ok(Cursor::new(found))
    }

    /// Compare both stores in full and collect every disagreement.
    ///
    /// First every location on disk is looked up in the index, then every
    /// record is looked up on disk.
    #[tracing::instrument(skip(self))]
    pub async fn scan(&self) -> StorageResult<IntegrityReport> {
        let mut report = IntegrityReport::new();

        for location in self.fs.list_all_under(Path::new("/")).await? {
            let Some((parent, filename)) = paths::split(&location) else {
                continue;
            };
            if !self.meta.exists(&parent, &filename).await? {
                tracing::warn!(location = %location.display(), "on disk but not in the index");
                report.push(Mismatch::NotInDb { location });
            }
        }

        for record in self.meta.list_all().await? {
            let location = record.location();
            if !self.fs.exists(&location).await {
                tracing::warn!(location = %location.display(), "in the index but not on disk");
                report.push(Mismatch::NotInOs {
                    location,
                    kind: record.kind(),
                });
            }
        }

        Ok(report)
    }

    /// Fail with [`StorageError::IntegrityScan`] unless both stores agree.
    pub async fn check_integrity(&self) -> StorageResult<()> {
        let report = self.scan().await?;
        if report.is_clean() {
            Ok(())
        } else {
            Err(StorageError::IntegrityScan(report))
        }
    }

    /// Resolve the mismatches of a scan. Returns how many were fixed.
    ///
    /// Orphan records are deleted. Unindexed directories are adopted with a
    /// fresh record; unindexed files are removed, since without a nonce they
    /// can never be decrypted.
    #[tracing::instrument(skip(self, report), fields(mismatches = report.len()))]
    pub async fn repair(&self, report: &IntegrityReport) -> StorageResult<usize> {
        let mut fixed = 0;

        for mismatch in report.mismatches() {
            let Some((parent, filename)) = paths::split(mismatch.location()) else {
                continue;
            };
            match mismatch {
                Mismatch::NotInOs { location, kind } => {
                    self.meta.delete(&parent, &filename, Some(*kind)).await?;
                    tracing::info!(location = %location.display(), "dropped orphan record");
                }
                Mismatch::NotInDb { location } if self.fs.is_dir(location).await => {
                    let record: Record = DirectoryRecord::new(parent, filename).into();
                    self.meta.save(&record, true).await?;
                    tracing::info!(location = %location.display(), "adopted directory");
                }
                Mismatch::NotInDb { location } => {
                    self.fs.remove(location, true).await?;
                    tracing::info!(location = %location.display(), "removed unindexed file");
                }
            }
            fixed += 1;
        }

        Ok(fixed)
    }
}

impl std::fmt::Debug for DirectoryController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryController").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFileStore;
    use crate::meta::SqliteMetadataStore;
    use coffer_types::{FileKind, FileRecord, NONCE_LEN};
    use tempfile::TempDir;

    struct Fixture {
        dirs: DirectoryController,
        fs: Arc<LocalFileStore>,
        meta: Arc<SqliteMetadataStore>,
        _dir: TempDir,
    }

    fn setup() -> Fixture {
        let dir = TempDir::new().unwrap();
        let fs = Arc::new(LocalFileStore::new(dir.path()).unwrap());
        let meta = Arc::new(SqliteMetadataStore::in_memory().unwrap());
        let dirs = DirectoryController::new(fs.clone(), meta.clone());
        Fixture {
            dirs,
            fs,
            meta,
            _dir: dir,
        }
    }

    /// Put a file into both stores without going through encryption.
    async fn put(f: &Fixture, path: &str, filename: &str) {
        let location = paths::join(Path::new(path), filename).unwrap();
        f.fs.write(&location, b"sealed", false).await.unwrap();
        let kind = FileKind::from_filename(filename).unwrap();
        let record = FileRecord::new(path, filename, kind, vec![1], [3; NONCE_LEN]).unwrap();
        f.meta.save(&record.into(), false).await.unwrap();
    }

    async fn indexed(f: &Fixture) -> Vec<PathBuf> {
        let mut all: Vec<_> = f.meta.list_all().await.unwrap().map(|r| r.location()).collect();
        all.sort();
        all
    }

    #[tokio::test]
    async fn test_create_dir_is_idempotent() {
        let f = setup();
        let root = Path::new("/");
        assert_eq!(f.dirs.create_dir(root, "docs").await.unwrap(), PathBuf::from("/docs"));
        f.dirs.create_dir(root, "docs").await.unwrap();

        assert!(f.fs.is_dir(Path::new("/docs")).await);
        assert_eq!(indexed(&f).await, [PathBuf::from("/docs")]);
    }

    #[tokio::test]
    async fn test_create_dir_needs_parent() {
        let f = setup();
        let err = f.dirs.create_dir(Path::new("/a"), "b").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(indexed(&f).await.is_empty());
    }

    #[tokio::test]
    async fn test_rename_dir_moves_subtree() {
        let f = setup();
        f.dirs.create_dir(Path::new("/"), "docs").await.unwrap();
        f.dirs.create_dir(Path::new("/docs"), "2024").await.unwrap();
        put(&f, "/docs", "a.pdf").await;
        put(&f, "/docs/2024", "b.png").await;

        f.dirs
            .rename_dir(Path::new("/"), "docs", Path::new("/"), "archive")
            .await
            .unwrap();

        assert_eq!(
            indexed(&f).await,
            ["/archive", "/archive/2024", "/archive/2024/b.png", "/archive/a.pdf"]
                .map(PathBuf::from)
        );
        assert!(!f.fs.exists(Path::new("/docs")).await);
        assert_eq!(f.fs.read(Path::new("/archive/2024/b.png")).await.unwrap(), b"sealed");
        f.dirs.check_integrity().await.unwrap();
    }

    #[tokio::test]
    async fn test_rename_dir_guards() {
        let f = setup();
        f.dirs.create_dir(Path::new("/"), "docs").await.unwrap();

        // Onto itself: nothing happens.
        f.dirs
            .rename_dir(Path::new("/"), "docs", Path::new("/"), "docs")
            .await
            .unwrap();
        assert_eq!(indexed(&f).await, [PathBuf::from("/docs")]);

        let err = f
            .dirs
            .rename_dir(Path::new("/"), "docs", Path::new("/docs"), "inner")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::InvalidPath(_)));

        let err = f
            .dirs
            .rename_dir(Path::new("/"), "nope", Path::new("/"), "other")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(!f.fs.exists(Path::new("/other")).await);
    }

    #[tokio::test]
    async fn test_delete_dir_cascades() {
        let f = setup();
        f.dirs.create_dir(Path::new("/"), "docs").await.unwrap();
        f.dirs.create_dir(Path::new("/"), "docs2").await.unwrap();
        f.dirs.create_dir(Path::new("/docs"), "2024").await.unwrap();
        put(&f, "/docs/2024", "a.pdf").await;
        put(&f, "/docs2", "keep.pdf").await;

        f.dirs.delete_dir(Path::new("/"), "docs").await.unwrap();

        assert_eq!(
            indexed(&f).await,
            [PathBuf::from("/docs2"), PathBuf::from("/docs2/keep.pdf")]
        );
        assert!(!f.fs.exists(Path::new("/docs")).await);

        // Nothing left to delete is fine.
        f.dirs.delete_dir(Path::new("/"), "docs").await.unwrap();
    }

    #[tokio::test]
    async fn test_list_heals_stale_records() {
        let f = setup();
        f.dirs.create_dir(Path::new("/"), "docs").await.unwrap();
        put(&f, "/", "a.pdf").await;
        put(&f, "/", "gone.png").await;
        f.fs.remove(Path::new("/gone.png"), false).await.unwrap();

        let listed: Vec<_> = f.dirs.list(Path::new("/")).await.unwrap().collect();

        assert_eq!(listed, [PathBuf::from("/a.pdf"), PathBuf::from("/docs")]);
        assert!(!f.meta.exists(Path::new("/"), "gone.png").await.unwrap());
    }

    #[tokio::test]
    async fn test_scan_reports_both_directions() {
        let f = setup();
        f.dirs.create_dir(Path::new("/"), "docs").await.unwrap();
        put(&f, "/docs", "ok.pdf").await;
        f.dirs.check_integrity().await.unwrap();

        f.fs.write(Path::new("/docs/stray.pdf"), b"x", false).await.unwrap();
        put(&f, "/", "orphan.png").await;
        f.fs.remove(Path::new("/orphan.png"), false).await.unwrap();

        let report = match f.dirs.check_integrity().await.unwrap_err() {
            StorageError::IntegrityScan(report) => report,
            other => panic!("expected a scan failure, got {other}"),
        };
        assert_eq!(
            report.mismatches(),
            [
                Mismatch::NotInDb {
                    location: "/docs/stray.pdf".into()
                },
                Mismatch::NotInOs {
                    location: "/orphan.png".into(),
                    kind: FileKind::Png
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_repair_resolves_scan() {
        let f = setup();
        f.fs.make_directory(Path::new("/unindexed"), false).await.unwrap();
        f.fs.write(Path::new("/unindexed/stray.pdf"), b"x", false).await.unwrap();
        put(&f, "/", "orphan.png").await;
        f.fs.remove(Path::new("/orphan.png"), false).await.unwrap();

        let report = f.dirs.scan().await.unwrap();
        assert_eq!(report.len(), 3);
        assert_eq!(f.dirs.repair(&report).await.unwrap(), 3);

        f.dirs.check_integrity().await.unwrap();
        assert_eq!(indexed(&f).await, [PathBuf::from("/unindexed")]);
        assert!(!f.fs.exists(Path::new("/unindexed/stray.pdf")).await);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_repair_removes_symlink_not_its_target() {
        let f = setup();
        f.dirs.create_dir(Path::new("/"), "docs").await.unwrap();
        put(&f, "/docs", "a.pdf").await;
        let root = f.fs.root();
        std::os::unix::fs::symlink(root.join("docs"), root.join("alias")).unwrap();
        std::os::unix::fs::symlink(root.join("docs"), root.join("docs/loop")).unwrap();

        let report = f.dirs.scan().await.unwrap();
        let mut found: Vec<_> = report.locations().collect();
        found.sort();
        assert_eq!(found, [Path::new("/alias"), Path::new("/docs/loop")]);

        assert_eq!(f.dirs.repair(&report).await.unwrap(), 2);
        f.dirs.check_integrity().await.unwrap();
        assert_eq!(f.fs.read(Path::new("/docs/a.pdf")).await.unwrap(), b"sealed");
        assert_eq!(indexed(&f).await, ["/docs", "/docs/a.pdf"].map(PathBuf::from));
    }
}
