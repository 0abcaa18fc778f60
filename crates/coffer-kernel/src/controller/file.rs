//! Single-file lifecycle.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use coffer_types::{FileKind, FileRecord, Record, RecordPatch};

use crate::cipher::StreamCipher;
use crate::error::{StorageError, StorageResult};
use crate::fs::FileStore;
use crate::meta::MetadataStore;
use crate::paths;
use crate::thumbnail::ThumbnailService;

/// Create, move, read and delete encrypted files.
#[derive(Clone)]
pub struct FileController {
    fs: Arc<dyn FileStore>,
    meta: Arc<dyn MetadataStore>,
    cipher: Arc<StreamCipher>,
    thumbnails: Arc<dyn ThumbnailService>,
}

impl FileController {
    pub fn new(
        fs: Arc<dyn FileStore>,
        meta: Arc<dyn MetadataStore>,
        cipher: Arc<StreamCipher>,
        thumbnails: Arc<dyn ThumbnailService>,
    ) -> Self {
        Self {
            fs,
            meta,
            cipher,
            thumbnails,
        }
    }

    /// Encrypt `data` and store it at `path/filename`.
    ///
    /// The record is saved before the bytes are written. If the record is
    /// already taken, stray file bytes at the target are removed before
    /// `AlreadyExists` is returned. A directory there is left alone, and a
    /// directory record is never replaced by a file.
    #[tracing::instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn create_file(
        &self,
        path: &Path,
        filename: &str,
        data: &[u8],
        replace: bool,
    ) -> StorageResult<PathBuf> {
        let path = paths::normalize_dir(path)?;
        let location = paths::join(&path, filename)?;

        let kind = FileKind::from_filename(filename)?;
        let icon = self.thumbnails.thumbnail(kind, Some(data))?;
        let sealed = self.cipher.encrypt(data);
        let record = FileRecord::new(path.clone(), filename, kind, icon, sealed.nonce)?;

        if let Err(e) = self.meta.save(&Record::File(record), replace).await {
            if e.is_already_exists() && !self.fs.is_dir(&location).await {
                self.fs.remove(&location, true).await?;
            }
            return Err(e);
        }

        self.fs.write(&location, &sealed.ciphertext, true).await?;
        tracing::info!(location = %location.display(), %kind, "stored file");
        Ok(location)
    }

    /// Move a file, bytes first, then its record.
    #[tracing::instrument(skip(self))]
    pub async fn rename_file(
        &self,
        old_path: &Path,
        old_filename: &str,
        new_path: &Path,
        new_filename: &str,
    ) -> StorageResult<PathBuf> {
        let old_path = paths::normalize_dir(old_path)?;
        let new_path = paths::normalize_dir(new_path)?;
        let new_location = paths::join(&new_path, new_filename)?;
        let (_, old_location) = self.require_existing(&old_path, old_filename).await?;

        self.fs.rename(&old_location, &new_location).await?;
        self.meta
            .patch(
                &old_path,
                old_filename,
                &RecordPatch::moved_to(new_path, new_filename),
            )
            .await?;

        tracing::info!(
            from = %old_location.display(),
            to = %new_location.display(),
            "renamed file"
        );
        Ok(new_location)
    }

    /// Read and decrypt a stored file.
    #[tracing::instrument(skip(self))]
    pub async fn get_file(&self, path: &Path, filename: &str) -> StorageResult<Vec<u8>> {
        let path = paths::normalize_dir(path)?;
        let (record, location) = self.require_existing(&path, filename).await?;

        let sealed = self.fs.read(&location).await?;
        self.cipher.decrypt(&sealed, &record.nonce)
    }

    /// Record of a stored file, including its thumbnail.
    #[tracing::instrument(skip(self))]
    pub async fn file_info(&self, path: &Path, filename: &str) -> StorageResult<FileRecord> {
        let path = paths::normalize_dir(path)?;
        let (record, _) = self.require_existing(&path, filename).await?;
        Ok(record)
    }

    /// Remove a file's bytes (if any) and then its record.
    #[tracing::instrument(skip(self))]
    pub async fn delete_file(&self, path: &Path, filename: &str) -> StorageResult<()> {
        let path = paths::normalize_dir(path)?;
        let location = paths::join(&path, filename)?;

        self.fs.remove(&location, true).await?;
        self.meta.delete(&path, filename, None).await?;
        tracing::info!(location = %location.display(), "deleted file");
        Ok(())
    }

    /// Look up a file that must exist in both stores.
    ///
    /// A record without bytes is stale and gets deleted. Either way the
    /// caller sees `NotFound`.
    async fn require_existing(
        &self,
        path: &Path,
        filename: &str,
    ) -> StorageResult<(FileRecord, PathBuf)> {
        let location = paths::join(path, filename)?;
        let record = self.meta.get(path, filename).await?;
        let on_disk = self.fs.exists(&location).await;

        match record {
            Some(Record::File(file)) if on_disk => Ok((file, location)),
            Some(Record::File(_)) => {
                tracing::warn!(
                    location = %location.display(),
                    "record has no bytes on disk, removing it"
                );
                self.meta.delete(path, filename, None).await?;
                Err(StorageError::not_found(&location))
            }
            _ => Err(StorageError::not_found(&location)),
        }
    }
}

impl std::fmt::Debug for FileController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileController").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::LocalFileStore;
    use crate::meta::SqliteMetadataStore;
    use crate::thumbnail::ImageThumbnailer;
    use coffer_types::DirectoryRecord;
    use tempfile::TempDir;

    struct Fixture {
        files: FileController,
        fs: Arc<LocalFileStore>,
        meta: Arc<SqliteMetadataStore>,
        _dir: TempDir,
    }

    fn setup() -> Fixture {
        let dir = TempDir::new().unwrap();
        let fs = Arc::new(LocalFileStore::new(dir.path()).unwrap());
        let meta = Arc::new(SqliteMetadataStore::in_memory().unwrap());
        let files = FileController::new(
            fs.clone(),
            meta.clone(),
            Arc::new(StreamCipher::new([7; 32])),
            Arc::new(ImageThumbnailer),
        );
        Fixture {
            files,
            fs,
            meta,
            _dir: dir,
        }
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let f = setup();
        let location = f
            .files
            .create_file(Path::new("/"), "a.pdf", b"hello", false)
            .await
            .unwrap();
        assert_eq!(location, PathBuf::from("/a.pdf"));

        let on_disk = f.fs.read(&location).await.unwrap();
        assert_ne!(on_disk, b"hello");
        assert_eq!(on_disk.len(), 5 + crate::cipher::TAG_LEN);

        let data = f.files.get_file(Path::new("/"), "a.pdf").await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_type_before_touching_stores() {
        let f = setup();
        let err = f
            .files
            .create_file(Path::new("/"), "notes.txt", b"x", false)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "\"txt\" is not a valid file type");
        assert_eq!(f.meta.list_all().await.unwrap().count(), 0);
        assert!(!f.fs.exists(Path::new("/notes.txt")).await);
    }

    #[tokio::test]
    async fn test_create_into_missing_directory_leaves_record_without_bytes() {
        let f = setup();
        let err = f
            .files
            .create_file(Path::new("/missing"), "a.pdf", b"x", false)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        // Metadata goes first; the scan is what reports this window.
        assert!(f.meta.exists(Path::new("/missing"), "a.pdf").await.unwrap());
    }

    async fn populated_dir(f: &Fixture, filename: &str) {
        f.fs.make_directory(&Path::new("/").join(filename), false)
            .await
            .unwrap();
        f.meta
            .save(&DirectoryRecord::new("/", filename).into(), false)
            .await
            .unwrap();
        f.files
            .create_file(&Path::new("/").join(filename), "inner.pdf", b"precious", false)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_create_over_directory_keeps_its_contents() {
        let f = setup();
        populated_dir(&f, "x.pdf").await;

        let err = f
            .files
            .create_file(Path::new("/"), "x.pdf", b"new", false)
            .await
            .unwrap_err();
        assert!(err.is_already_exists());

        assert!(f.fs.is_dir(Path::new("/x.pdf")).await);
        let data = f.files.get_file(Path::new("/x.pdf"), "inner.pdf").await.unwrap();
        assert_eq!(data, b"precious");
    }

    #[tokio::test]
    async fn test_replace_cannot_turn_directory_into_file() {
        let f = setup();
        populated_dir(&f, "x.pdf").await;

        let err = f
            .files
            .create_file(Path::new("/"), "x.pdf", b"new", true)
            .await
            .unwrap_err();
        assert!(err.is_already_exists());

        let record = f.meta.get(Path::new("/"), "x.pdf").await.unwrap().unwrap();
        assert!(record.is_directory());
        let data = f.files.get_file(Path::new("/x.pdf"), "inner.pdf").await.unwrap();
        assert_eq!(data, b"precious");
    }

    #[tokio::test]
    async fn test_replace_overwrites_bytes_and_nonce() {
        let f = setup();
        let root = Path::new("/");
        f.files.create_file(root, "a.pdf", b"one", false).await.unwrap();
        let before = f.files.file_info(root, "a.pdf").await.unwrap();

        f.files.create_file(root, "a.pdf", b"two", true).await.unwrap();
        let after = f.files.file_info(root, "a.pdf").await.unwrap();

        assert_ne!(before.nonce, after.nonce);
        assert_eq!(before.created_at, after.created_at);
        assert_eq!(f.files.get_file(root, "a.pdf").await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn test_get_heals_record_without_bytes() {
        let f = setup();
        let root = Path::new("/");
        f.files.create_file(root, "a.pdf", b"x", false).await.unwrap();
        f.fs.remove(Path::new("/a.pdf"), false).await.unwrap();

        let err = f.files.get_file(root, "a.pdf").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(!f.meta.exists(root, "a.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_get_without_record_is_not_found() {
        let f = setup();
        f.fs.write(Path::new("/a.pdf"), b"stray", false).await.unwrap();

        let err = f.files.get_file(Path::new("/"), "a.pdf").await.unwrap_err();
        assert_eq!(err.to_string(), "not found: /a.pdf");
    }

    #[tokio::test]
    async fn test_get_detects_tampering() {
        let f = setup();
        let root = Path::new("/");
        f.files.create_file(root, "a.pdf", b"payload", false).await.unwrap();

        let mut sealed = f.fs.read(Path::new("/a.pdf")).await.unwrap();
        sealed[0] ^= 0xff;
        f.fs.write(Path::new("/a.pdf"), &sealed, true).await.unwrap();

        let err = f.files.get_file(root, "a.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::IntegrityVerification(_)));
    }

    #[tokio::test]
    async fn test_rename_file() {
        let f = setup();
        f.fs.make_directory(Path::new("/docs"), false).await.unwrap();
        f.files
            .create_file(Path::new("/"), "a.pdf", b"data", false)
            .await
            .unwrap();

        let to = f
            .files
            .rename_file(Path::new("/"), "a.pdf", Path::new("/docs"), "b.pdf")
            .await
            .unwrap();

        assert_eq!(to, PathBuf::from("/docs/b.pdf"));
        assert!(!f.meta.exists(Path::new("/"), "a.pdf").await.unwrap());
        assert_eq!(
            f.files.get_file(Path::new("/docs"), "b.pdf").await.unwrap(),
            b"data"
        );
    }

    #[tokio::test]
    async fn test_rename_into_missing_directory_keeps_record() {
        let f = setup();
        let root = Path::new("/");
        f.files.create_file(root, "a.pdf", b"data", false).await.unwrap();

        let err = f
            .files
            .rename_file(root, "a.pdf", Path::new("/nope"), "a.pdf")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(f.files.get_file(root, "a.pdf").await.unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_delete_file_is_idempotent() {
        let f = setup();
        let root = Path::new("/");
        f.files.create_file(root, "a.pdf", b"x", false).await.unwrap();

        f.files.delete_file(root, "a.pdf").await.unwrap();
        f.files.delete_file(root, "a.pdf").await.unwrap();

        assert!(!f.fs.exists(Path::new("/a.pdf")).await);
        assert!(!f.meta.exists(root, "a.pdf").await.unwrap());
    }

    #[tokio::test]
    async fn test_directory_record_is_not_a_file() {
        let f = setup();
        f.fs.make_directory(Path::new("/docs"), false).await.unwrap();
        f.meta
            .save(&coffer_types::DirectoryRecord::new("/", "docs").into(), false)
            .await
            .unwrap();

        let err = f.files.get_file(Path::new("/"), "docs").await.unwrap_err();
        assert!(err.is_not_found());
        assert!(f.meta.exists(Path::new("/"), "docs").await.unwrap());
    }
}
