//! Metadata records.
//!
//! A record describes one stored entry, addressed by `(path, filename)`
//! where `path` is the virtual directory that contains it. The record's kind
//! fixes its shape: directories carry neither thumbnail nor nonce, files
//! always carry both. The sum type makes the other pairings unrepresentable.

use std::path::{Path, PathBuf};

use crate::kind::{FileKind, InvalidFileType};
use crate::now_millis;

/// Length of the per-file encryption nonce, in bytes.
pub const NONCE_LEN: usize = 16;

/// Per-file encryption nonce.
pub type Nonce = [u8; NONCE_LEN];

/// Metadata for a directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Virtual directory containing this directory.
    pub path: PathBuf,
    /// Name of this directory within `path`.
    pub filename: String,
    /// Unix millis when the record was first stored.
    pub created_at: u64,
    /// Unix millis of the last mutation, if any.
    pub updated_at: Option<u64>,
}

impl DirectoryRecord {
    /// Create a fresh directory record stamped with the current time.
    pub fn new(path: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            filename: filename.into(),
            created_at: now_millis(),
            updated_at: None,
        }
    }
}

/// Metadata for an encrypted blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Virtual directory containing this file.
    pub path: PathBuf,
    /// Name of the file within `path`.
    pub filename: String,
    kind: FileKind,
    /// PNG thumbnail bytes.
    pub icon: Vec<u8>,
    /// Nonce used when the payload was encrypted.
    pub nonce: Nonce,
    /// Unix millis when the record was first stored.
    pub created_at: u64,
    /// Unix millis of the last mutation, if any.
    pub updated_at: Option<u64>,
}

impl FileRecord {
    /// Create a fresh file record stamped with the current time.
    ///
    /// Fails when `kind` is the directory tag.
    pub fn new(
        path: impl Into<PathBuf>,
        filename: impl Into<String>,
        kind: FileKind,
        icon: Vec<u8>,
        nonce: Nonce,
    ) -> Result<Self, InvalidFileType> {
        if kind.is_directory() {
            return Err(InvalidFileType(kind.to_string()));
        }
        Ok(Self {
            path: path.into(),
            filename: filename.into(),
            kind,
            icon,
            nonce,
            created_at: now_millis(),
            updated_at: None,
        })
    }

    /// Blob kind (never [`FileKind::Directory`]).
    pub fn kind(&self) -> FileKind {
        self.kind
    }
}

/// A stored metadata record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Directory(DirectoryRecord),
    File(FileRecord),
}

impl Record {
    pub fn path(&self) -> &Path {
        match self {
            Record::Directory(dir) => &dir.path,
            Record::File(file) => &file.path,
        }
    }

    pub fn filename(&self) -> &str {
        match self {
            Record::Directory(dir) => &dir.filename,
            Record::File(file) => &file.filename,
        }
    }

    pub fn kind(&self) -> FileKind {
        match self {
            Record::Directory(_) => FileKind::Directory,
            Record::File(file) => file.kind,
        }
    }

    pub fn created_at(&self) -> u64 {
        match self {
            Record::Directory(dir) => dir.created_at,
            Record::File(file) => file.created_at,
        }
    }

    pub fn updated_at(&self) -> Option<u64> {
        match self {
            Record::Directory(dir) => dir.updated_at,
            Record::File(file) => file.updated_at,
        }
    }

    /// Thumbnail bytes (files only).
    pub fn icon(&self) -> Option<&[u8]> {
        match self {
            Record::Directory(_) => None,
            Record::File(file) => Some(&file.icon),
        }
    }

    /// Encryption nonce (files only).
    pub fn nonce(&self) -> Option<&Nonce> {
        match self {
            Record::Directory(_) => None,
            Record::File(file) => Some(&file.nonce),
        }
    }

    /// Full virtual location: `path/filename`.
    pub fn location(&self) -> PathBuf {
        self.path().join(self.filename())
    }

    pub fn is_directory(&self) -> bool {
        matches!(self, Record::Directory(_))
    }
}

impl From<DirectoryRecord> for Record {
    fn from(dir: DirectoryRecord) -> Self {
        Record::Directory(dir)
    }
}

impl From<FileRecord> for Record {
    fn from(file: FileRecord) -> Self {
        Record::File(file)
    }
}

/// Partial update of a record's location.
///
/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub path: Option<PathBuf>,
    pub filename: Option<String>,
}

impl RecordPatch {
    /// Patch that moves a record to `path/filename`.
    pub fn moved_to(path: impl Into<PathBuf>, filename: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            filename: Some(filename.into()),
        }
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        self.path.is_none() && self.filename.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_record_rejects_directory_kind() {
        let err = FileRecord::new("/", "x.pdf", FileKind::Directory, vec![1], [0; NONCE_LEN])
            .unwrap_err();
        assert_eq!(err, InvalidFileType("directory".into()));
    }

    #[test]
    fn test_record_shape_follows_kind() {
        let dir: Record = DirectoryRecord::new("/", "docs").into();
        assert_eq!(dir.kind(), FileKind::Directory);
        assert!(dir.icon().is_none());
        assert!(dir.nonce().is_none());
        assert_eq!(dir.location(), PathBuf::from("/docs"));

        let file: Record = FileRecord::new("/docs", "a.png", FileKind::Png, vec![9], [7; NONCE_LEN])
            .unwrap()
            .into();
        assert_eq!(file.kind(), FileKind::Png);
        assert_eq!(file.icon(), Some(&[9u8][..]));
        assert_eq!(file.nonce(), Some(&[7u8; NONCE_LEN]));
        assert_eq!(file.location(), PathBuf::from("/docs/a.png"));
        assert!(file.updated_at().is_none());
    }

    #[test]
    fn test_patch_builders() {
        assert!(RecordPatch::default().is_empty());

        let patch = RecordPatch::default().with_filename("b.pdf");
        assert!(!patch.is_empty());
        assert!(patch.path.is_none());

        let patch = RecordPatch::moved_to("/archive", "b.pdf");
        assert_eq!(patch.path.as_deref(), Some(Path::new("/archive")));
        assert_eq!(patch.filename.as_deref(), Some("b.pdf"));
    }
}
