//! Storage error types.

use std::io;
use std::path::Path;

use coffer_types::InvalidFileType;
use thiserror::Error;

use crate::integrity::IntegrityReport;

/// Storage error type.
#[derive(Debug, Error)]
pub enum StorageError {
    /// File, directory, or record not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Target already exists and replacement was not requested.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Filename extension is not an accepted file type.
    #[error(transparent)]
    InvalidType(#[from] InvalidFileType),

    /// Thumbnail input does not fit the requested kind.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Authentication tag did not match during decryption.
    #[error("integrity verification failed: {0}")]
    IntegrityVerification(String),

    /// Consistency scan found entries present in only one store.
    #[error("integrity scan failed: {0}")]
    IntegrityScan(IntegrityReport),

    /// Malformed path or filename.
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Path escapes the storage root.
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    /// Stored row violates the record shape.
    #[error("corrupt record {location}: {reason}")]
    CorruptRecord { location: String, reason: String },

    /// Store has been torn down.
    #[error("{0} is closed")]
    Closed(&'static str),

    /// Invalid or incomplete configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// SQLite error.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StorageError {
    /// Create a NotFound error.
    pub fn not_found(location: impl AsRef<Path>) -> Self {
        Self::NotFound(location.as_ref().display().to_string())
    }

    /// Create an AlreadyExists error.
    pub fn already_exists(location: impl AsRef<Path>) -> Self {
        Self::AlreadyExists(location.as_ref().display().to_string())
    }

    /// Create an InvalidInput error.
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an InvalidPath error.
    pub fn invalid_path(msg: impl Into<String>) -> Self {
        Self::InvalidPath(msg.into())
    }

    /// Create a PathEscapesRoot error.
    pub fn path_escapes_root(location: impl AsRef<Path>) -> Self {
        Self::PathEscapesRoot(location.as_ref().display().to_string())
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// The error raised for a failed authentication tag.
    pub fn mac_check_failed() -> Self {
        Self::IntegrityVerification("MAC check failed".into())
    }

    /// Map an I/O error on `location` into the typed variants.
    ///
    /// `NotFound` and `AlreadyExists` keep the virtual location so callers
    /// never see host paths; everything else stays an `Io` error.
    pub fn from_io(err: io::Error, location: impl AsRef<Path>) -> Self {
        match err.kind() {
            io::ErrorKind::NotFound => Self::not_found(location),
            io::ErrorKind::AlreadyExists => Self::already_exists(location),
            _ => Self::Io(err),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists(_))
    }
}

/// Storage result type.
pub type StorageResult<T> = Result<T, StorageError>;
