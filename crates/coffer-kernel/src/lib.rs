//! # coffer-kernel
//!
//! Encrypted blob storage with a metadata index kept in step with the
//! filesystem.
//!
//! Two stores hold the state of every entry:
//! - [`FileStore`] owns the bytes (AES-256-EAX ciphertext plus tag)
//! - [`MetadataStore`] owns the records (kind, thumbnail, nonce, timestamps)
//!
//! Neither is transactional with the other. [`FileController`] and
//! [`DirectoryController`] order their calls so that any divergence left by
//! a crash is visible to [`DirectoryController::check_integrity`], and they
//! delete stale records as they come across them.
//!
//! [`Coffer`] bundles the stores and controllers for one process.

pub mod cipher;
pub mod coffer;
pub mod config;
pub mod controller;
pub mod cursor;
pub mod error;
pub mod fs;
pub mod integrity;
pub mod meta;
pub mod paths;
pub mod thumbnail;

pub use cipher::{Sealed, StreamCipher};
pub use coffer::Coffer;
pub use config::CofferConfig;
pub use controller::{DirectoryController, FileController};
pub use cursor::Cursor;
pub use error::{StorageError, StorageResult};
pub use fs::{FileStore, LocalFileStore};
pub use integrity::{IntegrityReport, Mismatch};
pub use meta::{MetadataStore, SqliteMetadataStore};
pub use thumbnail::{ImageThumbnailer, ThumbnailService};

pub use coffer_types::{DirectoryRecord, FileKind, FileRecord, Record, RecordPatch};
