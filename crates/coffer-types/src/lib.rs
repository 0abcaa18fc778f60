//! Shared record types for coffer.
//!
//! This crate is the leaf of the workspace: it knows what a stored entry
//! *looks like* (its kind, its metadata record) but nothing about where the
//! bytes or the records live. The kernel crate builds the stores and the
//! controllers on top of these types.
//!
//! # Key Types
//!
//! |---------------------|------------------------------------------------|
//! | Type                | Purpose                                        |
//! |---------------------|------------------------------------------------|
//! | [`FileKind`]        | Type tag persisted with every record           |
//! | [`Record`]          | Directory or file metadata (sum type)          |
//! | [`DirectoryRecord`] | Metadata for a directory (no icon, no nonce)   |
//! | [`FileRecord`]      | Metadata for an encrypted blob (icon + nonce)  |
//! | [`RecordPatch`]     | Partial update of a record's location fields   |
//! |---------------------|------------------------------------------------|

pub mod kind;
pub mod record;

pub use kind::{FileKind, InvalidFileType};
pub use record::{DirectoryRecord, FileRecord, NONCE_LEN, Nonce, Record, RecordPatch};

/// Current time as Unix milliseconds. Used for record timestamps.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
