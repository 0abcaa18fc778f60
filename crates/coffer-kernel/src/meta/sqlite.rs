//! SQLite persistence for metadata records.
//!
//! One `files` table holds both directory and file records. The kind column
//! fixes the shape, and CHECK constraints keep the database from ever
//! storing a directory with an icon or a file without its nonce.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use coffer_types::{
    DirectoryRecord, FileKind, FileRecord, NONCE_LEN, Nonce, Record, RecordPatch, now_millis,
};
use parking_lot::Mutex;
use rusqlite::{Connection, OptionalExtension, Row, params};

use crate::cursor::Cursor;
use crate::error::{StorageError, StorageResult};
use crate::meta::ops::MetadataStore;
use crate::paths;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    path TEXT NOT NULL,
    filename TEXT NOT NULL,
    kind TEXT NOT NULL CHECK (kind IN ('directory', 'jpeg', 'jpg', 'png', 'pdf')),
    icon BLOB,
    nonce BLOB,
    created_at INTEGER NOT NULL,
    updated_at INTEGER,
    CHECK (kind <> 'directory' OR (icon IS NULL AND nonce IS NULL)),
    CHECK (kind = 'directory' OR (icon IS NOT NULL AND nonce IS NOT NULL)),
    CHECK (nonce IS NULL OR length(nonce) = 16)
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_files_location ON files(path, filename);
CREATE INDEX IF NOT EXISTS idx_files_created ON files(created_at);
"#;

const COLUMNS: &str = "path, filename, kind, icon, nonce, created_at, updated_at";

// Files sort before directories.
const ORDER: &str = "ORDER BY (kind = 'directory'), path, filename";

// ?1 is the prefix itself, ?2 the prefix with a trailing separator.
const UNDER_PREFIX: &str = "(path = ?1 OR substr(path, 1, length(?2)) = ?2)";

// =============================================================================
// Row Structs (module-private helpers)
// =============================================================================

/// Maps a row from the files table.
#[derive(Debug)]
struct RecordRow {
    path: String,
    filename: String,
    kind: String,
    icon: Option<Vec<u8>>,
    nonce: Option<Vec<u8>>,
    created_at: i64,
    updated_at: Option<i64>,
}

impl RecordRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            path: row.get(0)?,
            filename: row.get(1)?,
            kind: row.get(2)?,
            icon: row.get(3)?,
            nonce: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
        })
    }

    fn corrupt(&self, reason: impl Into<String>) -> StorageError {
        StorageError::CorruptRecord {
            location: format!("{}/{}", self.path.trim_end_matches('/'), self.filename),
            reason: reason.into(),
        }
    }

    /// Convert back to a typed record, rejecting shapes the kind forbids.
    fn into_record(self) -> StorageResult<Record> {
        let kind = FileKind::from_str(&self.kind)
            .map_err(|_| self.corrupt(format!("unknown kind {:?}", self.kind)))?;
        let created_at = self.created_at as u64;
        let updated_at = self.updated_at.map(|t| t as u64);

        match (kind, self.icon.as_ref(), self.nonce.as_ref()) {
            (FileKind::Directory, None, None) => Ok(Record::Directory(DirectoryRecord {
                path: PathBuf::from(self.path),
                filename: self.filename,
                created_at,
                updated_at,
            })),
            (FileKind::Directory, _, _) => Err(self.corrupt("directory carries icon or nonce")),
            (_, Some(_), Some(nonce)) => {
                let nonce: Nonce = nonce
                    .as_slice()
                    .try_into()
                    .map_err(|_| self.corrupt(format!("nonce must be {NONCE_LEN} bytes")))?;
                let icon = self.icon.unwrap_or_default();
                let mut file = FileRecord::new(self.path, self.filename, kind, icon, nonce)?;
                file.created_at = created_at;
                file.updated_at = updated_at;
                Ok(Record::File(file))
            }
            _ => Err(self.corrupt("file is missing icon or nonce")),
        }
    }
}

/// Bind values for the prefix match in [`UNDER_PREFIX`].
fn prefix_params(prefix: &Path) -> (String, String) {
    let exact = paths::key(prefix);
    let below = if exact.ends_with('/') {
        exact.clone()
    } else {
        format!("{exact}/")
    };
    (exact, below)
}

// =============================================================================
// Store
// =============================================================================

/// SQLite-backed [`MetadataStore`].
///
/// Holds one connection behind a mutex; every call is a short synchronous
/// critical section. [`MetadataStore::close`] drops the connection.
pub struct SqliteMetadataStore {
    conn: Mutex<Option<Connection>>,
}

impl std::fmt::Debug for SqliteMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteMetadataStore")
            .field("open", &self.conn.lock().is_some())
            .finish()
    }
}

impl SqliteMetadataStore {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self::from_connection(conn))
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(Some(conn)),
        }
    }

    fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> StorageResult<T>) -> StorageResult<T> {
        let guard = self.conn.lock();
        let conn = guard.as_ref().ok_or(StorageError::Closed("metadata store"))?;
        f(conn)
    }

    fn query_records(
        conn: &Connection,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> StorageResult<Vec<Record>> {
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, RecordRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter().map(RecordRow::into_record).collect()
    }

    fn row_exists(conn: &Connection, path: &str, filename: &str) -> StorageResult<bool> {
        let found = conn
            .query_row(
                "SELECT 1 FROM files WHERE path = ?1 AND filename = ?2",
                params![path, filename],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn get(&self, path: &Path, filename: &str) -> StorageResult<Option<Record>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM files WHERE path = ?1 AND filename = ?2"),
                    params![paths::key(path), filename],
                    RecordRow::from_row,
                )
                .optional()?;
            row.map(RecordRow::into_record).transpose()
        })
    }

    async fn save(&self, record: &Record, replace: bool) -> StorageResult<()> {
        let path = paths::key(record.path());
        let filename = record.filename();
        let kind = record.kind();
        let icon = record.icon();
        let nonce = record.nonce().map(|n| &n[..]);
        let created_at = record.created_at() as i64;
        let updated_at = record.updated_at().map(|t| t as i64);

        self.with_conn(|conn| {
            if replace {
                // A directory row and a file row never replace each other.
                let changed = conn.execute(
                    &format!(
                        "INSERT INTO files ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                         ON CONFLICT(path, filename) DO UPDATE SET
                             kind = excluded.kind,
                             icon = excluded.icon,
                             nonce = excluded.nonce,
                             updated_at = ?8
                         WHERE (files.kind = 'directory') = (excluded.kind = 'directory')"
                    ),
                    params![
                        path,
                        filename,
                        kind.to_string(),
                        icon,
                        nonce,
                        created_at,
                        updated_at,
                        now_millis() as i64,
                    ],
                )?;
                if changed == 0 {
                    return Err(StorageError::already_exists(record.location()));
                }
            } else {
                if Self::row_exists(conn, &path, filename)? {
                    return Err(StorageError::already_exists(record.location()));
                }
                conn.execute(
                    &format!("INSERT INTO files ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
                    params![path, filename, kind.to_string(), icon, nonce, created_at, updated_at],
                )?;
            }
            tracing::debug!(path = %path, filename, %kind, replace, "saved record");
            Ok(())
        })
    }

    async fn patch(&self, path: &Path, filename: &str, patch: &RecordPatch) -> StorageResult<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let new_path = patch.path.as_deref().map(paths::key);

        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE OR REPLACE files
                 SET path = coalesce(?3, path),
                     filename = coalesce(?4, filename),
                     updated_at = ?5
                 WHERE path = ?1 AND filename = ?2",
                params![
                    paths::key(path),
                    filename,
                    new_path,
                    patch.filename,
                    now_millis() as i64,
                ],
            )?;
            tracing::debug!(path = %path.display(), filename, changed, "patched record");
            Ok(())
        })
    }

    async fn delete(
        &self,
        path: &Path,
        filename: &str,
        kind: Option<FileKind>,
    ) -> StorageResult<()> {
        let kind = kind.map(|k| k.to_string());
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM files
                 WHERE path = ?1 AND filename = ?2 AND (?3 IS NULL OR kind = ?3)",
                params![paths::key(path), filename, kind],
            )?;
            tracing::debug!(path = %path.display(), filename, removed, "deleted record");
            Ok(())
        })
    }

    async fn delete_by_path_prefix(&self, prefix: &Path) -> StorageResult<usize> {
        let (exact, below) = prefix_params(prefix);
        self.with_conn(|conn| {
            let removed = conn.execute(
                &format!("DELETE FROM files WHERE {UNDER_PREFIX}"),
                params![exact, below],
            )?;
            tracing::debug!(prefix = %exact, removed, "deleted records by prefix");
            Ok(removed)
        })
    }

    async fn rewrite_path_prefix(
        &self,
        old_prefix: &Path,
        new_prefix: &Path,
    ) -> StorageResult<usize> {
        if old_prefix == Path::new("/") {
            return Err(StorageError::invalid_path("cannot move the storage root"));
        }
        let (exact, below) = prefix_params(old_prefix);
        let new_exact = paths::key(new_prefix);
        // Descendants become `new_base` + "/rest"; the root has no base.
        let new_base = new_exact.trim_end_matches('/').to_string();

        self.with_conn(|conn| {
            let moved = conn.execute(
                &format!(
                    "UPDATE OR REPLACE files
                     SET path = CASE WHEN path = ?1 THEN ?3
                                     ELSE ?4 || substr(path, length(?1) + 1) END,
                         updated_at = ?5
                     WHERE {UNDER_PREFIX}"
                ),
                params![exact, below, new_exact, new_base, now_millis() as i64],
            )?;
            tracing::debug!(from = %exact, to = %new_exact, moved, "rewrote path prefix");
            Ok(moved)
        })
    }

    async fn list_children(&self, path: &Path) -> StorageResult<Cursor<Record>> {
        self.with_conn(|conn| {
            let records = Self::query_records(
                conn,
                &format!("SELECT {COLUMNS} FROM files WHERE path = ?1 {ORDER}"),
                params![paths::key(path)],
            )?;
            Ok(Cursor::new(records))
        })
    }

    async fn list_all(&self) -> StorageResult<Cursor<Record>> {
        self.with_conn(|conn| {
            let records =
                Self::query_records(conn, &format!("SELECT {COLUMNS} FROM files {ORDER}"), [])?;
            Ok(Cursor::new(records))
        })
    }

    async fn close(&self) -> StorageResult<()> {
        let conn = self.conn.lock().take();
        match conn {
            Some(conn) => conn.close().map_err(|(_, e)| StorageError::Database(e)),
            None => Ok(()),
        }
    }
}
