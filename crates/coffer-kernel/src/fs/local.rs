//! Host directory backend.
//!
//! Maps virtual locations onto a real directory, with path security to
//! prevent escaping the root. Symlinks are never followed as directories:
//! walks treat them as leaves and removal deletes the link itself.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;

use crate::cursor::Cursor;
use crate::error::{StorageError, StorageResult};
use crate::fs::ops::FileStore;
use crate::paths;

/// Blob store over a host directory.
///
/// The virtual location `/docs/report.pdf` lives at `<root>/docs/report.pdf`.
/// Locations containing `..`, or symlinks resolving outside the root, are
/// rejected with `PathEscapesRoot`.
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Open a store rooted at an existing directory.
    ///
    /// The root is canonicalized once here, so later containment checks
    /// compare like with like (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref();
        let root = dunce::canonicalize(root).map_err(|e| StorageError::from_io(e, root))?;
        if !root.is_dir() {
            return Err(StorageError::invalid_path(format!(
                "storage root {} is not a directory",
                root.display()
            )));
        }
        Ok(Self { root })
    }

    /// Host path of the storage root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a virtual location to a host path within the root.
    fn resolve(&self, location: &Path) -> StorageResult<PathBuf> {
        let location = paths::normalize_dir(location)?;
        let relative = location.strip_prefix("/").unwrap_or(&location);
        if relative.as_os_str().is_empty() {
            return Ok(self.root.clone());
        }
        let full = self.root.join(relative);

        // Lexically fine, but a symlink on the way may still lead out. Check
        // the deepest ancestor that exists.
        let mut ancestor = full.as_path();
        let canonical = loop {
            match dunce::canonicalize(ancestor) {
                Ok(canonical) => break canonical,
                Err(_) => match ancestor.parent() {
                    Some(parent) => ancestor = parent,
                    None => return Ok(full),
                },
            }
        };
        if !canonical.starts_with(&self.root) {
            return Err(StorageError::path_escapes_root(format!(
                "{} resolves to {}",
                location.display(),
                canonical.display()
            )));
        }

        Ok(full)
    }

    /// Translate a host path under the root back to its virtual location.
    fn to_location(&self, host: &Path) -> StorageResult<PathBuf> {
        let relative = host
            .strip_prefix(&self.root)
            .map_err(|_| StorageError::path_escapes_root(host))?;
        Ok(Path::new("/").join(relative))
    }

    fn parent_of(location: &Path) -> PathBuf {
        location
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("/"))
    }

    async fn require_dir(&self, location: &Path) -> StorageResult<()> {
        if self.is_dir(location).await {
            Ok(())
        } else {
            Err(StorageError::not_found(location))
        }
    }
}

#[async_trait]
impl FileStore for LocalFileStore {
    async fn read(&self, location: &Path) -> StorageResult<Vec<u8>> {
        let full = self.resolve(location)?;
        fs::read(&full)
            .await
            .map_err(|e| StorageError::from_io(e, location))
    }

    async fn list_children(&self, location: &Path) -> StorageResult<Cursor<PathBuf>> {
        let full = self.resolve(location)?;
        let mut dir = fs::read_dir(&full)
            .await
            .map_err(|e| StorageError::from_io(e, location))?;

        let mut children = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            children.push(self.to_location(&entry.path())?);
        }
        children.sort();

        Ok(Cursor::new(children))
    }

    async fn exists(&self, location: &Path) -> bool {
        match self.resolve(location) {
            Ok(full) => fs::symlink_metadata(&full).await.is_ok(),
            Err(_) => false,
        }
    }

    async fn is_dir(&self, location: &Path) -> bool {
        match self.resolve(location) {
            Ok(full) => fs::symlink_metadata(&full)
                .await
                .map(|meta| meta.file_type().is_dir())
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn write(&self, location: &Path, data: &[u8], replace: bool) -> StorageResult<()> {
        let full = self.resolve(location)?;
        self.require_dir(&Self::parent_of(location)).await?;
        if !replace && self.exists(location).await {
            return Err(StorageError::already_exists(location));
        }

        let name = full
            .file_name()
            .ok_or_else(|| StorageError::invalid_path("no filename"))?
            .to_string_lossy()
            .into_owned();
        let partial = full.with_file_name(format!(".{name}.{:016x}.partial", rand::random::<u64>()));

        if let Err(e) = fs::write(&partial, data).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&partial, &full).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e.into());
        }

        tracing::debug!(location = %location.display(), bytes = data.len(), "wrote blob");
        Ok(())
    }

    async fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        let from_full = self.resolve(from)?;
        let to_full = self.resolve(to)?;
        if !self.exists(from).await {
            return Err(StorageError::not_found(from));
        }
        self.require_dir(&Self::parent_of(to)).await?;

        fs::rename(&from_full, &to_full).await?;
        tracing::debug!(from = %from.display(), to = %to.display(), "renamed");
        Ok(())
    }

    async fn make_directory(&self, location: &Path, exist_ok: bool) -> StorageResult<()> {
        let full = self.resolve(location)?;
        match fs::create_dir(&full).await {
            Ok(()) => {
                tracing::debug!(location = %location.display(), "created directory");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                if exist_ok && self.is_dir(location).await {
                    Ok(())
                } else {
                    Err(StorageError::already_exists(location))
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::not_found(Self::parent_of(location)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, location: &Path, silent: bool) -> StorageResult<()> {
        let full = self.resolve(location)?;
        if full == self.root {
            return Err(StorageError::invalid_path("cannot remove the storage root"));
        }

        let meta = match fs::symlink_metadata(&full).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound && silent => return Ok(()),
            Err(e) => return Err(StorageError::from_io(e, location)),
        };
        let result = if meta.is_dir() {
            fs::remove_dir_all(&full).await
        } else {
            fs::remove_file(&full).await
        };

        match result {
            Ok(()) => {
                tracing::debug!(location = %location.display(), "removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound && silent => Ok(()),
            Err(e) => Err(StorageError::from_io(e, location)),
        }
    }
}
