//! Virtual path composition.
//!
//! Every location the stores see is a virtual absolute path rooted at `/`,
//! the storage root. Directory paths are normalized before they are joined
//! with a filename or persisted, so that `"/docs/"`, `"docs"` and
//! `"/docs/./"` all address the same directory.

use std::path::{Component, Path, PathBuf};

use crate::error::{StorageError, StorageResult};

/// Normalize a virtual directory path.
///
/// Forces a leading `/`, drops `.` components and trailing separators.
/// `..` is rejected rather than resolved: a path may never climb out of the
/// storage root.
pub fn normalize_dir(dir: &Path) -> StorageResult<PathBuf> {
    let mut out = PathBuf::from("/");
    for component in dir.components() {
        match component {
            Component::RootDir | Component::CurDir => {}
            Component::Normal(part) => out.push(part),
            Component::ParentDir | Component::Prefix(_) => {
                return Err(StorageError::path_escapes_root(dir));
            }
        }
    }
    Ok(out)
}

/// Check that `filename` names a single entry.
pub fn validate_filename(filename: &str) -> StorageResult<()> {
    if filename.is_empty() {
        return Err(StorageError::invalid_path("empty filename"));
    }
    if filename == "." || filename == ".." {
        return Err(StorageError::invalid_path(format!(
            "{filename:?} is not a filename"
        )));
    }
    if filename.contains('/') || filename.contains('\0') {
        return Err(StorageError::invalid_path(format!(
            "{filename:?} contains a separator or NUL"
        )));
    }
    Ok(())
}

/// Compose `dir/filename` into one location.
pub fn join(dir: &Path, filename: &str) -> StorageResult<PathBuf> {
    validate_filename(filename)?;
    Ok(normalize_dir(dir)?.join(filename))
}

/// Split a location into its parent directory and filename.
///
/// Returns `None` for the root, which has neither.
pub fn split(location: &Path) -> Option<(PathBuf, String)> {
    let location = normalize_dir(location).ok()?;
    let filename = location.file_name()?.to_string_lossy().into_owned();
    let parent = location.parent()?.to_path_buf();
    Some((parent, filename))
}

/// Returns true if `path` is `prefix` or lies beneath it.
///
/// Component-aware: `/docs` contains `/docs/a` but not `/docs2`.
pub fn is_within(path: &Path, prefix: &Path) -> bool {
    path.starts_with(prefix)
}

/// Database key for a directory path.
pub fn key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_dir() {
        for (raw, expected) in [
            ("", "/"),
            ("/", "/"),
            ("docs", "/docs"),
            ("/docs/", "/docs"),
            ("/docs/./2024//", "/docs/2024"),
        ] {
            assert_eq!(normalize_dir(Path::new(raw)).unwrap(), PathBuf::from(expected), "{raw:?}");
        }
    }

    #[test]
    fn test_normalize_rejects_parent_components() {
        let err = normalize_dir(Path::new("/docs/../../etc")).unwrap_err();
        assert!(matches!(err, StorageError::PathEscapesRoot(_)));
    }

    #[test]
    fn test_join() {
        assert_eq!(
            join(Path::new("/docs"), "report.pdf").unwrap(),
            PathBuf::from("/docs/report.pdf")
        );
        assert_eq!(join(Path::new(""), "docs").unwrap(), PathBuf::from("/docs"));
    }

    #[test]
    fn test_join_rejects_malformed_filenames() {
        for bad in ["", ".", "..", "a/b", "nul\0"] {
            let err = join(Path::new("/"), bad).unwrap_err();
            assert!(matches!(err, StorageError::InvalidPath(_)), "{bad:?}");
        }
    }

    #[test]
    fn test_split() {
        assert_eq!(
            split(Path::new("/docs/report.pdf")),
            Some((PathBuf::from("/docs"), "report.pdf".to_string()))
        );
        assert_eq!(
            split(Path::new("/docs")),
            Some((PathBuf::from("/"), "docs".to_string()))
        );
        assert_eq!(split(Path::new("/")), None);
    }

    #[test]
    fn test_is_within_is_component_aware() {
        assert!(is_within(Path::new("/docs"), Path::new("/docs")));
        assert!(is_within(Path::new("/docs/a/b"), Path::new("/docs")));
        assert!(!is_within(Path::new("/docs2"), Path::new("/docs")));
    }
}
