//! File kinds and filename → kind derivation.

use std::path::Path;

use strum::{AsRefStr, Display, EnumIter, EnumString};
use thiserror::Error;

/// Type tag stored with every record.
///
/// `Directory` is reserved for directory records; every other variant names
/// an encrypted blob format that can be uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum FileKind {
    Directory,
    Jpeg,
    Jpg,
    Png,
    Pdf,
}

/// The extension of an uploaded filename is not an accepted blob kind.
///
/// Holds the lower-cased extension (empty when the filename has none).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("\"{0}\" is not a valid file type")]
pub struct InvalidFileType(pub String);

impl FileKind {
    /// Returns true for the reserved directory tag.
    pub fn is_directory(&self) -> bool {
        matches!(self, FileKind::Directory)
    }

    /// Returns true for kinds rendered by decoding the image bytes.
    pub fn is_image(&self) -> bool {
        matches!(self, FileKind::Jpeg | FileKind::Jpg | FileKind::Png)
    }

    /// Derive the kind of an uploaded file from its name.
    ///
    /// Takes the substring after the last `.`, lower-cased. Dotfiles such as
    /// `.hidden` have no extension. The directory tag is never derivable.
    pub fn from_filename(filename: &str) -> Result<Self, InvalidFileType> {
        let extension = Path::new(filename)
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match extension.parse::<FileKind>() {
            Ok(kind) if !kind.is_directory() => Ok(kind),
            _ => Err(InvalidFileType(extension)),
        }
    }
}
