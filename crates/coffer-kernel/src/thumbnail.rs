//! Preview generation for stored files.

use std::io;

use coffer_types::FileKind;
use image::ImageFormat;

use crate::error::{StorageError, StorageResult};

/// Bounding box, in pixels, that image previews are scaled into.
pub const THUMBNAIL_SIZE: u32 = 128;

/// Built-in preview for document types that are not rendered.
const PDF_THUMBNAIL: &[u8] = include_bytes!("../assets/pdf-thumbnail.png");

/// Produces a small preview blob for a file kind.
pub trait ThumbnailService: Send + Sync {
    /// Build a preview for `kind` from the plaintext `data`.
    ///
    /// Image kinds require `data`; document kinds may ignore it.
    fn thumbnail(&self, kind: FileKind, data: Option<&[u8]>) -> StorageResult<Vec<u8>>;
}

/// Default preview renderer backed by the `image` crate.
///
/// Images are fit into a [`THUMBNAIL_SIZE`] square keeping their aspect
/// ratio and re-encoded as PNG. PDFs get a fixed icon.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageThumbnailer;

impl ThumbnailService for ImageThumbnailer {
    fn thumbnail(&self, kind: FileKind, data: Option<&[u8]>) -> StorageResult<Vec<u8>> {
        match kind {
            FileKind::Pdf => Ok(PDF_THUMBNAIL.to_vec()),
            kind if kind.is_image() => {
                let data = data.ok_or_else(|| {
                    StorageError::invalid_input(format!("{kind} thumbnail requires image data"))
                })?;
                render(data)
            }
            kind => Err(StorageError::invalid_input(format!("no thumbnail for {kind}"))),
        }
    }
}

fn render(data: &[u8]) -> StorageResult<Vec<u8>> {
    let img = image::load_from_memory(data)
        .map_err(|e| StorageError::invalid_input(format!("cannot decode image: {e}")))?;
    let thumb = img.thumbnail(THUMBNAIL_SIZE, THUMBNAIL_SIZE);

    let mut out = io::Cursor::new(Vec::new());
    thumb
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| StorageError::invalid_input(format!("cannot encode thumbnail: {e}")))?;
    Ok(out.into_inner())
}
