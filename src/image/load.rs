//! Image decoding.

use std::path::Path;

use crate::error::{Error, Result};

use super::Image;

/// Decode raw bytes into an RGB image.
///
/// The format is guessed from the content, not from any filename. Grayscale,
/// alpha and 16-bit inputs are converted to RGB8.
///
/// # Errors
///
/// Returns [`Error::InvalidImage`] if the bytes are not a supported image.
pub fn decode_image(bytes: &[u8]) -> Result<Image> {
    let decoded = image::load_from_memory(bytes).map_err(|source| Error::InvalidImage { source })?;
    Image::new(decoded.to_rgb8())
}

/// Read a stored upload from disk and decode it.
///
/// # Errors
///
/// Returns [`Error::Storage`] if the file cannot be read and
/// [`Error::InvalidImage`] if it is not a supported image.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<Image> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| Error::storage(path, source))?;
    decode_image(&bytes)
}
