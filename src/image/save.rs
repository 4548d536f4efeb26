//! Image encoding utilities.

use std::io::Cursor;

use image::{ImageFormat, RgbaImage};

use crate::error::{Error, Result};

/// Encode an RGBA raster as PNG bytes.
///
/// # Errors
///
/// Returns [`Error::ImageEncode`] if encoding fails.
pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|source| Error::ImageEncode { source })?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use image::{GenericImageView, Rgba};

    use super::*;

    #[test]
    fn test_png_keeps_size_and_alpha() {
        let img = RgbaImage::from_pixel(7, 5, Rgba([1, 2, 3, 255]));
        let bytes = encode_png(&img).unwrap();

        assert_eq!(&bytes[1..4], b"PNG");
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (7, 5));
        assert_eq!(decoded.to_rgba8().get_pixel(3, 2), &Rgba([1, 2, 3, 255]));
    }
}
