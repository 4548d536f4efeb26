//! Image decoding and encoding utilities.

mod load;
mod save;

pub use load::{decode_image, load_image};
pub use save::encode_png;

use image::RgbImage;

use crate::error::{Error, Result};

/// Decoded RGB8 image with non-zero dimensions.
///
/// Channel order is always red, green, blue regardless of the source file.
#[derive(Debug, Clone)]
pub struct Image(RgbImage);

impl Image {
    /// Wrap an RGB buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedDimensions`] if the image is empty.
    pub fn new(rgb: RgbImage) -> Result<Self> {
        let (width, height) = rgb.dimensions();
        if width == 0 || height == 0 {
            return Err(Error::UnsupportedDimensions {
                width,
                height,
                reason: "image has no pixels".to_string(),
            });
        }
        Ok(Self(rgb))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.0.height()
    }

    /// Dimensions as `(height, width)`, the order depth maps use.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.height() as usize, self.width() as usize)
    }

    #[must_use]
    pub const fn as_rgb(&self) -> &RgbImage {
        &self.0
    }
}
