//! Input normalization recipes paired with each model family.

use image::imageops::{self, FilterType};
use ndarray::Array4;

use crate::error::Result;
use crate::image::Image;
use crate::tensor::{InputTensor, RGB_CHANNELS};

/// `ImageNet` channel means.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];

/// `ImageNet` channel standard deviations.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// How the target size is fitted around the image when keeping its aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeMethod {
    /// Scale as little as possible.
    Minimal,
    /// Output fits inside the target size.
    UpperBound,
    /// Output covers the target size.
    LowerBound,
}

/// Resize-and-normalize recipe turning an [`Image`] into an [`InputTensor`].
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    /// Target width before aspect handling.
    pub width: u32,
    /// Target height before aspect handling.
    pub height: u32,
    /// Preserve the source aspect ratio instead of stretching to the target.
    pub keep_aspect_ratio: bool,
    /// Output sides are rounded to a multiple of this.
    pub multiple_of: u32,
    pub resize_method: ResizeMethod,
    /// Per-channel mean subtracted after scaling to [0, 1].
    pub mean: [f32; 3],
    /// Per-channel divisor applied after the mean.
    pub std: [f32; 3],
}

impl Transform {
    /// Recipe for the DPT large and hybrid models.
    #[must_use]
    pub const fn dpt() -> Self {
        Self {
            width: 384,
            height: 384,
            keep_aspect_ratio: true,
            multiple_of: 32,
            resize_method: ResizeMethod::Minimal,
            mean: [0.5, 0.5, 0.5],
            std: [0.5, 0.5, 0.5],
        }
    }

    /// Recipe for the lightweight `MiDaS` small model.
    #[must_use]
    pub const fn small() -> Self {
        Self {
            width: 256,
            height: 256,
            keep_aspect_ratio: true,
            multiple_of: 32,
            resize_method: ResizeMethod::UpperBound,
            mean: IMAGENET_MEAN,
            std: IMAGENET_STD,
        }
    }

    #[must_use]
    pub const fn with_keep_aspect_ratio(mut self, keep: bool) -> Self {
        self.keep_aspect_ratio = keep;
        self
    }

    /// Network input size `(width, height)` for a source of the given size.
    #[must_use]
    pub fn target_size(&self, width: u32, height: u32) -> (u32, u32) {
        let mut scale_w = f64::from(self.width) / f64::from(width);
        let mut scale_h = f64::from(self.height) / f64::from(height);

        if self.keep_aspect_ratio {
            match self.resize_method {
                ResizeMethod::LowerBound => {
                    if scale_w > scale_h {
                        scale_h = scale_w;
                    } else {
                        scale_w = scale_h;
                    }
                }
                ResizeMethod::UpperBound => {
                    if scale_w < scale_h {
                        scale_h = scale_w;
                    } else {
                        scale_w = scale_h;
                    }
                }
                ResizeMethod::Minimal => {
                    if (1.0 - scale_w).abs() < (1.0 - scale_h).abs() {
                        scale_h = scale_w;
                    } else {
                        scale_w = scale_h;
                    }
                }
            }
        }

        let raw_w = scale_w * f64::from(width);
        let raw_h = scale_h * f64::from(height);

        match self.resize_method {
            ResizeMethod::LowerBound => (
                self.constrain(raw_w, self.width, None),
                self.constrain(raw_h, self.height, None),
            ),
            ResizeMethod::UpperBound => (
                self.constrain(raw_w, 0, Some(self.width)),
                self.constrain(raw_h, 0, Some(self.height)),
            ),
            ResizeMethod::Minimal => (self.constrain(raw_w, 0, None), self.constrain(raw_h, 0, None)),
        }
    }

    /// Round to a multiple of `multiple_of`, honouring optional bounds.
    ///
    /// Never returns zero.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn constrain(&self, x: f64, min: u32, max: Option<u32>) -> u32 {
        let m = f64::from(self.multiple_of.max(1));

        let mut y = (x / m).round_ties_even() * m;
        if max.is_some_and(|max| y > f64::from(max)) {
            y = (x / m).floor() * m;
        }
        if y < f64::from(min) {
            y = (x / m).ceil() * m;
        }

        // Safe: y is a non-negative multiple of m bounded by the target size scale
        (y as u32).max(self.multiple_of.max(1))
    }

    /// Resize and normalize an image into an NCHW tensor.
    ///
    /// # Errors
    ///
    /// Returns an error if the resulting tensor has an unexpected shape.
    pub fn apply(&self, image: &Image) -> Result<InputTensor> {
        let (width, height) = self.target_size(image.width(), image.height());
        // Cubic filter, matching the reference training pipeline
        let resized = imageops::resize(image.as_rgb(), width, height, FilterType::CatmullRom);

        let (w, h) = (width as usize, height as usize);
        let mut tensor = Array4::<f32>::zeros((1, RGB_CHANNELS, h, w));

        for (x, y, pixel) in resized.enumerate_pixels() {
            for c in 0..RGB_CHANNELS {
                let scaled = f32::from(pixel[c]) / 255.0;
                tensor[[0, c, y as usize, x as usize]] = (scaled - self.mean[c]) / self.std[c];
            }
        }

        InputTensor::new(tensor)
    }
}
