//! Depth to color mapping.

use image::{Rgba, RgbaImage};

use crate::tensor::DepthMap;

/// Number of entries in a palette lookup table.
pub const PALETTE_SIZE: usize = 256;

/// Plasma anchor colors at evenly spaced positions from 0 to 1.
const PLASMA_STOPS: [[u8; 3]; 9] = [
    [0x0d, 0x08, 0x87],
    [0x4c, 0x02, 0xa1],
    [0x7e, 0x03, 0xa8],
    [0xa9, 0x23, 0x95],
    [0xcc, 0x47, 0x78],
    [0xe6, 0x6c, 0x5c],
    [0xf8, 0x95, 0x40],
    [0xfd, 0xc5, 0x27],
    [0xf0, 0xf9, 0x21],
];

/// Color of samples without a finite depth.
const BAD_COLOR: Rgba<u8> = Rgba([0, 0, 0, 0]);

/// RGBA depth visualization with the same size as the depth map.
pub type ColorizedDepth = RgbaImage;

/// Ordered color lookup table.
///
/// Entry order is the palette's intensity order: a larger normalized value
/// never maps to an earlier entry.
#[derive(Debug, Clone)]
pub struct Palette {
    lut: Vec<[u8; 3]>,
}

impl Palette {
    /// Perceptually uniform dark-blue to yellow palette.
    #[must_use]
    pub fn plasma() -> Self {
        Self::from_stops(&PLASMA_STOPS)
    }

    /// Build a table by linear interpolation between evenly spaced stops.
    ///
    /// # Panics
    ///
    /// Panics if fewer than two stops are given.
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn from_stops(stops: &[[u8; 3]]) -> Self {
        assert!(stops.len() >= 2, "a palette needs at least two stops");
        let segments = (stops.len() - 1) as f32;

        let lut = (0..PALETTE_SIZE)
            .map(|i| {
                let pos = i as f32 / (PALETTE_SIZE - 1) as f32 * segments;
                let lo = (pos.floor() as usize).min(stops.len() - 2);
                let frac = pos - lo as f32;
                let (a, b) = (stops[lo], stops[lo + 1]);
                [0, 1, 2].map(|c| {
                    let v = f32::from(a[c]) + (f32::from(b[c]) - f32::from(a[c])) * frac;
                    // Safe: interpolated between two u8 values
                    v.round().clamp(0.0, 255.0) as u8
                })
            })
            .collect();

        Self { lut }
    }

    /// Table index for a normalized value in [0, 1].
    #[must_use]
    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    pub fn index(&self, t: f32) -> usize {
        let n = self.lut.len();
        // Safe: clamped to [0, n) before casting
        ((t.clamp(0.0, 1.0) * n as f32) as usize).min(n - 1)
    }

    #[must_use]
    pub fn color(&self, t: f32) -> Rgba<u8> {
        let [r, g, b] = self.lut[self.index(t)];
        Rgba([r, g, b, 255])
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::plasma()
    }
}

/// Render a depth map through `palette`, scaled to the map's own range.
///
/// A constant map renders entirely in the first palette entry; non-finite
/// samples are transparent.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn colorize(depth: &DepthMap, palette: &Palette) -> ColorizedDepth {
    let (min, max) = depth.finite_range().unwrap_or((0.0, 0.0));
    let range = max - min;
    let view = depth.view();

    // Safe: DepthMap dimensions come from u32 image sizes
    RgbaImage::from_fn(depth.width() as u32, depth.height() as u32, |x, y| {
        let v = view[[y as usize, x as usize]];
        if !v.is_finite() {
            return BAD_COLOR;
        }
        let t = if range > 0.0 { (v - min) / range } else { 0.0 };
        palette.color(t)
    })
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;

    fn depth(values: &[f32], width: usize) -> DepthMap {
        DepthMap::new(Array2::from_shape_vec((values.len() / width, width), values.to_vec()).unwrap())
            .unwrap()
    }

    #[test]
    fn test_palette_endpoints() {
        let palette = Palette::plasma();
        assert_eq!(palette.color(0.0), Rgba([0x0d, 0x08, 0x87, 255]));
        assert_eq!(palette.color(1.0), Rgba([0xf0, 0xf9, 0x21, 255]));
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_index_is_monotonic() {
        let palette = Palette::plasma();
        let mut previous = 0;
        for i in 0..=10_000 {
            let index = palette.index(i as f32 / 10_000.0);
            assert!(index >= previous);
            previous = index;
        }
        assert_eq!(previous, PALETTE_SIZE - 1);
    }

    #[test]
    fn test_colorize_uses_own_range() {
        let palette = Palette::plasma();
        let small = colorize(&depth(&[0.0, 1.0, 2.0, 3.0], 2), &palette);
        let large = colorize(&depth(&[100.0, 200.0, 300.0, 400.0], 2), &palette);

        assert_eq!(small, large);
        assert_eq!(small.get_pixel(0, 0), &palette.color(0.0));
        assert_eq!(small.get_pixel(1, 1), &palette.color(1.0));
    }

    #[test]
    fn test_colorize_is_monotonic_in_depth() {
        let palette = Palette::plasma();
        let values = [3.0, -1.0, 0.5, 7.25, 2.0, 2.0001, 6.0, 0.0];
        let map = depth(&values, 4);
        let colored = colorize(&map, &palette);
        let lut_index = |rgba: &Rgba<u8>| {
            palette
                .lut
                .iter()
                .position(|c| c[..] == rgba.0[..3])
                .unwrap()
        };

        for (i, &a) in values.iter().enumerate() {
            for (j, &b) in values.iter().enumerate() {
                if a < b {
                    let ca = colored.get_pixel((i % 4) as u32, (i / 4) as u32);
                    let cb = colored.get_pixel((j % 4) as u32, (j / 4) as u32);
                    assert!(lut_index(ca) <= lut_index(cb));
                }
            }
        }
    }

    #[test]
    fn test_constant_map() {
        let palette = Palette::plasma();
        let colored = colorize(&depth(&[5.0; 6], 3), &palette);
        assert!(colored.pixels().all(|p| *p == palette.color(0.0)));
    }

    #[test]
    fn test_non_finite_is_transparent() {
        let colored = colorize(&depth(&[f32::NAN, 1.0, 2.0, f32::INFINITY], 2), &Palette::plasma());
        assert_eq!(colored.get_pixel(0, 0), &BAD_COLOR);
        assert_eq!(colored.get_pixel(1, 1), &BAD_COLOR);
        assert_eq!(colored.get_pixel(1, 0)[3], 255);
    }

    #[test]
    fn test_output_dimensions() {
        let colored = colorize(&depth(&[0.0; 12], 4), &Palette::plasma());
        assert_eq!(colored.dimensions(), (4, 3));
    }
}
