//! Bicubic resampling of depth maps.
//!
//! Pixel coordinates are treated as cell centers (no corner alignment) and
//! neighbours outside the map are clamped to the border, so a resample to the
//! same shape returns the input unchanged.

use ndarray::Array2;

use crate::error::{Error, Result};
use crate::tensor::DepthMap;

/// Cubic convolution coefficient.
const CUBIC_A: f32 = -0.75;

/// Four source indices and their weights for one output coordinate.
#[derive(Debug, Clone, Copy)]
struct Taps {
    index: [usize; 4],
    weight: [f32; 4],
}

impl Taps {
    fn apply(&self, sample: impl Fn(usize) -> f32) -> f32 {
        self.index
            .iter()
            .zip(self.weight)
            .map(|(&i, w)| sample(i) * w)
            .sum()
    }
}

/// Kernel for `|x| <= 1`.
fn cubic_near(x: f32) -> f32 {
    ((CUBIC_A + 2.0) * x - (CUBIC_A + 3.0)) * x * x + 1.0
}

/// Kernel for `1 < |x| < 2`.
fn cubic_far(x: f32) -> f32 {
    ((CUBIC_A * x - 5.0 * CUBIC_A) * x + 8.0 * CUBIC_A) * x - 4.0 * CUBIC_A
}

#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss
)]
fn taps(in_len: usize, out_len: usize) -> Vec<Taps> {
    let scale = in_len as f32 / out_len as f32;
    let last = in_len as i64 - 1;

    (0..out_len)
        .map(|dst| {
            let src = (dst as f32 + 0.5) * scale - 0.5;
            let base = src.floor();
            let t = src - base;
            let base = base as i64;

            let mut index = [0usize; 4];
            for (k, slot) in index.iter_mut().enumerate() {
                // Safe: clamped into [0, in_len - 1]
                *slot = (base - 1 + k as i64).clamp(0, last) as usize;
            }

            Taps {
                index,
                weight: [
                    cubic_far(t + 1.0),
                    cubic_near(t),
                    cubic_near(1.0 - t),
                    cubic_far(2.0 - t),
                ],
            }
        })
        .collect()
}

/// Resample `depth` to exactly `(height, width)`.
///
/// # Errors
///
/// Returns [`Error::InvalidParameter`] if a target dimension is zero.
pub fn resample(depth: &DepthMap, height: usize, width: usize) -> Result<DepthMap> {
    if height == 0 || width == 0 {
        return Err(Error::InvalidParameter {
            name: "target shape".to_string(),
            reason: format!("({height}, {width}) has an empty side"),
        });
    }

    let src = depth.view();
    let rows = taps(depth.height(), height);
    let cols = taps(depth.width(), width);

    // Horizontal pass over every source row, then vertical
    let horizontal = Array2::from_shape_fn((depth.height(), width), |(y, x)| {
        cols[x].apply(|i| src[[y, i]])
    });
    let resampled = Array2::from_shape_fn((height, width), |(y, x)| {
        rows[y].apply(|i| horizontal[[i, x]])
    });

    DepthMap::new(resampled)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::cast_precision_loss)]
    fn ramp(height: usize, width: usize) -> DepthMap {
        DepthMap::new(Array2::from_shape_fn((height, width), |(y, x)| {
            (y * width + x) as f32
        }))
        .unwrap()
    }

    #[test]
    fn test_output_shape_matches_target() {
        let depth = ramp(12, 16);
        for (h, w) in [(480, 640), (7, 3), (1, 1), (12, 16), (5, 200)] {
            let out = resample(&depth, h, w).unwrap();
            assert_eq!((out.height(), out.width()), (h, w));
        }
    }

    #[test]
    fn test_same_shape_is_identity() {
        let depth = ramp(9, 13);
        let out = resample(&depth, 9, 13).unwrap();
        for (a, b) in depth.view().iter().zip(out.view().iter()) {
            assert!((a - b).abs() < 1e-4, "{a} != {b}");
        }
    }

    #[test]
    fn test_constant_map_stays_constant() {
        let depth = DepthMap::new(Array2::from_elem((4, 6), 2.5)).unwrap();
        let out = resample(&depth, 31, 17).unwrap();
        assert!(out.view().iter().all(|v| (v - 2.5).abs() < 1e-4));
    }

    #[test]
    fn test_weights_sum_to_one() {
        for tap in taps(10, 37).iter().chain(taps(37, 10).iter()) {
            let sum: f32 = tap.weight.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_upsample_ramp_stays_ordered() {
        let depth = DepthMap::new(Array2::from_shape_fn((1, 8), |(_, x)| {
            #[allow(clippy::cast_precision_loss)]
            let x = x as f32;
            x
        }))
        .unwrap();
        let out = resample(&depth, 1, 16).unwrap();
        let row = out.view();

        // dst 8 maps to src (8.5 * 0.5) - 0.5 = 3.75, between samples 3 and 4
        assert!(row[[0, 8]] > 3.0 && row[[0, 8]] < 4.0);
        for x in 1..16 {
            assert!(row[[0, x]] >= row[[0, x - 1]] - 1e-5);
        }
    }

    #[test]
    fn test_single_pixel_source() {
        let depth = DepthMap::new(Array2::from_elem((1, 1), 4.0)).unwrap();
        let out = resample(&depth, 3, 5).unwrap();
        assert!(out.view().iter().all(|v| (v - 4.0).abs() < 1e-5));
    }

    #[test]
    fn test_rejects_empty_target() {
        assert!(matches!(
            resample(&ramp(2, 2), 0, 4),
            Err(Error::InvalidParameter { .. })
        ));
    }
}
