//! Shape-checked numeric values passed between pipeline stages.

use ndarray::{Array2, Array4, ArrayView2};

use crate::error::{Error, Result};

/// Number of channels in RGB images.
pub const RGB_CHANNELS: usize = 3;

/// Model-ready input in NCHW format with a batch of one RGB image.
///
/// The spatial size is decided by the model's transform and is not fixed.
#[derive(Debug, Clone)]
pub struct InputTensor(Array4<f32>);

impl InputTensor {
    /// Wrap an NCHW array, checking batch and channel counts.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if the array is not `(1, 3, H, W)` with
    /// non-zero `H` and `W`.
    pub fn new(array: Array4<f32>) -> Result<Self> {
        let (batch, channels, height, width) = array.dim();
        if batch != 1 || channels != RGB_CHANNELS || height == 0 || width == 0 {
            return Err(Error::ShapeMismatch {
                expected: format!("(1, {RGB_CHANNELS}, H, W)"),
                actual: format!("{:?}", array.shape()),
            });
        }
        Ok(Self(array))
    }

    /// Spatial size as `(height, width)`.
    #[must_use]
    pub fn spatial_dims(&self) -> (usize, usize) {
        let (_, _, height, width) = self.0.dim();
        (height, width)
    }

    #[must_use]
    pub const fn as_array(&self) -> &Array4<f32> {
        &self.0
    }

    #[must_use]
    pub fn into_array(self) -> Array4<f32> {
        self.0
    }
}

/// Per-pixel relative depth, `(height, width)`.
///
/// Holds both the model's native-resolution output and the map resampled to
/// the source image size.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthMap(Array2<f32>);

impl DepthMap {
    /// Wrap a 2-D array.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] if either dimension is zero.
    pub fn new(array: Array2<f32>) -> Result<Self> {
        let (height, width) = array.dim();
        if height == 0 || width == 0 {
            return Err(Error::ShapeMismatch {
                expected: "non-empty (H, W)".to_string(),
                actual: format!("({height}, {width})"),
            });
        }
        Ok(Self(array))
    }

    /// Build a depth map from a flat model output.
    ///
    /// Accepts `(H, W)`, `(1, H, W)` and `(1, 1, H, W)`; leading unit axes are
    /// dropped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ShapeMismatch`] for any other layout or if `data` does
    /// not match `dims`.
    pub fn from_model_output(dims: &[usize], data: Vec<f32>) -> Result<Self> {
        let spatial = match dims {
            [height, width] | [1, height, width] | [1, 1, height, width] => (*height, *width),
            _ => {
                return Err(Error::ShapeMismatch {
                    expected: "(H, W), (1, H, W) or (1, 1, H, W)".to_string(),
                    actual: format!("{dims:?}"),
                })
            }
        };

        let array = Array2::from_shape_vec(spatial, data).map_err(|_| Error::ShapeMismatch {
            expected: format!("{dims:?}"),
            actual: "reshape failed".to_string(),
        })?;

        Self::new(array)
    }

    #[must_use]
    pub fn height(&self) -> usize {
        self.0.nrows()
    }

    #[must_use]
    pub fn width(&self) -> usize {
        self.0.ncols()
    }

    #[must_use]
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.0.view()
    }

    /// Smallest and largest finite values, or `None` if there are none.
    #[must_use]
    pub fn finite_range(&self) -> Option<(f32, f32)> {
        self.0
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |range, v| match range {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_tensor_rejects_wrong_channels() {
        let array = Array4::<f32>::zeros((1, 4, 8, 8));
        assert!(matches!(
            InputTensor::new(array),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_input_tensor_spatial_dims() {
        let tensor = InputTensor::new(Array4::zeros((1, 3, 24, 32))).unwrap();
        assert_eq!(tensor.spatial_dims(), (24, 32));
    }

    #[test]
    fn test_depth_from_model_output_layouts() {
        for dims in [vec![2, 3], vec![1, 2, 3], vec![1, 1, 2, 3]] {
            let depth = DepthMap::from_model_output(&dims, vec![0.0; 6]).unwrap();
            assert_eq!((depth.height(), depth.width()), (2, 3));
        }
    }

    #[test]
    fn test_depth_from_model_output_rejects_batches() {
        let result = DepthMap::from_model_output(&[2, 2, 3], vec![0.0; 12]);
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_depth_from_model_output_rejects_short_data() {
        let result = DepthMap::from_model_output(&[1, 2, 3], vec![0.0; 5]);
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_finite_range_skips_nan() {
        let depth =
            DepthMap::new(Array2::from_shape_vec((1, 4), vec![f32::NAN, 2.0, -1.0, 5.0]).unwrap())
                .unwrap();
        assert_eq!(depth.finite_range(), Some((-1.0, 5.0)));
    }
}
