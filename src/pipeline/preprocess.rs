//! Image to model input conversion.

use crate::error::Result;
use crate::image::Image;
use crate::model::DepthModel;
use crate::tensor::InputTensor;

/// Apply the model's input recipe to a decoded image.
///
/// Host-to-device transfer happens inside the model's execution provider.
///
/// # Errors
///
/// Returns an error if the transform produces an unexpected tensor shape.
pub fn prepare(image: &Image, model: &dyn DepthModel) -> Result<InputTensor> {
    let tensor = model.transform().apply(image)?;
    let (height, width) = tensor.spatial_dims();
    tracing::debug!(
        "Prepared {width}x{height} input from {}x{} image",
        image.width(),
        image.height()
    );
    Ok(tensor)
}
