//! Scoped model invocation.

use std::time::Instant;

use crate::error::Result;
use crate::model::DepthModel;
use crate::tensor::{DepthMap, InputTensor};

/// Run one inference and return the raw depth map.
///
/// # Errors
///
/// Returns the model's error unchanged.
pub fn run(input: InputTensor, model: &dyn DepthModel) -> Result<DepthMap> {
    let (height, width) = input.spatial_dims();
    let _span = tracing::debug_span!("inference", device = %model.device(), height, width).entered();

    let started = Instant::now();
    let depth = model.infer(input)?;

    tracing::debug!(
        elapsed_ms = started.elapsed().as_millis(),
        "Raw depth {}x{}",
        depth.width(),
        depth.height()
    );
    Ok(depth)
}
