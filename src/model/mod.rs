//! Depth model provider: device selection, model loading and inference.

mod loader;
mod transform;

pub use loader::{load_session, ModelCache, ModelType};
pub use transform::{ResizeMethod, Transform, IMAGENET_MEAN, IMAGENET_STD};

use std::fmt;
use std::sync::Mutex;

use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
use ort::session::Session;
use ort::value::Tensor;

use crate::error::{Error, Result};
use crate::pipeline::Config;
use crate::tensor::{DepthMap, InputTensor};

/// Compute device a session is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Device {
    Cpu,
    /// CUDA device ordinal.
    Cuda(i32),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cpu => f.write_str("cpu"),
            Self::Cuda(id) => write!(f, "cuda:{id}"),
        }
    }
}

/// Requested compute device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    /// First CUDA device when available, otherwise CPU.
    #[default]
    Auto,
    Cpu,
    Cuda(i32),
}

impl DevicePreference {
    /// Resolve the preference against the accelerators ONNX Runtime can use.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DeviceUnavailable`] if CUDA was requested explicitly but
    /// cannot be used.
    pub fn resolve(self) -> Result<Device> {
        self.resolve_with(cuda_available())
    }

    fn resolve_with(self, cuda: bool) -> Result<Device> {
        match self {
            Self::Auto if cuda => Ok(Device::Cuda(0)),
            Self::Auto | Self::Cpu => Ok(Device::Cpu),
            Self::Cuda(id) if cuda => Ok(Device::Cuda(id)),
            Self::Cuda(id) => Err(Error::DeviceUnavailable {
                device: Device::Cuda(id).to_string(),
            }),
        }
    }
}

fn cuda_available() -> bool {
    CUDAExecutionProvider::default()
        .is_available()
        .unwrap_or(false)
}

/// A frozen depth estimation model.
///
/// Implementations are shared read-only between requests.
pub trait DepthModel: Send + Sync {
    /// Input recipe paired with the model.
    fn transform(&self) -> &Transform;

    /// Device the model runs on.
    fn device(&self) -> Device;

    /// Run one forward pass and return the depth map at the model's native
    /// resolution.
    ///
    /// # Errors
    ///
    /// Returns an error if inference fails or the output is not a single
    /// depth map.
    fn infer(&self, input: InputTensor) -> Result<DepthMap>;
}

/// ONNX Runtime backed [`DepthModel`].
pub struct OnnxDepthModel {
    // Session::run needs exclusive access
    session: Mutex<Session>,
    transform: Transform,
    device: Device,
    model_type: ModelType,
}

impl OnnxDepthModel {
    /// Load the configured model, downloading it into the cache if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the device is unavailable or the model cannot be
    /// fetched or loaded. Callers should treat this as fatal.
    pub fn load(config: &Config) -> Result<Self> {
        let device = config.device.resolve()?;

        let path = if let Some(path) = &config.model_path {
            path.clone()
        } else {
            let cache = match &config.cache_dir {
                Some(dir) => ModelCache::with_dir(dir)?,
                None => ModelCache::new()?,
            };
            cache.get_model_path(config.model)?
        };

        tracing::info!("Loading {} from {} on {device}", config.model, path.display());
        let session = load_session(&path, device, config.num_threads)?;

        let mut transform = config.model.transform();
        if let Some(keep) = config.keep_aspect_ratio {
            transform = transform.with_keep_aspect_ratio(keep);
        }

        Ok(Self {
            session: Mutex::new(session),
            transform,
            device,
            model_type: config.model,
        })
    }

    #[must_use]
    pub const fn model_type(&self) -> ModelType {
        self.model_type
    }
}

impl DepthModel for OnnxDepthModel {
    fn transform(&self) -> &Transform {
        &self.transform
    }

    fn device(&self) -> Device {
        self.device
    }

    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    fn infer(&self, input: InputTensor) -> Result<DepthMap> {
        let input_value =
            Tensor::from_array(input.into_array()).map_err(|source| Error::Inference { source })?;

        // Guard and outputs are released when this scope ends, on every path
        let mut session = self.session.lock().map_err(|_| Error::InferenceFailed {
            reason: "session lock poisoned by an earlier panic".to_string(),
        })?;

        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|source| Error::Inference { source })?;

        let output = outputs
            .values()
            .next()
            .ok_or_else(|| Error::ShapeMismatch {
                expected: "depth output".to_string(),
                actual: "no output".to_string(),
            })?;

        let (shape_info, data) = output
            .try_extract_tensor::<f32>()
            .map_err(|source| Error::Inference { source })?;

        // Safe: tensor dimensions are always non-negative and within bounds
        let dims: Vec<usize> = shape_info.iter().map(|&x| x as usize).collect();
        let depth = DepthMap::from_model_output(&dims, data.to_vec())?;

        Ok(depth)
    }
}
