//! Upload-to-depth-map pipeline.

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::image;
use crate::model::{DepthModel, DevicePreference, ModelType, OnnxDepthModel};
use crate::storage::{self, Storage, UploadName};

use super::colorize::{colorize, Palette};
use super::inference;
use super::preprocess::prepare;
use super::resample::resample;
use super::stage::{PipelineFailure, Run, Stage};

/// Configuration for the depth pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Model family to load.
    pub model: ModelType,

    /// Explicit model file. Skips the cache and download when set.
    pub model_path: Option<PathBuf>,

    /// Model cache directory. Defaults to the platform cache directory.
    pub cache_dir: Option<PathBuf>,

    /// Compute device.
    pub device: DevicePreference,

    /// Intra-op threads for ONNX Runtime, 0 lets the runtime decide.
    pub num_threads: usize,

    /// Override the model family's aspect ratio handling.
    pub keep_aspect_ratio: Option<bool>,

    /// Where raw uploads are staged for decoding.
    pub upload_dir: PathBuf,

    /// Where originals and depth maps are published.
    pub static_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: ModelType::default(),
            model_path: None,
            cache_dir: None,
            device: DevicePreference::default(),
            num_threads: 0,
            keep_aspect_ratio: None,
            upload_dir: PathBuf::from("uploads"),
            static_dir: PathBuf::from("static"),
        }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.upload_dir.as_os_str().is_empty() {
            return Err(Error::InvalidParameter {
                name: "upload_dir".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        if self.static_dir.as_os_str().is_empty() {
            return Err(Error::InvalidParameter {
                name: "static_dir".to_string(),
                reason: "must not be empty".to_string(),
            });
        }

        // Staged uploads must never be reachable through /static
        if self.upload_dir == self.static_dir {
            return Err(Error::InvalidParameter {
                name: "upload_dir".to_string(),
                reason: "must differ from static_dir".to_string(),
            });
        }

        if let Some(path) = &self.model_path {
            if !path.is_file() {
                return Err(Error::InvalidParameter {
                    name: "model_path".to_string(),
                    reason: format!("{} is not a file", path.display()),
                });
            }
        }

        Ok(())
    }
}

/// Result of one successful request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthArtifact {
    pub original_path: PathBuf,
    pub depth_map_path: PathBuf,
    pub original_url: String,
    pub depth_map_url: String,
    pub width: u32,
    pub height: u32,
}

/// Depth estimation pipeline shared by all requests.
pub struct Pipeline {
    model: Arc<dyn DepthModel>,
    storage: Storage,
    palette: Palette,
}

impl Pipeline {
    /// Create a new pipeline with the given configuration.
    ///
    /// This will download the model if it is not already cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the directories cannot
    /// be created or the model cannot be loaded.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        tracing::info!("Initializing pipeline with config: {config:?}");

        let storage = Storage::bootstrap(&config.upload_dir, &config.static_dir)?;
        let model = OnnxDepthModel::load(&config)?;

        tracing::info!("Pipeline initialized on {}", model.device());
        Ok(Self::with_model(Arc::new(model), storage))
    }

    /// Assemble a pipeline from an already loaded model.
    #[must_use]
    pub fn with_model(model: Arc<dyn DepthModel>, storage: Storage) -> Self {
        Self {
            model,
            storage,
            palette: Palette::plasma(),
        }
    }

    #[must_use]
    pub const fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Turn one upload into a published depth map.
    ///
    /// Nothing is published unless every step succeeds; a failure leaves any
    /// earlier depth map for the same name untouched.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineFailure`] naming the state the request failed in.
    pub fn process(&self, name: &UploadName, bytes: &[u8]) -> std::result::Result<DepthArtifact, PipelineFailure> {
        let _span = tracing::info_span!("process", file = name.filename()).entered();
        let mut run = Run::start();

        // The staged copy is deleted as soon as it has been decoded
        let image = run.step(
            self.storage
                .stage_upload(name, bytes)
                .and_then(|staged| image::load_image(staged.path())),
        )?;
        let (height, width) = image.shape();

        let input = run.step(prepare(&image, self.model.as_ref()))?;
        let raw = run.step(inference::run(input, self.model.as_ref()))?;
        let depth = run.step(resample(&raw, height, width))?;
        let colored = run.step(Ok(colorize(&depth, &self.palette)))?;

        let published = run.step(
            image::encode_png(&colored).and_then(|png| self.storage.publish(name, bytes, &png)),
        )?;
        run.step(Ok(()))?;
        debug_assert_eq!(run.stage(), Stage::Done);

        tracing::info!("Depth map written to {}", published.depth_map.display());
        Ok(DepthArtifact {
            original_path: published.original,
            depth_map_path: published.depth_map,
            original_url: storage::original_url(name),
            depth_map_url: storage::depth_map_url(name),
            width: image.width(),
            height: image.height(),
        })
    }
}
