//! Model downloading and session construction.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;

use crate::error::{Error, Result};

use super::transform::Transform;
use super::Device;

/// Supported depth estimation model families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModelType {
    /// DPT with a ViT-Large backbone. Highest quality, slowest.
    #[default]
    DptLarge,
    /// DPT with a hybrid ResNet/ViT backbone.
    DptHybrid,
    /// `MiDaS` v2.1 small. Fast, lower quality.
    MidasSmall,
}

impl ModelType {
    /// Get the cache filename for this model type.
    #[must_use]
    pub const fn filename(&self) -> &'static str {
        match self {
            Self::DptLarge => "dpt_large.onnx",
            Self::DptHybrid => "dpt_hybrid.onnx",
            Self::MidasSmall => "midas_v21_small_256.onnx",
        }
    }

    /// Get the download URL for this model type.
    #[must_use]
    pub const fn url(&self) -> &'static str {
        match self {
            Self::DptLarge => "https://huggingface.co/Xenova/dpt-large/resolve/main/onnx/model.onnx",
            Self::DptHybrid => {
                "https://huggingface.co/Xenova/dpt-hybrid-midas/resolve/main/onnx/model.onnx"
            }
            Self::MidasSmall => {
                "https://github.com/isl-org/MiDaS/releases/download/v2_1/model-small.onnx"
            }
        }
    }

    /// Get the approximate size in bytes for progress indication.
    #[must_use]
    pub const fn approx_size(&self) -> u64 {
        match self {
            Self::DptLarge => 1_370_000_000,
            Self::DptHybrid => 490_000_000,
            Self::MidasSmall => 66_000_000,
        }
    }

    /// Input recipe the model was trained with.
    ///
    /// The small model is exported with a fixed 256x256 input, so it stretches
    /// instead of keeping the aspect ratio.
    #[must_use]
    pub const fn transform(&self) -> Transform {
        match self {
            Self::DptLarge | Self::DptHybrid => Transform::dpt(),
            Self::MidasSmall => Transform::small().with_keep_aspect_ratio(false),
        }
    }
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::DptLarge => "DPT_Large",
            Self::DptHybrid => "DPT_Hybrid",
            Self::MidasSmall => "MiDaS_small",
        };
        f.write_str(name)
    }
}

/// Manages the model cache directory and downloads.
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a model cache in the platform cache directory.
    ///
    /// - Windows: `%LOCALAPPDATA%\depthmap\models`
    /// - Linux: `~/.cache/depthmap/models`
    /// - macOS: `~/Library/Caches/depthmap/models`
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn new() -> Result<Self> {
        let base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::with_dir(base.join("depthmap").join("models"))
    }

    /// Create a model cache rooted at `cache_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn with_dir(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();

        fs::create_dir_all(&cache_dir).map_err(|source| Error::CacheDir {
            path: cache_dir.clone(),
            source,
        })?;

        Ok(Self { cache_dir })
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get the path to a model file, downloading if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be downloaded or accessed.
    pub fn get_model_path(&self, model_type: ModelType) -> Result<PathBuf> {
        let path = self.cache_dir.join(model_type.filename());

        if !path.exists() {
            download_file(
                model_type.url(),
                &path,
                model_type.filename(),
                model_type.approx_size(),
            )?;
        }

        Ok(path)
    }
}

/// Build an inference session for the model at `path` on `device`.
///
/// # Errors
///
/// Returns [`Error::ModelLoad`] if ONNX Runtime rejects the options or the model.
pub fn load_session(path: &Path, device: Device, num_threads: usize) -> Result<Session> {
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    let load_err = |source: ort::Error| Error::ModelLoad {
        name: name.clone(),
        source,
    };

    let mut builder = Session::builder()
        .map_err(load_err)?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(load_err)?;

    if num_threads > 0 {
        builder = builder.with_intra_threads(num_threads).map_err(load_err)?;
    }

    builder = match device {
        Device::Cpu => builder.with_execution_providers([CPUExecutionProvider::default().build()]),
        Device::Cuda(device_id) => builder.with_execution_providers([
            CUDAExecutionProvider::default()
                .with_device_id(device_id)
                .build(),
            CPUExecutionProvider::default().build(),
        ]),
    }
    .map_err(load_err)?;

    tracing::debug!("Committing session from {}", path.display());
    builder.commit_from_file(path).map_err(load_err)
}

/// Download a file from a URL to a path with progress indication.
fn download_file(url: &str, path: &Path, name: &str, approx_size: u64) -> Result<()> {
    tracing::info!("Downloading {name} from {url}");

    let client = reqwest::blocking::Client::new();
    let response = client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|source| Error::ModelDownload {
            name: name.to_string(),
            source,
        })?;

    let total_size = response.content_length().unwrap_or(approx_size);

    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Downloading {name}"));

    // Write to a temporary file first, then rename so a cut download is never cached
    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path)?;

    let mut downloaded = 0u64;
    let mut reader = response;

    loop {
        let mut buffer = [0u8; 8192];
        let bytes_read = std::io::Read::read(&mut reader, &mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read])?;
        downloaded += bytes_read as u64;
        pb.set_position(downloaded);
    }
    file.sync_all()?;

    pb.finish_with_message(format!("Downloaded {name}"));

    fs::rename(&temp_path, path)?;

    Ok(())
}
