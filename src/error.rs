//! Custom error types for depthmap.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the depthmap library.
#[derive(Error, Debug)]
pub enum Error {
    /// Uploaded bytes could not be decoded as an image.
    #[error("failed to decode image: {source}")]
    InvalidImage {
        #[source]
        source: image::ImageError,
    },

    /// Failed to encode an image for storage.
    #[error("failed to encode image: {source}")]
    ImageEncode {
        #[source]
        source: image::ImageError,
    },

    /// Image dimensions are not supported.
    #[error("unsupported image dimensions {width}x{height}: {reason}")]
    UnsupportedDimensions {
        width: u32,
        height: u32,
        reason: String,
    },

    /// The upload carried an empty filename.
    #[error("no file selected")]
    EmptyFilename,

    /// The upload filename cannot be stored safely.
    #[error("invalid file name {name:?}: {reason}")]
    InvalidFilename { name: String, reason: String },

    /// Failed to download a model.
    #[error("failed to download model {name}: {source}")]
    ModelDownload {
        name: String,
        #[source]
        source: reqwest::Error,
    },

    /// Failed to load an ONNX model.
    #[error("failed to load ONNX model {name}: {source}")]
    ModelLoad {
        name: String,
        #[source]
        source: ort::Error,
    },

    /// The requested compute device is not usable.
    #[error("compute device {device} is not available")]
    DeviceUnavailable { device: String },

    /// Model inference failed inside ONNX Runtime.
    #[error("model inference failed: {source}")]
    Inference {
        #[source]
        source: ort::Error,
    },

    /// Model inference failed outside ONNX Runtime.
    #[error("model inference failed: {reason}")]
    InferenceFailed { reason: String },

    /// Failed to create cache directory.
    #[error("failed to create cache directory {path}: {source}")]
    CacheDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to read or write a stored file.
    #[error("storage failure at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid parameter value.
    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Shape mismatch in tensor operations.
    #[error("tensor shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },
}

impl Error {
    /// Whether the error was caused by the request rather than by the service.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::EmptyFilename | Self::InvalidFilename { .. })
    }

    pub(crate) fn storage(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for depthmap operations.
pub type Result<T> = std::result::Result<T, Error>;
