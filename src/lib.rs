//! # depthmap
//!
//! A small HTTP service that turns uploaded photos into colorized depth maps
//! using monocular depth estimation models (DPT / `MiDaS`) through ONNX Runtime.
//!
//! Each upload is decoded, resized and normalized for the model, run through a
//! single forward pass, resampled back to the photo's resolution with bicubic
//! interpolation and rendered with the plasma palette.
//!
//! ## Example
//!
//! ```no_run
//! use depthmap::{Config, Pipeline, UploadName};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let pipeline = Pipeline::new(Config::default())?;
//!
//! let bytes = std::fs::read("room.jpg")?;
//! let artifact = pipeline.process(&UploadName::parse("room.jpg")?, &bytes)?;
//! println!("{}", artifact.depth_map_path.display());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod image;
pub mod model;
pub mod pipeline;
pub mod server;
pub mod storage;
pub mod tensor;

pub use error::{Error, Result};
pub use pipeline::{Config, DepthArtifact, Pipeline, PipelineFailure};
pub use storage::{Storage, UploadName};
