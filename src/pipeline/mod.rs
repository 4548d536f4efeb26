//! Depth estimation pipeline: decode, preprocess, infer, resample, colorize, persist.

mod colorize;
mod inference;
mod orchestrator;
mod preprocess;
mod resample;
mod stage;

pub use colorize::{colorize, ColorizedDepth, Palette, PALETTE_SIZE};
pub use inference::run;
pub use orchestrator::{Config, DepthArtifact, Pipeline};
pub use preprocess::prepare;
pub use resample::resample;
pub use stage::{PipelineFailure, Stage};
