//! Data models for the capture-to-speech pipeline.

mod image;
mod state;
mod text;

pub use image::{ImageHandle, NormalizedImage};
pub use state::{PipelineSnapshot, PipelineState, PlaybackState};
pub use text::{DetectedText, DEFAULT_LANGUAGE, NO_TEXT_MESSAGE};
