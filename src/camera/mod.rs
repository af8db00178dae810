//! Camera capability.
//!
//! The pipeline only needs two things from a camera: permission and a single
//! capture that either yields a new image file or is cancelled. Captured
//! files are owned by the pipeline from then on and deleted when superseded.

mod command;
mod file;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::ImageHandle;

pub use command::{default_camera_args, CommandCamera, DEFAULT_CAMERA_PROGRAM};
pub use file::FileCamera;

/// Errors from the camera capability.
#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of a permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

/// Outcome of one capture.
#[derive(Debug)]
pub enum CaptureOutcome {
    Captured(ImageHandle),
    Cancelled,
}

/// Capture options passed to the camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureOptions {
    /// Requested aspect ratio (width, height).
    pub aspect: (u32, u32),
    /// Requested capture quality in (0, 1].
    pub quality: f32,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            aspect: (4, 3),
            quality: 0.7,
        }
    }
}

/// Platform camera.
#[async_trait]
pub trait Camera: Send + Sync {
    async fn request_permission(&self) -> PermissionStatus;

    async fn capture(&self, options: &CaptureOptions) -> Result<CaptureOutcome, CameraError>;
}

/// Unique file name for a new capture.
pub(crate) fn capture_file_name(extension: &str) -> String {
    format!("capture-{}.{}", uuid::Uuid::new_v4(), extension)
}
