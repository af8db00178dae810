//! Camera backed by an existing image file.
//!
//! Each capture copies the source into the capture directory, so the
//! pipeline can delete its copy without touching the original.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::{capture_file_name, Camera, CameraError, CaptureOptions, CaptureOutcome, PermissionStatus};
use crate::models::ImageHandle;

pub struct FileCamera {
    source: PathBuf,
    capture_dir: PathBuf,
}

impl FileCamera {
    pub fn new(source: impl Into<PathBuf>, capture_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            capture_dir: capture_dir.into(),
        }
    }
}

#[async_trait]
impl Camera for FileCamera {
    async fn request_permission(&self) -> PermissionStatus {
        match tokio::fs::metadata(&self.source).await {
            Ok(meta) if meta.is_file() => PermissionStatus::Granted,
            _ => PermissionStatus::Denied,
        }
    }

    async fn capture(&self, _options: &CaptureOptions) -> Result<CaptureOutcome, CameraError> {
        tokio::fs::create_dir_all(&self.capture_dir).await?;

        let extension = self
            .source
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("jpg")
            .to_lowercase();
        let target = self.capture_dir.join(capture_file_name(&extension));

        match tokio::fs::copy(&self.source, &target).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Source {} vanished, treating as cancelled", self.source.display());
                return Ok(CaptureOutcome::Cancelled);
            }
            Err(e) => return Err(e.into()),
        }

        let handle = ImageHandle::open(&target).await?;
        debug!("Captured {} from {}", target.display(), self.source.display());
        Ok(CaptureOutcome::Captured(handle))
    }
}
