//! Camera driven by an external capture command.
//!
//! Arguments may contain placeholders:
//! - `{output}`: path the command must write the image to
//! - `{quality}`: requested quality as a percentage (1-100)
//! - `{aspect}`: requested aspect ratio as `W:H`
//!
//! A command that exits successfully without writing `{output}` is treated as
//! a cancelled capture. A program missing from PATH counts as denied access.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{capture_file_name, Camera, CameraError, CaptureOptions, CaptureOutcome, PermissionStatus};
use crate::models::ImageHandle;

/// Default capture program (Raspberry Pi camera stack).
pub const DEFAULT_CAMERA_PROGRAM: &str = "libcamera-still";

/// Default arguments for [`DEFAULT_CAMERA_PROGRAM`].
pub fn default_camera_args() -> Vec<String> {
    ["-n", "-o", "{output}", "-q", "{quality}"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

pub struct CommandCamera {
    program: String,
    args: Vec<String>,
    capture_dir: PathBuf,
}

impl CommandCamera {
    pub fn new(program: impl Into<String>, args: Vec<String>, capture_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args,
            capture_dir: capture_dir.into(),
        }
    }

    fn expand_args(&self, output: &Path, options: &CaptureOptions) -> Vec<String> {
        let quality = ((options.quality.clamp(0.01, 1.0)) * 100.0).round() as u32;
        let aspect = format!("{}:{}", options.aspect.0, options.aspect.1);
        let output = output.to_string_lossy();
        self.args
            .iter()
            .map(|arg| {
                arg.replace("{output}", &output)
                    .replace("{quality}", &quality.to_string())
                    .replace("{aspect}", &aspect)
            })
            .collect()
    }
}

#[async_trait]
impl Camera for CommandCamera {
    async fn request_permission(&self) -> PermissionStatus {
        match which::which(&self.program) {
            Ok(path) => {
                debug!("Camera program found at {}", path.display());
                PermissionStatus::Granted
            }
            Err(_) => {
                warn!("Camera program {} not found on PATH", self.program);
                PermissionStatus::Denied
            }
        }
    }

    async fn capture(&self, options: &CaptureOptions) -> Result<CaptureOutcome, CameraError> {
        tokio::fs::create_dir_all(&self.capture_dir).await?;
        let target = self.capture_dir.join(capture_file_name("jpg"));
        let args = self.expand_args(&target, options);

        debug!("Running {} {:?}", self.program, args);
        let output = Command::new(&self.program).args(&args).output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CameraError::CaptureFailed(format!(
                "{} failed ({}): {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        match ImageHandle::open(&target).await {
            Ok(handle) if handle.size_bytes() > 0 => Ok(CaptureOutcome::Captured(handle)),
            Ok(handle) => {
                handle.release().await;
                Ok(CaptureOutcome::Cancelled)
            }
            Err(_) => Ok(CaptureOutcome::Cancelled),
        }
    }
}
