//! Pipeline and playback states.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use super::text::DetectedText;

/// Authoritative processing state of the capture pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "detail", rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    Capturing,
    Processing,
    Error(String),
    Ready(DetectedText),
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Capturing => "capturing",
            Self::Processing => "processing",
            Self::Error(_) => "error",
            Self::Ready(_) => "ready",
        }
    }

    /// A capture or recognition is in flight.
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Capturing | Self::Processing)
    }

    pub fn detected_text(&self) -> Option<&DetectedText> {
        match self {
            Self::Ready(text) => Some(text),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error(message) => Some(message),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What observers of the pipeline see: the state plus the current image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineSnapshot {
    pub state: PipelineState,
    /// Preview of the current capture, present in processing/error/ready.
    pub image: Option<PathBuf>,
}

impl Default for PipelineSnapshot {
    fn default() -> Self {
        Self {
            state: PipelineState::Idle,
            image: None,
        }
    }
}

/// Playback state, owned by the playback controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PlaybackState {
    Silent,
    Speaking { text: String, language_code: String },
}

impl PlaybackState {
    pub fn is_speaking(&self) -> bool {
        matches!(self, Self::Speaking { .. })
    }
}
