//! Recognizer abstraction and its error type.

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DetectedText, ImageHandle};

/// Errors from text recognition.
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// No service credential available. Raised before any network call.
    #[error("Recognition not configured: {0}")]
    Configuration(String),

    /// The call could not complete: network failure or non-2xx status.
    #[error("{message}")]
    Transport {
        status: Option<u16>,
        message: String,
    },

    /// The service answered 2xx with a body we could not decode.
    #[error("Invalid response from recognition service: {0}")]
    InvalidResponse(String),

    /// The service answered 2xx but reported an error for the image.
    #[error("Recognition service error: {0}")]
    Service(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RecognitionError {
    /// HTTP status code, when the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => *status,
            _ => None,
        }
    }
}

/// Available recognizer types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecognizerType {
    /// Google Cloud Vision `TEXT_DETECTION`.
    GoogleVision,
}

impl RecognizerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecognizerType::GoogleVision => "google-vision",
        }
    }
}

impl std::fmt::Display for RecognizerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait for text recognizers.
#[async_trait]
pub trait TextRecognizer: Send + Sync {
    /// Get the recognizer type.
    fn recognizer_type(&self) -> RecognizerType;

    /// Check if this recognizer can run (credentials present).
    fn is_available(&self) -> bool;

    /// Get a description of what's needed to make this recognizer available.
    fn availability_hint(&self) -> String;

    /// Detect text in a normalized image.
    ///
    /// Finding nothing is not an error: recognizers return
    /// [`DetectedText::nothing_found`] instead.
    async fn detect_text(&self, image: &ImageHandle) -> Result<DetectedText, RecognitionError>;
}
