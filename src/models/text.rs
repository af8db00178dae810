//! Recognized text.

use serde::{Deserialize, Serialize};

/// Text returned when the service answers but finds nothing to read.
pub const NO_TEXT_MESSAGE: &str = "No se detectó texto en la imagen";

/// Language assumed when the service reports no locale.
pub const DEFAULT_LANGUAGE: &str = "es";

/// Result of one successful recognition call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedText {
    pub text: String,
    pub language_code: String,
}

impl DetectedText {
    pub fn new(text: impl Into<String>, language_code: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            language_code: language_code.into(),
        }
    }

    /// The "nothing found" result.
    pub fn nothing_found() -> Self {
        Self::new(NO_TEXT_MESSAGE, DEFAULT_LANGUAGE)
    }

    /// Message used when sharing the result.
    pub fn share_message(&self) -> String {
        format!("Texto detectado ({}): {}", self.language_code, self.text)
    }
}
