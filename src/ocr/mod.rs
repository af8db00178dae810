//! Remote text recognition.
//!
//! The pipeline talks to recognizers through the [`TextRecognizer`] trait.
//! The production backend is Google Cloud Vision's `images:annotate`
//! endpoint with `TEXT_DETECTION`.

mod api_backend;
mod backend;
mod vision;

pub use api_backend::{encode_image_base64, DEFAULT_LANGUAGE_HINTS};
pub use backend::{RecognitionError, RecognizerType, TextRecognizer};
pub use vision::{VisionClient, VisionConfig, DEFAULT_VISION_ENDPOINT};
