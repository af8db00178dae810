//! Google Cloud Vision text detection backend.
//!
//! Sends one `images:annotate` request per image with the `TEXT_DETECTION`
//! feature and a fixed list of language hints. Requires an API key, passed
//! as the `key` query parameter. Failures are surfaced once; there is no
//! automatic retry.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::api_backend::{encode_image_base64, DEFAULT_LANGUAGE_HINTS};
use super::backend::{RecognitionError, RecognizerType, TextRecognizer};
use crate::models::{DetectedText, ImageHandle, DEFAULT_LANGUAGE};

/// Public Vision API endpoint.
pub const DEFAULT_VISION_ENDPOINT: &str = "https://vision.googleapis.com/v1/images:annotate";

/// Maximum number of response bytes quoted in error messages.
const MAX_ERROR_BODY: usize = 512;

/// Settings for the Vision client.
#[derive(Debug, Clone)]
pub struct VisionConfig {
    pub endpoint: String,
    pub api_key: Option<String>,
    pub language_hints: Vec<String>,
    pub timeout: Duration,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_VISION_ENDPOINT.to_string(),
            api_key: None,
            language_hints: DEFAULT_LANGUAGE_HINTS.iter().map(|s| s.to_string()).collect(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Vision OCR client.
pub struct VisionClient {
    config: VisionConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct AnnotateRequest {
    requests: Vec<AnnotateImageRequest>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageRequest {
    image: VisionImage,
    features: Vec<VisionFeature>,
    image_context: ImageContext,
}

#[derive(Debug, Serialize)]
struct VisionImage {
    content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VisionFeature {
    #[serde(rename = "type")]
    feature_type: &'static str,
    max_results: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageContext {
    language_hints: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<AnnotateImageResponse>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnnotateImageResponse {
    full_text_annotation: Option<FullTextAnnotation>,
    #[serde(default)]
    text_annotations: Vec<EntityAnnotation>,
    error: Option<VisionStatus>,
}

#[derive(Debug, Deserialize)]
struct FullTextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct EntityAnnotation {
    locale: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VisionStatus {
    #[serde(default)]
    message: String,
}

impl VisionClient {
    /// Create a client. Fails only if the HTTP client cannot be built.
    pub fn new(config: VisionConfig) -> Result<Self, RecognitionError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("lectora/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RecognitionError::Transport {
                status: None,
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &VisionConfig {
        &self.config
    }

    fn build_request(&self, content: String) -> AnnotateRequest {
        AnnotateRequest {
            requests: vec![AnnotateImageRequest {
                image: VisionImage { content },
                features: vec![VisionFeature {
                    feature_type: "TEXT_DETECTION",
                    max_results: 1,
                }],
                image_context: ImageContext {
                    language_hints: self.config.language_hints.clone(),
                },
            }],
        }
    }
}

#[async_trait]
impl TextRecognizer for VisionClient {
    fn recognizer_type(&self) -> RecognizerType {
        RecognizerType::GoogleVision
    }

    fn is_available(&self) -> bool {
        self.config.api_key.is_some()
    }

    fn availability_hint(&self) -> String {
        if self.config.api_key.is_none() {
            "VISION_API_KEY not set. Create a key for the Cloud Vision API at \
             https://console.cloud.google.com/apis/credentials"
                .to_string()
        } else {
            format!("Google Vision is available ({})", self.config.endpoint)
        }
    }

    async fn detect_text(&self, image: &ImageHandle) -> Result<DetectedText, RecognitionError> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| RecognitionError::Configuration("VISION_API_KEY not set".to_string()))?;

        let (content, mime_type) = encode_image_base64(image).await?;
        debug!(
            "Vision: sending {} ({}, {} base64 bytes)",
            image.path().display(),
            mime_type,
            content.len()
        );

        let request = self.build_request(content);
        let start = Instant::now();
        let response = self
            .client
            .post(&self.config.endpoint)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await
            .map_err(|e| RecognitionError::Transport {
                status: None,
                message: format!("Vision request failed: {}", e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(MAX_ERROR_BODY).collect();
            warn!("Vision API returned {}", status);
            return Err(RecognitionError::Transport {
                status: Some(status.as_u16()),
                message: format!("Vision API error ({}): {}", status.as_u16(), body.trim()),
            });
        }

        let body = response.text().await.map_err(|e| RecognitionError::Transport {
            status: Some(status.as_u16()),
            message: format!("Failed to read Vision response: {}", e),
        })?;
        debug!("Vision: response in {:?}", start.elapsed());

        parse_response(&body)
    }
}

/// Turn a 2xx response body into detected text.
fn parse_response(body: &str) -> Result<DetectedText, RecognitionError> {
    let parsed: AnnotateResponse = serde_json::from_str(body)
        .map_err(|e| RecognitionError::InvalidResponse(e.to_string()))?;

    let Some(first) = parsed.responses.into_iter().next() else {
        return Ok(DetectedText::nothing_found());
    };

    if let Some(error) = first.error {
        return Err(RecognitionError::Service(error.message));
    }

    match first.full_text_annotation {
        Some(annotation) => {
            let language = first
                .text_annotations
                .into_iter()
                .next()
                .and_then(|a| a.locale)
                .filter(|l| !l.is_empty())
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());
            Ok(DetectedText::new(annotation.text, language))
        }
        None => Ok(DetectedText::nothing_found()),
    }
}
