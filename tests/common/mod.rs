//! In-memory fakes of the camera, recognizer and speech capabilities.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;

use lectora::camera::{Camera, CameraError, CaptureOptions, CaptureOutcome, PermissionStatus};
use lectora::models::{DetectedText, ImageHandle};
use lectora::ocr::{RecognitionError, RecognizerType, TextRecognizer};
use lectora::speech::{SpeechEngine, SpeechError, SpeechEvent, SpeechEvents, Utterance};

/// Write a solid-color JPEG of the given size.
pub fn write_jpeg(path: &Path, width: u32, height: u32) {
    image::RgbImage::from_pixel(width, height, image::Rgb([230, 230, 230]))
        .save_with_format(path, image::ImageFormat::Jpeg)
        .unwrap();
}

#[derive(Debug, Clone)]
pub enum CameraMode {
    /// Copy `source` into the capture directory.
    Copy { source: PathBuf, name: Option<String> },
    Cancel,
    Deny,
    Fail,
}

/// Camera that follows a configurable script.
pub struct FakeCamera {
    mode: Mutex<CameraMode>,
    capture_dir: PathBuf,
    gate: Option<Arc<Notify>>,
    counter: AtomicUsize,
}

impl FakeCamera {
    pub fn new(mode: CameraMode, capture_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode: Mutex::new(mode),
            capture_dir: capture_dir.into(),
            gate: None,
            counter: AtomicUsize::new(0),
        }
    }

    /// Block each capture until the gate is notified.
    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_mode(&self, mode: CameraMode) {
        *self.mode.lock().unwrap() = mode;
    }
}

#[async_trait]
impl Camera for FakeCamera {
    async fn request_permission(&self) -> PermissionStatus {
        match *self.mode.lock().unwrap() {
            CameraMode::Deny => PermissionStatus::Denied,
            _ => PermissionStatus::Granted,
        }
    }

    async fn capture(&self, _options: &CaptureOptions) -> Result<CaptureOutcome, CameraError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let mode = self.mode.lock().unwrap().clone();
        match mode {
            CameraMode::Copy { source, name } => {
                std::fs::create_dir_all(&self.capture_dir)?;
                let n = self.counter.fetch_add(1, Ordering::SeqCst);
                let name = name.unwrap_or_else(|| format!("capture-{}.jpg", n));
                let target = self.capture_dir.join(name);
                std::fs::copy(&source, &target)?;
                Ok(CaptureOutcome::Captured(ImageHandle::open(target).await?))
            }
            CameraMode::Cancel => Ok(CaptureOutcome::Cancelled),
            CameraMode::Deny => Ok(CaptureOutcome::Cancelled),
            CameraMode::Fail => Err(CameraError::CaptureFailed("sensor offline".into())),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Reply {
    Text(DetectedText),
    Status(u16),
}

/// What the recognizer saw for one call.
#[derive(Debug, Clone)]
pub struct Upload {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
}

/// Recognizer returning a fixed reply and recording uploads.
pub struct FakeRecognizer {
    reply: Mutex<Reply>,
    uploads: Mutex<Vec<Upload>>,
    gate: Option<Arc<Notify>>,
}

impl FakeRecognizer {
    pub fn new(reply: Reply) -> Self {
        Self {
            reply: Mutex::new(reply),
            uploads: Mutex::new(Vec::new()),
            gate: None,
        }
    }

    pub fn text(text: &str, language: &str) -> Self {
        Self::new(Reply::Text(DetectedText::new(text, language)))
    }

    pub fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub fn set_reply(&self, reply: Reply) {
        *self.reply.lock().unwrap() = reply;
    }

    pub fn uploads(&self) -> Vec<Upload> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl TextRecognizer for FakeRecognizer {
    fn recognizer_type(&self) -> RecognizerType {
        RecognizerType::GoogleVision
    }

    fn is_available(&self) -> bool {
        true
    }

    fn availability_hint(&self) -> String {
        "fake".to_string()
    }

    async fn detect_text(&self, image: &ImageHandle) -> Result<DetectedText, RecognitionError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let (width, height) = image::image_dimensions(image.path())
            .map_err(|e| RecognitionError::InvalidResponse(e.to_string()))?;
        self.uploads.lock().unwrap().push(Upload {
            path: image.path().to_path_buf(),
            width,
            height,
        });

        match self.reply.lock().unwrap().clone() {
            Reply::Text(text) => Ok(text),
            Reply::Status(code) => Err(RecognitionError::Transport {
                status: Some(code),
                message: format!("Vision API error ({}): boom", code),
            }),
        }
    }
}

/// Speech engine that records calls and keeps speaking until stopped or
/// finished by the test.
#[derive(Default)]
pub struct RecordingSpeechEngine {
    log: Mutex<Vec<String>>,
    current: Mutex<Option<(String, SpeechEvents)>>,
    fail: Mutex<bool>,
}

impl RecordingSpeechEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `speak` fail to start. Later calls succeed again.
    pub fn fail_next(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|entry| entry.strip_prefix("speak ").map(str::to_string))
            .collect()
    }

    /// Text currently audible, if any.
    pub fn audible(&self) -> Option<String> {
        self.current.lock().unwrap().as_ref().map(|(text, _)| text.clone())
    }

    /// Let the current utterance end naturally.
    pub fn finish(&self) {
        if let Some((_, events)) = self.current.lock().unwrap().take() {
            let _ = events.send(SpeechEvent::Done);
        }
    }
}

#[async_trait]
impl SpeechEngine for RecordingSpeechEngine {
    async fn is_speaking(&self) -> bool {
        self.current.lock().unwrap().is_some()
    }

    async fn speak(&self, utterance: &Utterance, events: SpeechEvents) -> Result<(), SpeechError> {
        if std::mem::take(&mut *self.fail.lock().unwrap()) {
            return Err(SpeechError::Synthesis("voice unavailable".into()));
        }
        self.log
            .lock()
            .unwrap()
            .push(format!("speak {}", utterance.text));
        let _ = events.send(SpeechEvent::Started);
        *self.current.lock().unwrap() = Some((utterance.text.clone(), events));
        Ok(())
    }

    async fn stop(&self) -> Result<(), SpeechError> {
        self.log.lock().unwrap().push("stop".to_string());
        if let Some((_, events)) = self.current.lock().unwrap().take() {
            let _ = events.send(SpeechEvent::Stopped);
        }
        Ok(())
    }
}
