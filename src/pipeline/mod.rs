//! Capture pipeline: capture, normalize, cache, recognize, speak.
//!
//! The pipeline owns the authoritative [`PipelineState`] and the current
//! image. Only one capture-to-recognition sequence runs at a time; commands
//! that would interfere with it are rejected with [`PipelineError::Busy`].

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{watch, Mutex};
use tracing::{debug, info, warn};

use crate::cache::CacheStore;
use crate::camera::{Camera, CameraError, CaptureOptions, CaptureOutcome, PermissionStatus};
use crate::models::{DetectedText, ImageHandle, PipelineSnapshot, PipelineState};
use crate::normalize::{ImageNormalizer, NormalizeError};
use crate::ocr::{RecognitionError, TextRecognizer};
use crate::speech::PlaybackController;

/// Errors returned by pipeline commands.
///
/// Stage failures during processing are not returned here: they move the
/// pipeline into [`PipelineState::Error`].
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Pipeline is busy ({0})")]
    Busy(&'static str),

    #[error("Camera permission denied")]
    PermissionDenied,

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("No detected text available")]
    NotReady,
}

/// Failure of a processing stage, surfaced as the `Error` state message.
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("Could not process image: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Text recognition failed: {0}")]
    Recognition(#[from] RecognitionError),
}

struct Inner {
    state: PipelineState,
    current: Option<ImageHandle>,
}

pub struct CapturePipeline {
    camera: Arc<dyn Camera>,
    normalizer: ImageNormalizer,
    cache: Arc<CacheStore>,
    recognizer: Arc<dyn TextRecognizer>,
    playback: Arc<PlaybackController>,
    capture_options: CaptureOptions,
    inner: Mutex<Inner>,
    snapshots: watch::Sender<PipelineSnapshot>,
}

impl CapturePipeline {
    pub fn new(
        camera: Arc<dyn Camera>,
        normalizer: ImageNormalizer,
        cache: Arc<CacheStore>,
        recognizer: Arc<dyn TextRecognizer>,
        playback: Arc<PlaybackController>,
    ) -> Self {
        let (snapshots, _) = watch::channel(PipelineSnapshot::default());
        Self {
            camera,
            normalizer,
            cache,
            recognizer,
            playback,
            capture_options: CaptureOptions::default(),
            inner: Mutex::new(Inner {
                state: PipelineState::Idle,
                current: None,
            }),
            snapshots,
        }
    }

    pub fn with_capture_options(mut self, options: CaptureOptions) -> Self {
        self.capture_options = options;
        self
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> PipelineSnapshot {
        self.snapshots.borrow().clone()
    }

    pub fn state(&self) -> PipelineState {
        self.snapshots.borrow().state.clone()
    }

    /// Watch state changes.
    pub fn subscribe(&self) -> watch::Receiver<PipelineSnapshot> {
        self.snapshots.subscribe()
    }

    pub fn playback(&self) -> &Arc<PlaybackController> {
        &self.playback
    }

    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// Run one capture through the whole pipeline.
    ///
    /// Returns the resulting state. A cancelled capture returns the state
    /// held before the call; a denied permission or camera failure restores
    /// that state and returns an error.
    pub async fn capture(&self) -> Result<PipelineState, PipelineError> {
        let prior = {
            let mut inner = self.inner.lock().await;
            if inner.state.is_busy() {
                return Err(PipelineError::Busy(inner.state.as_str()));
            }
            let prior = inner.state.clone();
            self.transition(&mut inner, PipelineState::Capturing);
            prior
        };

        if self.camera.request_permission().await == PermissionStatus::Denied {
            info!("Camera permission denied");
            self.restore(prior).await;
            return Err(PipelineError::PermissionDenied);
        }

        let raw = match self.camera.capture(&self.capture_options).await {
            Ok(CaptureOutcome::Captured(raw)) => raw,
            Ok(CaptureOutcome::Cancelled) => {
                info!("Capture cancelled");
                return Ok(self.restore(prior).await);
            }
            Err(e) => {
                warn!("Capture failed: {}", e);
                self.restore(prior).await;
                return Err(e.into());
            }
        };

        {
            let mut inner = self.inner.lock().await;
            if let Some(previous) = inner.current.take() {
                previous.release().await;
            }
            inner.current = Some(raw.clone());
            self.transition(&mut inner, PipelineState::Processing);
        }

        let outcome = self.process(&raw).await;

        let mut inner = self.inner.lock().await;
        match outcome {
            Ok(text) => {
                self.transition(&mut inner, PipelineState::Ready(text.clone()));
                drop(inner);
                // Playback failures are reported as notices by the controller.
                if let Err(e) = self.playback.speak(&text.text, &text.language_code).await {
                    warn!("Playback failed: {}", e);
                }
                Ok(PipelineState::Ready(text))
            }
            Err(e) => {
                warn!("Processing failed: {}", e);
                let state = PipelineState::Error(e.to_string());
                self.transition(&mut inner, state.clone());
                Ok(state)
            }
        }
    }

    /// Return to `Idle`, stopping playback and deleting the current image.
    pub async fn clear(&self) -> Result<(), PipelineError> {
        let previous = {
            let mut inner = self.inner.lock().await;
            if inner.state.is_busy() {
                return Err(PipelineError::Busy(inner.state.as_str()));
            }
            let previous = inner.current.take();
            self.transition(&mut inner, PipelineState::Idle);
            previous
        };

        if let Err(e) = self.playback.stop().await {
            warn!("Failed to stop playback: {}", e);
        }
        if let Some(image) = previous {
            image.release().await;
        }
        Ok(())
    }

    /// Speak the current detected text again. Does not change state.
    pub async fn replay(&self) -> Result<(), PipelineError> {
        let text = self.ready_text().await?;
        if let Err(e) = self.playback.speak(&text.text, &text.language_code).await {
            warn!("Replay failed: {}", e);
        }
        Ok(())
    }

    /// Message for sharing the detected text.
    pub async fn share(&self) -> Result<String, PipelineError> {
        Ok(self.ready_text().await?.share_message())
    }

    /// Plain detected text, for the clipboard.
    pub async fn copy_text(&self) -> Result<String, PipelineError> {
        Ok(self.ready_text().await?.text)
    }

    async fn ready_text(&self) -> Result<DetectedText, PipelineError> {
        let inner = self.inner.lock().await;
        inner
            .state
            .detected_text()
            .cloned()
            .ok_or(PipelineError::NotReady)
    }

    /// normalize, admit, detect. Cache failures only log.
    async fn process(&self, raw: &ImageHandle) -> Result<DetectedText, ProcessingError> {
        let key = raw.file_name().map(str::to_string);

        let mut scratch = None;
        let upload = match self.cached(key.as_deref()).await {
            Some(hit) => {
                debug!("Cache hit for {}", hit.path().display());
                hit
            }
            None => {
                let normalized = self.normalizer.normalize(raw).await?;
                let location = normalized.location;
                let admitted = match key.as_deref() {
                    Some(key) => match self.cache.admit(key, &location).await {
                        Ok(cached) => Some(cached),
                        Err(e) => {
                            warn!("Cache admission failed, continuing uncached: {}", e);
                            None
                        }
                    },
                    None => None,
                };
                let upload = admitted.unwrap_or_else(|| location.clone());
                scratch = Some(location);
                upload
            }
        };

        let result = self.recognizer.detect_text(&upload).await;

        if let Some(scratch) = scratch {
            scratch.release().await;
        }
        Ok(result?)
    }

    async fn cached(&self, key: Option<&str>) -> Option<ImageHandle> {
        self.cache.resolve(key?).await
    }

    async fn restore(&self, prior: PipelineState) -> PipelineState {
        let mut inner = self.inner.lock().await;
        self.transition(&mut inner, prior.clone());
        prior
    }

    fn transition(&self, inner: &mut Inner, state: PipelineState) {
        info!("Pipeline {} -> {}", inner.state, state);
        inner.state = state;
        self.snapshots.send_replace(PipelineSnapshot {
            state: inner.state.clone(),
            image: inner.current.as_ref().map(|h| h.path().to_path_buf()),
        });
    }

    /// Path of the current image, if any.
    pub async fn current_image(&self) -> Option<PathBuf> {
        self.inner
            .lock()
            .await
            .current
            .as_ref()
            .map(|h| h.path().to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::FileCamera;
    use crate::ocr::RecognizerType;
    use crate::speech::{LogSpeechEngine, VoiceSettings};
    use async_trait::async_trait;
    use tempfile::tempdir;

    struct FixedRecognizer(DetectedText);

    #[async_trait]
    impl TextRecognizer for FixedRecognizer {
        fn recognizer_type(&self) -> RecognizerType {
            RecognizerType::GoogleVision
        }

        fn is_available(&self) -> bool {
            true
        }

        fn availability_hint(&self) -> String {
            String::new()
        }

        async fn detect_text(&self, _image: &ImageHandle) -> Result<DetectedText, RecognitionError> {
            Ok(self.0.clone())
        }
    }

    fn pipeline(dir: &std::path::Path, source: PathBuf) -> CapturePipeline {
        let playback = Arc::new(PlaybackController::new(
            Arc::new(LogSpeechEngine),
            VoiceSettings::default(),
        ));
        CapturePipeline::new(
            Arc::new(FileCamera::new(source, dir.join("captures"))),
            ImageNormalizer::new(dir.join("work")),
            Arc::new(CacheStore::new(dir.join("cache"), 1024 * 1024)),
            Arc::new(FixedRecognizer(DetectedText::new("HOLA", "es"))),
            playback,
        )
    }

    fn write_png(path: &std::path::Path) {
        image::RgbImage::from_pixel(40, 30, image::Rgb([200, 200, 200]))
            .save(path)
            .unwrap();
    }

    #[tokio::test]
    async fn test_commands_require_ready() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(dir.path(), dir.path().join("none.png"));

        assert!(matches!(pipeline.replay().await, Err(PipelineError::NotReady)));
        assert!(matches!(pipeline.share().await, Err(PipelineError::NotReady)));
        assert!(matches!(pipeline.copy_text().await, Err(PipelineError::NotReady)));
        pipeline.clear().await.unwrap();
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }

    #[tokio::test]
    async fn test_denied_restores_prior_state() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(dir.path(), dir.path().join("missing.png"));

        let err = pipeline.capture().await.unwrap_err();
        assert!(matches!(err, PipelineError::PermissionDenied));
        assert_eq!(pipeline.state(), PipelineState::Idle);
        assert!(pipeline.current_image().await.is_none());
    }

    #[tokio::test]
    async fn test_capture_share_and_copy() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("page.png");
        write_png(&source);
        let pipeline = pipeline(dir.path(), source);

        let state = pipeline.capture().await.unwrap();
        assert_eq!(state, PipelineState::Ready(DetectedText::new("HOLA", "es")));
        assert_eq!(pipeline.copy_text().await.unwrap(), "HOLA");
        assert_eq!(
            pipeline.share().await.unwrap(),
            "Texto detectado (es): HOLA"
        );

        let snapshot = pipeline.snapshot();
        assert_eq!(snapshot.image, pipeline.current_image().await);
        assert_eq!(pipeline.cache().entries().await.unwrap().len(), 1);

        // Normalized scratch file is gone once recognition finished
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("work"))
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
    }
}
