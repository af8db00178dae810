//! Speech engine abstraction.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

/// Errors from speech synthesis.
#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Speech engine not available: {0}")]
    NotAvailable(String),

    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Voice parameters. 1.0 is the engine's normal pitch and rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSettings {
    pub pitch: f32,
    pub rate: f32,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            pitch: 1.0,
            rate: 1.0,
        }
    }
}

/// One speech request.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub language: String,
    pub voice: VoiceSettings,
}

/// Progress reported by an engine for one utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    Started,
    /// Playback reached the end naturally.
    Done,
    /// Playback was cut short by `stop()`.
    Stopped,
    Error(String),
}

/// Channel an engine reports [`SpeechEvent`]s on.
pub type SpeechEvents = mpsc::UnboundedSender<SpeechEvent>;

/// Available engine types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpeechEngineType {
    /// External synthesizer command (espeak-ng compatible).
    Command,
    /// Writes utterances to the log instead of the speakers.
    Log,
}

impl SpeechEngineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeechEngineType::Command => "command",
            SpeechEngineType::Log => "log",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "command" | "espeak" | "espeak-ng" => Some(SpeechEngineType::Command),
            "log" | "none" => Some(SpeechEngineType::Log),
            _ => None,
        }
    }
}

impl std::fmt::Display for SpeechEngineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Platform speech capability.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Whether an utterance is currently audible.
    async fn is_speaking(&self) -> bool;

    /// Start speaking. Returns once playback has started; progress is
    /// reported on `events`.
    async fn speak(&self, utterance: &Utterance, events: SpeechEvents) -> Result<(), SpeechError>;

    /// Stop the current utterance. Returns once the engine has been told to
    /// stop. Stopping while silent is a no-op.
    async fn stop(&self) -> Result<(), SpeechError>;
}

/// Headless engine: logs each utterance and completes immediately.
#[derive(Debug, Default)]
pub struct LogSpeechEngine;

#[async_trait]
impl SpeechEngine for LogSpeechEngine {
    async fn is_speaking(&self) -> bool {
        false
    }

    async fn speak(&self, utterance: &Utterance, events: SpeechEvents) -> Result<(), SpeechError> {
        info!("[{}] {}", utterance.language, utterance.text);
        let _ = events.send(SpeechEvent::Started);
        let _ = events.send(SpeechEvent::Done);
        Ok(())
    }

    async fn stop(&self) -> Result<(), SpeechError> {
        Ok(())
    }
}
