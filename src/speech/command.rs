//! Speech through an external synthesizer command.
//!
//! Defaults to `espeak-ng`, invoked as
//! `espeak-ng -v <language> -p <pitch> -s <words/min> -- <text>`.
//! Each utterance is a child process; stopping kills it.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::engine::{SpeechEngine, SpeechError, SpeechEvent, SpeechEvents, Utterance, VoiceSettings};

/// Default synthesizer program.
pub const DEFAULT_SPEECH_PROGRAM: &str = "espeak-ng";

/// espeak pitch at 1.0 (range 0-99).
const BASE_PITCH: f32 = 50.0;

/// espeak speed at 1.0, in words per minute.
const BASE_RATE_WPM: f32 = 175.0;

struct ActiveUtterance {
    cancel: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Speech engine backed by a synthesizer process.
pub struct CommandSpeechEngine {
    program: String,
    active: Arc<Mutex<Option<ActiveUtterance>>>,
}

impl CommandSpeechEngine {
    pub fn new() -> Self {
        Self::with_program(DEFAULT_SPEECH_PROGRAM)
    }

    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Check whether the synthesizer is on PATH.
    pub fn is_available(&self) -> bool {
        which::which(&self.program).is_ok()
    }

    fn build_args(utterance: &Utterance) -> Vec<String> {
        let (pitch, rate) = espeak_voice(&utterance.voice);
        vec![
            "-v".to_string(),
            utterance.language.clone(),
            "-p".to_string(),
            pitch.to_string(),
            "-s".to_string(),
            rate.to_string(),
            "--".to_string(),
            utterance.text.clone(),
        ]
    }
}

impl Default for CommandSpeechEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Map relative pitch/rate onto espeak's scales.
fn espeak_voice(voice: &VoiceSettings) -> (u32, u32) {
    let pitch = (BASE_PITCH * voice.pitch).round().clamp(0.0, 99.0) as u32;
    let rate = (BASE_RATE_WPM * voice.rate).round().clamp(80.0, 500.0) as u32;
    (pitch, rate)
}

#[async_trait]
impl SpeechEngine for CommandSpeechEngine {
    async fn is_speaking(&self) -> bool {
        self.active
            .lock()
            .await
            .as_ref()
            .is_some_and(|a| !a.task.is_finished())
    }

    async fn speak(&self, utterance: &Utterance, events: SpeechEvents) -> Result<(), SpeechError> {
        // Never let two processes talk over each other
        self.stop().await?;

        let mut child = Command::new(&self.program)
            .args(Self::build_args(utterance))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    SpeechError::NotAvailable(format!("{} not found (install espeak-ng)", self.program))
                } else {
                    SpeechError::Io(e)
                }
            })?;

        let (cancel_tx, cancel_rx) = oneshot::channel();
        let program = self.program.clone();
        let _ = events.send(SpeechEvent::Started);

        let task = tokio::spawn(async move {
            let outcome = tokio::select! {
                status = child.wait() => Some(status),
                _ = cancel_rx => None,
            };

            let event = match outcome {
                Some(Ok(status)) if status.success() => SpeechEvent::Done,
                Some(Ok(status)) => SpeechEvent::Error(format!("{} exited with {}", program, status)),
                Some(Err(e)) => SpeechEvent::Error(e.to_string()),
                None => {
                    if let Err(e) = child.kill().await {
                        warn!("Failed to kill {}: {}", program, e);
                    }
                    SpeechEvent::Stopped
                }
            };
            debug!("{} finished: {:?}", program, event);
            let _ = events.send(event);
        });

        *self.active.lock().await = Some(ActiveUtterance {
            cancel: cancel_tx,
            task,
        });
        Ok(())
    }

    async fn stop(&self) -> Result<(), SpeechError> {
        let active = self.active.lock().await.take();
        if let Some(active) = active {
            let _ = active.cancel.send(());
            let _ = active.task.await;
        }
        Ok(())
    }
}
