//! Single-utterance playback on top of a [`SpeechEngine`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tracing::{debug, warn};

use super::engine::{SpeechEngine, SpeechError, SpeechEvent, Utterance, VoiceSettings};
use crate::models::PlaybackState;

/// Non-fatal playback problem, shown to the user as a banner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackNotice {
    pub text: String,
    pub message: String,
}

/// Serializes speech requests so at most one utterance is audible.
///
/// Each `speak` call supersedes the previous one: the in-flight utterance is
/// stopped before the new one starts, and completion events from superseded
/// utterances are ignored.
pub struct PlaybackController {
    engine: Arc<dyn SpeechEngine>,
    voice: VoiceSettings,
    state: Arc<watch::Sender<PlaybackState>>,
    /// Bumped for every utterance; events from older generations are stale.
    generation: Arc<AtomicU64>,
    notices: broadcast::Sender<PlaybackNotice>,
    op_guard: Mutex<()>,
}

impl PlaybackController {
    pub fn new(engine: Arc<dyn SpeechEngine>, voice: VoiceSettings) -> Self {
        let (state, _) = watch::channel(PlaybackState::Silent);
        let (notices, _) = broadcast::channel(16);
        Self {
            engine,
            voice,
            state: Arc::new(state),
            generation: Arc::new(AtomicU64::new(0)),
            notices,
            op_guard: Mutex::new(()),
        }
    }

    /// Current playback state.
    pub fn state(&self) -> PlaybackState {
        self.state.borrow().clone()
    }

    /// Watch playback state changes.
    pub fn subscribe(&self) -> watch::Receiver<PlaybackState> {
        self.state.subscribe()
    }

    /// Receive synthesis errors as they happen.
    pub fn notices(&self) -> broadcast::Receiver<PlaybackNotice> {
        self.notices.subscribe()
    }

    /// Speak `text`, replacing whatever is playing.
    ///
    /// Returns once the new utterance has started. An error here means the
    /// engine refused to start; it is also published as a notice.
    pub async fn speak(&self, text: &str, language: &str) -> Result<(), SpeechError> {
        let _guard = self.op_guard.lock().await;

        let was_speaking = self.state.borrow().is_speaking();
        if was_speaking || self.engine.is_speaking().await {
            debug!("Stopping current utterance before speaking again");
            self.generation.fetch_add(1, Ordering::SeqCst);
            if let Err(e) = self.engine.stop().await {
                warn!("Failed to stop speech engine: {}", e);
            }
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_replace(PlaybackState::Speaking {
            text: text.to_string(),
            language_code: language.to_string(),
        });

        let utterance = Utterance {
            text: text.to_string(),
            language: language.to_string(),
            voice: self.voice,
        };
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        if let Err(e) = self.engine.speak(&utterance, events_tx).await {
            warn!("Speech engine failed to start: {}", e);
            self.finish(generation);
            let _ = self.notices.send(PlaybackNotice {
                text: text.to_string(),
                message: e.to_string(),
            });
            return Err(e);
        }

        tokio::spawn(track_utterance(
            events_rx,
            generation,
            text.to_string(),
            self.generation.clone(),
            self.state.clone(),
            self.notices.clone(),
        ));
        Ok(())
    }

    /// Stop playback and force `Silent`.
    pub async fn stop(&self) -> Result<(), SpeechError> {
        let _guard = self.op_guard.lock().await;
        self.generation.fetch_add(1, Ordering::SeqCst);
        let result = self.engine.stop().await;
        self.state.send_replace(PlaybackState::Silent);
        result
    }

    /// Wait until nothing is playing.
    pub async fn wait_until_silent(&self) {
        let mut rx = self.state.subscribe();
        let _ = rx.wait_for(|s| !s.is_speaking()).await;
    }

    fn finish(&self, generation: u64) {
        if self.generation.load(Ordering::SeqCst) == generation {
            self.state.send_replace(PlaybackState::Silent);
        }
    }
}

/// Follow one utterance's events and return to `Silent` when it ends,
/// unless a newer utterance has taken over.
async fn track_utterance(
    mut events: mpsc::UnboundedReceiver<SpeechEvent>,
    generation: u64,
    text: String,
    current: Arc<AtomicU64>,
    state: Arc<watch::Sender<PlaybackState>>,
    notices: broadcast::Sender<PlaybackNotice>,
) {
    let mut failure = None;
    while let Some(event) = events.recv().await {
        match event {
            SpeechEvent::Started => debug!("Playback started"),
            SpeechEvent::Done | SpeechEvent::Stopped => {
                debug!("Playback finished: {:?}", event);
                break;
            }
            SpeechEvent::Error(message) => {
                warn!("Playback failed: {}", message);
                failure = Some(message);
                break;
            }
        }
    }

    if let Some(message) = failure {
        let _ = notices.send(PlaybackNotice { text, message });
    }

    if current.load(Ordering::SeqCst) == generation {
        state.send_replace(PlaybackState::Silent);
    }
}
