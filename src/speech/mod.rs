//! Speech synthesis and playback.
//!
//! [`SpeechEngine`] abstracts the platform synthesizer. The
//! [`PlaybackController`] sits on top of it and guarantees that at most one
//! utterance is audible, with the most recent request winning.

mod command;
mod controller;
mod engine;

pub use command::{CommandSpeechEngine, DEFAULT_SPEECH_PROGRAM};
pub use controller::{PlaybackController, PlaybackNotice};
pub use engine::{
    LogSpeechEngine, SpeechEngine, SpeechEngineType, SpeechError, SpeechEvent, SpeechEvents,
    Utterance, VoiceSettings,
};
