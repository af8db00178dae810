//! Shared helper functions for CLI commands.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use lectora::cache::CacheStore;
use lectora::camera::{Camera, CommandCamera, FileCamera};
use lectora::config::Settings;
use lectora::models::{DetectedText, PipelineState, PlaybackState};
use lectora::normalize::ImageNormalizer;
use lectora::ocr::{TextRecognizer, VisionClient};
use lectora::pipeline::CapturePipeline;
use lectora::speech::{
    CommandSpeechEngine, LogSpeechEngine, PlaybackController, PlaybackNotice, SpeechEngine,
    SpeechEngineType,
};

use super::icons::{arrow, error, success, warning};

/// Camera for this run: a file when one is given, the capture command otherwise.
pub fn build_camera(settings: &Settings, image: Option<&Path>) -> Arc<dyn Camera> {
    match image {
        Some(path) => Arc::new(FileCamera::new(path, settings.capture_dir())),
        None => Arc::new(CommandCamera::new(
            settings.camera_program.clone(),
            settings.camera_args.clone(),
            settings.capture_dir(),
        )),
    }
}

/// Speech engine for this run. `silent` forces the log engine.
pub fn build_speech_engine(settings: &Settings, silent: bool) -> Arc<dyn SpeechEngine> {
    if silent {
        return Arc::new(LogSpeechEngine);
    }
    match settings.speech_engine {
        SpeechEngineType::Log => Arc::new(LogSpeechEngine),
        SpeechEngineType::Command => {
            let engine = CommandSpeechEngine::with_program(settings.speech_program.clone());
            if !engine.is_available() {
                eprintln!(
                    "{} Speech program '{}' not found; install espeak-ng or set speech.engine = \"log\"",
                    warning(),
                    engine.program()
                );
            }
            Arc::new(engine)
        }
    }
}

pub fn build_playback(settings: &Settings, silent: bool) -> Arc<PlaybackController> {
    Arc::new(PlaybackController::new(
        build_speech_engine(settings, silent),
        settings.voice,
    ))
}

pub fn build_normalizer(settings: &Settings) -> ImageNormalizer {
    ImageNormalizer::new(settings.normalized_dir())
        .with_max_edge(settings.max_edge)
        .with_quality(settings.quality)
}

pub fn build_recognizer(settings: &Settings) -> anyhow::Result<Arc<dyn TextRecognizer>> {
    let client = VisionClient::new(settings.vision.clone())?;
    if !client.is_available() {
        eprintln!("{} {}", warning(), client.availability_hint());
    }
    Ok(Arc::new(client))
}

/// Wire up the full pipeline from settings.
pub fn build_pipeline(
    settings: &Settings,
    image: Option<&Path>,
    silent: bool,
) -> anyhow::Result<CapturePipeline> {
    Ok(CapturePipeline::new(
        build_camera(settings, image),
        build_normalizer(settings),
        Arc::new(CacheStore::new(&settings.cache_dir, settings.cache_max_bytes)),
        build_recognizer(settings)?,
        build_playback(settings, silent),
    )
    .with_capture_options(settings.capture))
}

/// Spinner shown while a capture is processed.
pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Print the result card for a detected text.
pub fn print_detected(text: &DetectedText) {
    println!(
        "{} {}",
        success(),
        style(format!("Texto detectado ({})", text.language_code)).bold()
    );
    for line in text.text.lines() {
        println!("  {}", line);
    }
}

/// Print a pipeline state for the user.
pub fn print_state(state: &PipelineState) {
    match state {
        PipelineState::Ready(text) => print_detected(text),
        PipelineState::Error(message) => eprintln!("{} {}", error(), message),
        PipelineState::Idle => eprintln!("{} Idle", arrow()),
        other => eprintln!("{} {}", arrow(), other),
    }
}

pub fn print_playback(state: &PlaybackState) {
    match state {
        PlaybackState::Silent => eprintln!("  {} Playback: silent", arrow()),
        PlaybackState::Speaking { language_code, .. } => {
            eprintln!("  {} Playback: speaking ({})", arrow(), language_code)
        }
    }
}

/// Banner for a non-fatal playback problem.
pub fn print_notice(notice: &PlaybackNotice) {
    eprintln!(
        "{} Could not read text aloud: {}",
        warning(),
        style(&notice.message).dim()
    );
}

/// Format a byte count for display.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KiB", "MiB", "GiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
