//! Playback controller scenarios against a recording speech engine.

mod common;

use std::sync::Arc;

use common::RecordingSpeechEngine;
use lectora::models::PlaybackState;
use lectora::speech::{PlaybackController, SpeechError, VoiceSettings};

fn controller() -> (Arc<RecordingSpeechEngine>, PlaybackController) {
    let engine = Arc::new(RecordingSpeechEngine::new());
    let controller = PlaybackController::new(engine.clone(), VoiceSettings::default());
    (engine, controller)
}

#[tokio::test]
async fn test_latest_request_wins() {
    let (engine, controller) = controller();

    controller.speak("A", "es").await.unwrap();
    controller.speak("B", "es").await.unwrap();

    assert_eq!(engine.log(), vec!["speak A", "stop", "speak B"]);
    assert_eq!(engine.audible().as_deref(), Some("B"));
    assert_eq!(
        controller.state(),
        PlaybackState::Speaking {
            text: "B".into(),
            language_code: "es".into()
        }
    );
}

#[tokio::test]
async fn test_superseded_completion_is_ignored() {
    let (engine, controller) = controller();

    controller.speak("A", "es").await.unwrap();
    controller.speak("B", "en").await.unwrap();
    // Let the stale tracker for "A" observe its Stopped event
    tokio::task::yield_now().await;
    assert!(controller.state().is_speaking());

    engine.finish();
    controller.wait_until_silent().await;
    assert_eq!(controller.state(), PlaybackState::Silent);
}

#[tokio::test]
async fn test_stop_forces_silent() {
    let (engine, controller) = controller();

    controller.speak("HOLA", "es").await.unwrap();
    controller.stop().await.unwrap();

    assert_eq!(controller.state(), PlaybackState::Silent);
    assert_eq!(engine.audible(), None);
    assert_eq!(engine.log(), vec!["speak HOLA", "stop"]);
}

#[tokio::test]
async fn test_synthesis_error_is_a_notice() {
    let (engine, controller) = controller();
    let mut notices = controller.notices();

    engine.fail_next();
    let err = controller.speak("HOLA", "es").await.unwrap_err();
    assert!(matches!(err, SpeechError::Synthesis(_)));
    assert_eq!(controller.state(), PlaybackState::Silent);

    let notice = notices.recv().await.unwrap();
    assert_eq!(notice.text, "HOLA");
    assert!(notice.message.contains("voice unavailable"));

    // The controller keeps working afterwards
    controller.speak("OTRA", "es").await.unwrap();
    assert_eq!(engine.spoken(), vec!["OTRA"]);
}
