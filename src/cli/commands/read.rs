//! One-shot capture through the full pipeline.

use std::path::Path;

use lectora::config::Settings;
use lectora::models::PipelineState;
use lectora::pipeline::PipelineError;

use crate::cli::helpers::{build_pipeline, print_notice, print_state, spinner};
use crate::cli::icons::warning;

pub async fn cmd_read(
    settings: &Settings,
    image: Option<&Path>,
    no_speech: bool,
    json: bool,
) -> anyhow::Result<()> {
    let pipeline = build_pipeline(settings, image, no_speech)?;
    let mut notices = pipeline.playback().notices();

    let pb = spinner("Capturing...");
    let mut updates = pipeline.subscribe();
    let progress = pb.clone();
    let watcher = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let processing = updates.borrow_and_update().state == PipelineState::Processing;
            if processing {
                progress.set_message("Recognizing text...");
            }
        }
    });

    let result = pipeline.capture().await;
    pb.finish_and_clear();
    watcher.abort();

    let state = match result {
        Ok(state) => state,
        Err(PipelineError::PermissionDenied) => {
            anyhow::bail!(
                "Camera access denied (is '{}' installed?)",
                settings.camera_program
            )
        }
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else if state == PipelineState::Idle {
        eprintln!("{} Capture cancelled", warning());
    } else {
        print_state(&state);
    }

    if state.detected_text().is_some() {
        pipeline.playback().wait_until_silent().await;
        while let Ok(notice) = notices.try_recv() {
            print_notice(&notice);
        }
    }

    // Captures are not kept between runs
    pipeline.clear().await?;

    if let Some(message) = state.error_message() {
        anyhow::bail!("{}", message);
    }
    Ok(())
}
