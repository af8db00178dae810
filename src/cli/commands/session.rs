//! Interactive session over stdin.
//!
//! Captures run in the background so `status` and `stop` stay responsive;
//! a second `capture` while one is in flight is rejected by the pipeline.

use std::path::Path;
use std::sync::Arc;

use console::style;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use lectora::config::Settings;
use lectora::pipeline::{CapturePipeline, PipelineError};

use crate::cli::helpers::{build_pipeline, print_notice, print_playback, print_state};
use crate::cli::icons::{arrow, error, success, warning};

const HELP: &str = "commands: capture, replay, clear, share, copy, status, stop, help, quit";

pub async fn cmd_session(
    settings: &Settings,
    image: Option<&Path>,
    no_speech: bool,
) -> anyhow::Result<()> {
    let pipeline = Arc::new(build_pipeline(settings, image, no_speech)?);

    let mut notices = pipeline.playback().notices();
    let banner = tokio::spawn(async move {
        while let Ok(notice) = notices.recv().await {
            print_notice(&notice);
        }
    });

    eprintln!("{} {}", style("lectora session").bold(), style(HELP).dim());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = line.trim().to_lowercase();
        debug!("Session command: {}", command);
        match command.as_str() {
            "" => continue,
            "capture" | "c" => start_capture(&pipeline),
            "replay" | "r" => report(pipeline.replay().await),
            "clear" => match pipeline.clear().await {
                Ok(()) => eprintln!("{} Cleared", success()),
                Err(e) => report::<()>(Err(e)),
            },
            "share" => match pipeline.share().await {
                Ok(message) => println!("{}", message),
                Err(e) => report::<()>(Err(e)),
            },
            "copy" => match pipeline.copy_text().await {
                Ok(text) => println!("{}", text),
                Err(e) => report::<()>(Err(e)),
            },
            "status" | "s" => {
                let snapshot = pipeline.snapshot();
                print_state(&snapshot.state);
                if let Some(image) = snapshot.image {
                    eprintln!("  {} Image: {}", arrow(), image.display());
                }
                print_playback(&pipeline.playback().state());
            }
            "stop" => {
                if let Err(e) = pipeline.playback().stop().await {
                    eprintln!("{} {}", error(), e);
                }
            }
            "help" | "?" => eprintln!("{}", HELP),
            "quit" | "exit" | "q" => break,
            other => eprintln!("{} Unknown command '{}'. {}", warning(), other, HELP),
        }
    }

    if let Err(e) = pipeline.playback().stop().await {
        debug!("Failed to stop playback on exit: {}", e);
    }
    if let Err(e) = pipeline.clear().await {
        eprintln!("{} Capture still running, leaving its image behind: {}", warning(), e);
    }
    banner.abort();
    Ok(())
}

fn start_capture(pipeline: &Arc<CapturePipeline>) {
    let pipeline = pipeline.clone();
    tokio::spawn(async move {
        match pipeline.capture().await {
            Ok(state) if state.detected_text().is_some() || state.error_message().is_some() => {
                print_state(&state)
            }
            Ok(_) => eprintln!("{} Capture cancelled", warning()),
            Err(e) => report::<()>(Err(e)),
        }
    });
}

fn report<T>(result: Result<T, PipelineError>) {
    if let Err(e) = result {
        match e {
            PipelineError::Busy(_) | PipelineError::NotReady => eprintln!("{} {}", warning(), e),
            other => eprintln!("{} {}", error(), other),
        }
    }
}
