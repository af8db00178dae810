//! Recognize an image without the capture pipeline.

use std::path::Path;

use lectora::config::Settings;
use lectora::models::ImageHandle;
use lectora::ocr::TextRecognizer;

use crate::cli::helpers::{build_normalizer, build_recognizer, print_detected, spinner};

pub async fn cmd_detect(settings: &Settings, image: &Path, json: bool) -> anyhow::Result<()> {
    let raw = ImageHandle::open(image)
        .await
        .map_err(|e| anyhow::anyhow!("Cannot open {}: {}", image.display(), e))?;
    let recognizer = build_recognizer(settings)?;

    let pb = spinner("Recognizing text...");
    let normalized = match build_normalizer(settings).normalize(&raw).await {
        Ok(normalized) => normalized,
        Err(e) => {
            pb.finish_and_clear();
            return Err(e.into());
        }
    };
    let result = recognizer.detect_text(&normalized.location).await;
    normalized.location.release().await;
    pb.finish_and_clear();

    let text = result?;
    if json {
        println!("{}", serde_json::to_string_pretty(&text)?);
    } else {
        print_detected(&text);
    }
    Ok(())
}
