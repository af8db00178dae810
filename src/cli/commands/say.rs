//! Speak arbitrary text.

use lectora::config::Settings;

use crate::cli::helpers::{build_playback, print_notice};

pub async fn cmd_say(settings: &Settings, text: &str, lang: &str) -> anyhow::Result<()> {
    let playback = build_playback(settings, false);
    let mut notices = playback.notices();

    playback.speak(text, lang).await?;
    playback.wait_until_silent().await;

    if let Ok(notice) = notices.try_recv() {
        print_notice(&notice);
    }
    Ok(())
}
