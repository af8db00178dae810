//! Cache inspection commands.

use console::style;

use lectora::cache::CacheStore;
use lectora::config::Settings;

use crate::cli::helpers::format_bytes;
use crate::cli::icons::{arrow, success, warning};

fn open_cache(settings: &Settings) -> CacheStore {
    CacheStore::new(&settings.cache_dir, settings.cache_max_bytes)
}

pub async fn cmd_cache_stats(settings: &Settings) -> anyhow::Result<()> {
    let cache = open_cache(settings);
    let entries = cache.entries().await?;
    let total = cache.total_size().await?;

    println!("{}", style("Image cache").bold());
    println!("  {} Directory: {}", arrow(), cache.dir().display());
    println!("  {} Entries:   {}", arrow(), entries.len());
    println!(
        "  {} Size:      {} of {}",
        arrow(),
        format_bytes(total),
        format_bytes(cache.max_bytes())
    );
    if total > cache.max_bytes() {
        println!(
            "  {} Over the ceiling; the next capture purges the cache",
            warning()
        );
    }
    Ok(())
}

pub async fn cmd_cache_list(settings: &Settings) -> anyhow::Result<()> {
    let entries = open_cache(settings).entries().await?;
    if entries.is_empty() {
        println!("Cache is empty");
        return Ok(());
    }
    for entry in entries {
        println!("{:>10}  {}", format_bytes(entry.size_bytes), entry.key);
    }
    Ok(())
}

pub async fn cmd_cache_clear(settings: &Settings) -> anyhow::Result<()> {
    let cache = open_cache(settings);
    let count = cache.entries().await?.len();
    cache.purge().await?;
    println!("{} Removed {} cached image(s)", success(), count);
    Ok(())
}
