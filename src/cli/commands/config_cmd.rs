//! Configuration management commands.

use console::style;

use lectora::config::{Config, Settings};

use crate::cli::icons::{arrow, warning};

/// Print the effective settings.
pub fn cmd_config_show(settings: &Settings, config: &Config) -> anyhow::Result<()> {
    match config.source_path {
        Some(ref path) => println!("{} {}", style("Config:").bold(), path.display()),
        None => println!("{} (defaults)", style("Config:").bold()),
    }
    let width = settings
        .describe()
        .iter()
        .map(|(key, _)| key.len())
        .max()
        .unwrap_or(0);
    for (key, value) in settings.describe() {
        println!("  {:width$}  {}", key, value, width = width);
    }
    Ok(())
}

/// Print the config file in use.
pub fn cmd_config_path(config: &Config) -> anyhow::Result<()> {
    if let Some(ref path) = config.source_path {
        println!("{}", path.display());
        return Ok(());
    }

    eprintln!(
        "{} No lectora config file (toml, yaml or json) found in the standard locations",
        warning()
    );
    eprintln!("  {} Pass one explicitly with --config <FILE>", arrow());
    Ok(())
}
