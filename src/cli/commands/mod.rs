//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod cache;
mod config_cmd;
mod detect;
mod read;
mod say;
mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use lectora::config::{load_settings_with_options, LoadOptions};

#[derive(Parser)]
#[command(name = "lectora")]
#[command(about = "Capture printed text with a camera and read it aloud")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Capture once, recognize the text and read it aloud
    Read {
        /// Use this image instead of running the camera command
        image: Option<PathBuf>,
        /// Do not speak the result
        #[arg(long)]
        no_speech: bool,
        /// Output the resulting state as JSON
        #[arg(long)]
        json: bool,
    },

    /// Interactive session: capture, replay, clear, share from stdin
    Session {
        /// Use this image for every capture instead of the camera command
        #[arg(short, long)]
        image: Option<PathBuf>,
        /// Do not speak results
        #[arg(long)]
        no_speech: bool,
    },

    /// Normalize and recognize an image without caching or speaking
    Detect {
        image: PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Speak text through the configured speech engine
    Say {
        text: String,
        /// Language code of the text
        #[arg(short, long, default_value = "es")]
        lang: String,
    },

    /// Inspect or clear the image cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Show cache size and ceiling
    Stats,
    /// List cached images
    List,
    /// Delete every cached image
    Clear,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the effective settings
    Show,
    /// Print the config file in use
    Path,
}

/// Run the CLI.
pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = LoadOptions {
        config_path: cli.config,
    };
    let (settings, config) = load_settings_with_options(options).await?;

    match cli.command {
        Commands::Read {
            image,
            no_speech,
            json,
        } => read::cmd_read(&settings, image.as_deref(), no_speech, json).await,
        Commands::Session { image, no_speech } => {
            session::cmd_session(&settings, image.as_deref(), no_speech).await
        }
        Commands::Detect { image, json } => detect::cmd_detect(&settings, &image, json).await,
        Commands::Say { text, lang } => say::cmd_say(&settings, &text, &lang).await,
        Commands::Cache { command } => match command {
            CacheCommands::Stats => cache::cmd_cache_stats(&settings).await,
            CacheCommands::List => cache::cmd_cache_list(&settings).await,
            CacheCommands::Clear => cache::cmd_cache_clear(&settings).await,
        },
        Commands::Config { command } => match command {
            ConfigCommands::Show => config_cmd::cmd_config_show(&settings, &config),
            ConfigCommands::Path => config_cmd::cmd_config_path(&config),
        },
    }
}
