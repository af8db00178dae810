//! Configuration management for lectora.
//!
//! Settings come from three layers, later ones winning: built-in defaults, a
//! config file (`lectora.toml`, `.yaml` or `.json`) and environment
//! variables.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};

use crate::cache::DEFAULT_MAX_CACHE_BYTES;
use crate::camera::{default_camera_args, CaptureOptions, DEFAULT_CAMERA_PROGRAM};
use crate::normalize::{DEFAULT_MAX_EDGE, DEFAULT_QUALITY};
use crate::ocr::VisionConfig;
use crate::speech::{SpeechEngineType, VoiceSettings, DEFAULT_SPEECH_PROGRAM};

/// Base name of config files.
const CONFIG_NAME: &str = "lectora";

/// Environment variable holding the Vision API key.
pub const VISION_API_KEY_ENV: &str = "VISION_API_KEY";

/// Environment variable overriding the cache directory.
pub const CACHE_DIR_ENV: &str = "LECTORA_CACHE_DIR";

/// Effective application settings.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory of cached normalized images.
    pub cache_dir: PathBuf,
    /// Cache size ceiling; the whole cache is purged when exceeded.
    pub cache_max_bytes: u64,
    /// Scratch directory for raw captures and normalizer output.
    pub work_dir: PathBuf,
    pub max_edge: u32,
    pub quality: f32,
    pub vision: VisionConfig,
    pub speech_engine: SpeechEngineType,
    pub speech_program: String,
    pub voice: VoiceSettings,
    pub camera_program: String,
    pub camera_args: Vec<String>,
    pub capture: CaptureOptions,
}

impl Default for Settings {
    fn default() -> Self {
        let cache_dir = dirs::cache_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_NAME)
            .join("images");

        Self {
            cache_dir,
            cache_max_bytes: DEFAULT_MAX_CACHE_BYTES,
            work_dir: std::env::temp_dir().join(CONFIG_NAME),
            max_edge: DEFAULT_MAX_EDGE,
            quality: DEFAULT_QUALITY,
            vision: VisionConfig::default(),
            speech_engine: SpeechEngineType::Command,
            speech_program: DEFAULT_SPEECH_PROGRAM.to_string(),
            voice: VoiceSettings::default(),
            camera_program: DEFAULT_CAMERA_PROGRAM.to_string(),
            camera_args: default_camera_args(),
            capture: CaptureOptions::default(),
        }
    }
}

impl Settings {
    /// Directory raw captures are written to.
    pub fn capture_dir(&self) -> PathBuf {
        self.work_dir.join("captures")
    }

    /// Directory the normalizer writes into.
    pub fn normalized_dir(&self) -> PathBuf {
        self.work_dir.join("normalized")
    }

    /// Human-readable summary with secrets redacted.
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        vec![
            ("cache.dir", self.cache_dir.display().to_string()),
            ("cache.max_bytes", self.cache_max_bytes.to_string()),
            ("work_dir", self.work_dir.display().to_string()),
            ("normalize.max_edge", self.max_edge.to_string()),
            ("normalize.quality", self.quality.to_string()),
            ("vision.endpoint", self.vision.endpoint.clone()),
            ("vision.api_key", redact(self.vision.api_key.as_deref())),
            ("vision.language_hints", self.vision.language_hints.join(",")),
            ("vision.timeout_secs", self.vision.timeout.as_secs().to_string()),
            ("speech.engine", self.speech_engine.to_string()),
            ("speech.program", self.speech_program.clone()),
            ("speech.pitch", self.voice.pitch.to_string()),
            ("speech.rate", self.voice.rate.to_string()),
            ("camera.program", self.camera_program.clone()),
            ("camera.args", self.camera_args.join(" ")),
            (
                "camera.aspect",
                format!("{}:{}", self.capture.aspect.0, self.capture.aspect.1),
            ),
            ("camera.quality", self.capture.quality.to_string()),
        ]
    }
}

fn redact(secret: Option<&str>) -> String {
    match secret {
        None | Some("") => "(not set)".to_string(),
        Some(s) if s.chars().count() <= 4 => "****".to_string(),
        Some(s) => {
            let tail: String = s.chars().skip(s.chars().count() - 4).collect();
            format!("****{}", tail)
        }
    }
}

/// Cache section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<u64>,
}

/// Normalizer section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NormalizeSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_edge: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<f32>,
}

/// Recognition service section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisionSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Prefer the `VISION_API_KEY` environment variable over this.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language_hints: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

/// Speech section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpeechSection {
    /// `command` or `log`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pitch: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<f32>,
}

/// Camera section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CameraSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program: Option<String>,
    /// Arguments; may use `{output}`, `{quality}` and `{aspect}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality: Option<f32>,
    /// Aspect ratio as `W:H`, e.g. `4:3`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aspect: Option<String>,
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_dir: Option<String>,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub normalize: NormalizeSection,
    #[serde(default)]
    pub vision: VisionSection,
    #[serde(default)]
    pub speech: SpeechSection,
    #[serde(default)]
    pub camera: CameraSection,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Discovers `lectora` config files in the standard locations; the file
    /// found is then parsed with serde. No file means defaults.
    pub async fn load() -> anyhow::Result<Self> {
        match prefer::load(CONFIG_NAME).await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => {
                    let path = path.to_path_buf();
                    tracing::debug!("Discovered config at {}", path.display());
                    Self::load_from_path(&path).await
                }
                None => Ok(Self::default()),
            },
            Err(e) => {
                tracing::debug!("No config file discovered: {}", e);
                Ok(Self::default())
            }
        }
    }

    /// Load configuration from a specific file path.
    /// The format is chosen by extension; anything unknown is read as JSON.
    pub async fn load_from_path(path: &Path) -> anyhow::Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

        let mut config: Config = match ext {
            "toml" => toml::from_str(&contents).context("Failed to parse TOML config")?,
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents).context("Failed to parse YAML config")?
            }
            _ => serde_json::from_str(&contents).context("Failed to parse JSON config")?,
        };

        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path relative to the config file, expanding `~`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply every value present in this config over `settings`.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) -> anyhow::Result<()> {
        if let Some(ref work_dir) = self.work_dir {
            settings.work_dir = self.resolve_path(work_dir, base_dir);
        }

        if let Some(ref dir) = self.cache.dir {
            settings.cache_dir = self.resolve_path(dir, base_dir);
        }
        if let Some(max_bytes) = self.cache.max_bytes {
            settings.cache_max_bytes = max_bytes;
        }

        if let Some(max_edge) = self.normalize.max_edge {
            settings.max_edge = max_edge;
        }
        if let Some(quality) = self.normalize.quality {
            settings.quality = quality;
        }

        if let Some(ref endpoint) = self.vision.endpoint {
            settings.vision.endpoint = endpoint.clone();
        }
        if let Some(ref key) = self.vision.api_key {
            settings.vision.api_key = Some(key.clone()).filter(|k| !k.is_empty());
        }
        if let Some(ref hints) = self.vision.language_hints {
            settings.vision.language_hints = hints.clone();
        }
        if let Some(secs) = self.vision.timeout_secs {
            settings.vision.timeout = Duration::from_secs(secs);
        }

        if let Some(ref engine) = self.speech.engine {
            settings.speech_engine = SpeechEngineType::from_str(engine)
                .with_context(|| format!("Unknown speech engine '{}'", engine))?;
        }
        if let Some(ref program) = self.speech.program {
            settings.speech_program = program.clone();
        }
        if let Some(pitch) = self.speech.pitch {
            settings.voice.pitch = pitch;
        }
        if let Some(rate) = self.speech.rate {
            settings.voice.rate = rate;
        }

        if let Some(ref program) = self.camera.program {
            settings.camera_program = program.clone();
        }
        if let Some(ref args) = self.camera.args {
            settings.camera_args = args.clone();
        }
        if let Some(quality) = self.camera.quality {
            settings.capture.quality = quality;
        }
        if let Some(ref aspect) = self.camera.aspect {
            settings.capture.aspect = parse_aspect(aspect)?;
        }

        Ok(())
    }
}

/// Parse an aspect ratio written as `W:H`.
pub fn parse_aspect(value: &str) -> anyhow::Result<(u32, u32)> {
    let Some((w, h)) = value.split_once(':') else {
        bail!("Invalid aspect ratio '{}', expected W:H", value);
    };
    let w: u32 = w
        .trim()
        .parse()
        .with_context(|| format!("Invalid aspect width in '{}'", value))?;
    let h: u32 = h
        .trim()
        .parse()
        .with_context(|| format!("Invalid aspect height in '{}'", value))?;
    if w == 0 || h == 0 {
        bail!("Aspect ratio '{}' must be non-zero", value);
    }
    Ok((w, h))
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file (`--config`).
    pub config_path: Option<PathBuf>,
}

/// Apply environment variable overrides.
fn apply_env_overrides(settings: &mut Settings) {
    if let Some(key) = std::env::var(VISION_API_KEY_ENV)
        .ok()
        .filter(|s| !s.is_empty())
    {
        tracing::debug!("Using {} from environment", VISION_API_KEY_ENV);
        settings.vision.api_key = Some(key);
    }

    if let Some(dir) = std::env::var(CACHE_DIR_ENV).ok().filter(|s| !s.is_empty()) {
        tracing::debug!("Using {} from environment: {}", CACHE_DIR_ENV, dir);
        settings.cache_dir = PathBuf::from(shellexpand::tilde(&dir).as_ref());
    }
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
pub async fn load_settings_with_options(options: LoadOptions) -> anyhow::Result<(Settings, Config)> {
    let path = match options.config_path {
        Some(path) => {
            if !path.is_file() {
                bail!("Config file not found: {}", path.display());
            }
            Some(path)
        }
        None => None,
    };

    let config = match path {
        Some(ref path) => {
            tracing::debug!("Loading config from {}", path.display());
            Config::load_from_path(path).await?
        }
        None => Config::load().await?,
    };

    let mut settings = Settings::default();
    let base_dir = config
        .base_dir()
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
    config.apply_to_settings(&mut settings, &base_dir)?;
    apply_env_overrides(&mut settings);

    Ok((settings, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_load_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lectora.toml");
        std::fs::write(
            &path,
            r#"
work_dir = "scratch"

[cache]
dir = "cache"
max_bytes = 1024

[normalize]
max_edge = 640

[vision]
api_key = "abc123456"
language_hints = ["en"]
timeout_secs = 5

[speech]
engine = "log"
rate = 1.5

[camera]
aspect = "16:9"
"#,
        )
        .unwrap();

        let config = Config::load_from_path(&path).await.unwrap();
        let mut settings = Settings::default();
        config
            .apply_to_settings(&mut settings, &config.base_dir().unwrap())
            .unwrap();

        assert_eq!(settings.work_dir, dir.path().join("scratch"));
        assert_eq!(settings.cache_dir, dir.path().join("cache"));
        assert_eq!(settings.cache_max_bytes, 1024);
        assert_eq!(settings.max_edge, 640);
        assert_eq!(settings.quality, DEFAULT_QUALITY);
        assert_eq!(settings.vision.api_key.as_deref(), Some("abc123456"));
        assert_eq!(settings.vision.language_hints, vec!["en"]);
        assert_eq!(settings.vision.timeout, Duration::from_secs(5));
        assert_eq!(settings.speech_engine, SpeechEngineType::Log);
        assert_eq!(settings.voice.rate, 1.5);
        assert_eq!(settings.capture.aspect, (16, 9));
    }

    #[tokio::test]
    async fn test_load_yaml_and_json() {
        let dir = tempdir().unwrap();
        let yaml = dir.path().join("lectora.yaml");
        std::fs::write(&yaml, "cache:\n  max_bytes: 10\n").unwrap();
        let json = dir.path().join("lectora.json");
        std::fs::write(&json, r#"{"normalize": {"quality": 0.5}}"#).unwrap();

        assert_eq!(Config::load_from_path(&yaml).await.unwrap().cache.max_bytes, Some(10));
        assert_eq!(Config::load_from_path(&json).await.unwrap().normalize.quality, Some(0.5));
    }

    #[tokio::test]
    async fn test_unknown_speech_engine_is_rejected() {
        let config = Config {
            speech: SpeechSection {
                engine: Some("kazoo".into()),
                ..Default::default()
            },
            ..Default::default()
        };
        let mut settings = Settings::default();
        assert!(config.apply_to_settings(&mut settings, Path::new("/")).is_err());
    }

    #[test]
    fn test_parse_aspect() {
        assert_eq!(parse_aspect("4:3").unwrap(), (4, 3));
        assert_eq!(parse_aspect(" 16 : 9 ").unwrap(), (16, 9));
        assert!(parse_aspect("4x3").is_err());
        assert!(parse_aspect("0:3").is_err());
    }

    #[tokio::test]
    async fn test_discovered_config_is_a_lectora_file() {
        let config = Config::load().await.unwrap();
        if let Some(path) = config.source_path {
            assert!(path.is_file());
            let stem = path.file_stem().and_then(|s| s.to_str()).unwrap();
            assert!(stem.starts_with(CONFIG_NAME));
        }
    }

    #[tokio::test]
    async fn test_explicit_config_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("custom.yaml");
        std::fs::write(&path, "normalize:\n  max_edge: 320\n").unwrap();

        let (settings, config) = load_settings_with_options(LoadOptions {
            config_path: Some(path.clone()),
        })
        .await
        .unwrap();
        assert_eq!(config.source_path, Some(path));
        assert_eq!(settings.max_edge, 320);

        let missing = load_settings_with_options(LoadOptions {
            config_path: Some(dir.path().join("nope.toml")),
        })
        .await;
        assert!(missing.is_err());
    }

    #[test]
    fn test_redacted_key() {
        assert_eq!(redact(None), "(not set)");
        assert_eq!(redact(Some("abc")), "****");
        assert_eq!(redact(Some("abcdef1234")), "****1234");
    }

    #[test]
    fn test_resolve_path() {
        let config = Config::default();
        let base = Path::new("/etc/lectora");
        assert_eq!(config.resolve_path("/abs", base), PathBuf::from("/abs"));
        assert_eq!(config.resolve_path("rel", base), PathBuf::from("/etc/lectora/rel"));
    }
}
