//! Bootstrap configuration loading and library root resolution
//!
//! Configuration is a single TOML file. A missing file is not fatal: the
//! loader logs a warning and continues with built-in defaults. A file that was
//! named explicitly must exist and parse.
//!
//! # Library root priority
//!
//! 1. Command-line argument
//! 2. Environment variable (`JUKEBOX_LIBRARY_ROOT`)
//! 3. TOML config file (`library_root`)
//! 4. OS-dependent default (`~/Music/jukebox` style)

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable consulted for the library root
pub const LIBRARY_ROOT_ENV: &str = "JUKEBOX_LIBRARY_ROOT";

/// Longest assumed length for songs without a known duration (one day)
pub const MAX_DEFAULT_SONG_SECONDS: u64 = 86_400;

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Folder scanned by the library resolver
    #[serde(default)]
    pub library_root: Option<PathBuf>,

    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub sink: SinkConfig,

    #[serde(default)]
    pub events: EventsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Per-session playback policy
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PlaybackConfig {
    /// Volume (0-100) a new session starts with
    #[serde(default = "default_volume")]
    pub default_volume: u8,

    /// Consecutive failed songs before a session gives up and goes idle
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

/// Simulated sink timing
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SinkConfig {
    /// Multiplier applied to song durations (0.01 plays a 3 minute song in ~2s)
    #[serde(default = "default_time_scale")]
    pub time_scale: f64,

    /// Playback length assumed for songs without a known duration
    #[serde(default = "default_song_seconds")]
    pub default_song_seconds: u64,
}

/// Event bus sizing
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EventsConfig {
    /// Events buffered per subscriber before the oldest are dropped
    #[serde(default = "default_event_capacity")]
    pub capacity: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_port() -> u16 {
    5750
}

fn default_volume() -> u8 {
    100
}

fn default_max_consecutive_failures() -> u32 {
    5
}

fn default_time_scale() -> f64 {
    1.0
}

fn default_song_seconds() -> u64 {
    180
}

fn default_event_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            library_root: None,
            playback: PlaybackConfig::default(),
            sink: SinkConfig::default(),
            events: EventsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            default_volume: default_volume(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            time_scale: default_time_scale(),
            default_song_seconds: default_song_seconds(),
        }
    }
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            capacity: default_event_capacity(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the scheduler cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.playback.default_volume > 100 {
            return Err(Error::Config(format!(
                "playback.default_volume must be 0-100, got {}",
                self.playback.default_volume
            )));
        }
        if self.playback.max_consecutive_failures == 0 {
            return Err(Error::Config(
                "playback.max_consecutive_failures must be at least 1".to_string(),
            ));
        }
        if !(self.sink.time_scale.is_finite() && self.sink.time_scale > 0.0) {
            return Err(Error::Config(format!(
                "sink.time_scale must be positive, got {}",
                self.sink.time_scale
            )));
        }
        if !(1..=MAX_DEFAULT_SONG_SECONDS).contains(&self.sink.default_song_seconds) {
            return Err(Error::Config(format!(
                "sink.default_song_seconds must be 1-{}, got {}",
                MAX_DEFAULT_SONG_SECONDS, self.sink.default_song_seconds
            )));
        }
        if self.events.capacity == 0 {
            return Err(Error::Config("events.capacity must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Load bootstrap configuration
///
/// With `explicit_path` set the file must exist. Without it the platform
/// config locations are searched and a miss falls back to defaults.
pub fn load_config(explicit_path: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit_path {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read config file {}: {}", path.display(), e))
        })?;
        info!("Loaded configuration from {}", path.display());
        return TomlConfig::from_toml_str(&content);
    }

    match find_config_file() {
        Some(path) => {
            let content = std::fs::read_to_string(&path)?;
            info!("Loaded configuration from {}", path.display());
            TomlConfig::from_toml_str(&content)
        }
        None => {
            warn!("No config file found, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Search the platform config locations for `jukebox/config.toml`
fn find_config_file() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("jukebox").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(unix) {
        let system_config = PathBuf::from("/etc/jukebox/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Library root resolution following the documented priority order
pub fn resolve_library_root(cli_arg: Option<&Path>, config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(LIBRARY_ROOT_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &config.library_root {
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_library_root()
}

/// OS-dependent default library folder
pub fn default_library_root() -> PathBuf {
    dirs::audio_dir()
        .or_else(|| dirs::home_dir().map(|d| d.join("Music")))
        .map(|d| d.join("jukebox"))
        .unwrap_or_else(|| PathBuf::from("./music"))
}
