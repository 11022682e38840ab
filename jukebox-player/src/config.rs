//! Player runtime settings derived from the bootstrap TOML config

use jukebox_common::config::{PlaybackConfig, TomlConfig};

use crate::audio::SimulatedSinkSettings;

/// Per-session playback policy handed to every new controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Volume (0-100) a new session starts with
    pub default_volume: u8,

    /// Failed songs in a row before a session gives up
    pub max_consecutive_failures: u32,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self::from(&PlaybackConfig::default())
    }
}

impl From<&PlaybackConfig> for ControllerSettings {
    fn from(config: &PlaybackConfig) -> Self {
        Self {
            default_volume: config.default_volume.min(100),
            max_consecutive_failures: config.max_consecutive_failures.max(1),
        }
    }
}

/// Everything the player binary needs from the loaded config
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    pub port: u16,
    pub controller: ControllerSettings,
    pub sink: SimulatedSinkSettings,
    pub event_capacity: usize,
}

impl From<&TomlConfig> for PlayerConfig {
    fn from(config: &TomlConfig) -> Self {
        Self {
            port: config.port,
            controller: ControllerSettings::from(&config.playback),
            sink: SimulatedSinkSettings::from(&config.sink),
            event_capacity: config.events.capacity,
        }
    }
}
