//! Playback-related type definitions

use serde::{Deserialize, Serialize};

/// Transport state of one session's audio sink
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportState {
    /// Nothing producing audio and nothing current
    #[default]
    Idle,
    /// Current song is producing audio
    Playing,
    /// Current song is held by the sink
    Paused,
}

impl TransportState {
    /// Whether a song is loaded in the sink (playing or paused)
    pub fn is_active(&self) -> bool {
        matches!(self, TransportState::Playing | TransportState::Paused)
    }
}

impl std::fmt::Display for TransportState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportState::Idle => write!(f, "idle"),
            TransportState::Playing => write!(f, "playing"),
            TransportState::Paused => write!(f, "paused"),
        }
    }
}
