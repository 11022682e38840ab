//! Queue and loop-mode type definitions

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Why the queue changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum QueueChangeTrigger {
    UserEnqueue,
    UserDequeue,
    UserReorder,
    Shuffle,
    SongCompletion,
    SongFailure,
    Stop,
}

impl std::fmt::Display for QueueChangeTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueChangeTrigger::UserEnqueue => write!(f, "UserEnqueue"),
            QueueChangeTrigger::UserDequeue => write!(f, "UserDequeue"),
            QueueChangeTrigger::UserReorder => write!(f, "UserReorder"),
            QueueChangeTrigger::Shuffle => write!(f, "Shuffle"),
            QueueChangeTrigger::SongCompletion => write!(f, "SongCompletion"),
            QueueChangeTrigger::SongFailure => write!(f, "SongFailure"),
            QueueChangeTrigger::Stop => write!(f, "Stop"),
        }
    }
}

/// Loop policy shorthand covering the common flag combinations
///
/// `Track` holds the current song, `Queue` recycles finished songs to the
/// tail of the pending queue. Combinations outside these three are reachable
/// only by toggling the flags individually.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoopMode {
    #[default]
    Off,
    Track,
    Queue,
}

impl LoopMode {
    /// Flag pair as `(loop_current, loop_queue)`
    pub fn flags(self) -> (bool, bool) {
        match self {
            LoopMode::Off => (false, false),
            LoopMode::Track => (true, false),
            LoopMode::Queue => (false, true),
        }
    }
}

impl std::fmt::Display for LoopMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopMode::Off => write!(f, "off"),
            LoopMode::Track => write!(f, "track"),
            LoopMode::Queue => write!(f, "queue"),
        }
    }
}

impl FromStr for LoopMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Ok(LoopMode::Off),
            "track" | "song" => Ok(LoopMode::Track),
            "queue" => Ok(LoopMode::Queue),
            other => Err(format!("unknown loop mode '{}'", other)),
        }
    }
}
