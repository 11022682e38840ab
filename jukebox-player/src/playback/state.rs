//! Session status snapshot
//!
//! Published by the session worker on a `watch` channel after every event it
//! processes. Readers never touch worker state directly.

use jukebox_common::events::{LoopMode, TransportState};
use jukebox_common::Song;
use serde::Serialize;

/// Read-only view of one session
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub session: String,
    pub transport: TransportState,
    pub current: Option<Song>,
    pub previous: Option<Song>,
    pub pending: Vec<Song>,
    pub loop_current: bool,
    pub loop_queue: bool,

    /// 0-100
    pub volume: u8,

    /// Whether an audio sink is attached
    pub connected: bool,

    /// Requests still being resolved
    pub resolving: usize,

    /// Identifies the song the sink is playing; changes on every start
    #[serde(skip)]
    pub generation: Option<u64>,
}

impl SessionStatus {
    pub(crate) fn initial(session: String, volume: u8) -> Self {
        Self {
            session,
            transport: TransportState::Idle,
            current: None,
            previous: None,
            pending: Vec::new(),
            loop_current: false,
            loop_queue: false,
            volume,
            connected: false,
            resolving: 0,
            generation: None,
        }
    }

    /// Loop flags as a mode, when they correspond to one
    pub fn loop_mode(&self) -> Option<LoopMode> {
        match (self.loop_current, self.loop_queue) {
            (false, false) => Some(LoopMode::Off),
            (true, false) => Some(LoopMode::Track),
            (false, true) => Some(LoopMode::Queue),
            (true, true) => None,
        }
    }

    /// Sum of known durations of pending songs, in seconds
    pub fn pending_seconds(&self) -> u64 {
        self.pending
            .iter()
            .filter_map(|song| song.duration_seconds)
            .sum()
    }
}
