//! Event types for the jukebox event system
//!
//! Provides the shared event definitions and the EventBus used by every
//! session worker to publish its transitions.

mod playback_types;
mod queue_types;

pub use playback_types::TransportState;
pub use queue_types::{LoopMode, QueueChangeTrigger};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::song::Song;

/// Jukebox event types
///
/// Every variant carries the session key it belongs to, so a single bus can
/// serve all sessions and subscribers filter by `session()`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JukeboxEvent {
    /// A session controller was created
    SessionOpened {
        session: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A session was disconnected and its controller discarded
    SessionClosed {
        session: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Transport state changed (Idle / Playing / Paused)
    TransportChanged {
        session: String,
        old_state: TransportState,
        new_state: TransportState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A song was handed to the sink and started
    SongStarted {
        session: String,
        song: Song,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A song left the sink without error
    SongCompleted {
        session: String,
        song: Song,
        /// false when the song ended because of a user skip
        completed: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A song failed to start or failed mid-playback and was passed over
    SongSkipped {
        session: String,
        song: Song,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Pending queue changed
    QueueChanged {
        session: String,
        pending: usize,
        trigger: QueueChangeTrigger,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session volume changed (0-100)
    VolumeChanged {
        session: String,
        old_volume: u8,
        new_volume: u8,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Loop flags changed
    LoopChanged {
        session: String,
        loop_current: bool,
        loop_queue: bool,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Too many consecutive songs failed; playback gave up and went idle
    NothingPlayable {
        session: String,
        consecutive_failures: u32,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl JukeboxEvent {
    /// Session key this event belongs to
    pub fn session(&self) -> &str {
        match self {
            JukeboxEvent::SessionOpened { session, .. }
            | JukeboxEvent::SessionClosed { session, .. }
            | JukeboxEvent::TransportChanged { session, .. }
            | JukeboxEvent::SongStarted { session, .. }
            | JukeboxEvent::SongCompleted { session, .. }
            | JukeboxEvent::SongSkipped { session, .. }
            | JukeboxEvent::QueueChanged { session, .. }
            | JukeboxEvent::VolumeChanged { session, .. }
            | JukeboxEvent::LoopChanged { session, .. }
            | JukeboxEvent::NothingPlayable { session, .. } => session,
        }
    }

    /// Variant name, used as the SSE event field
    pub fn event_type(&self) -> &'static str {
        match self {
            JukeboxEvent::SessionOpened { .. } => "SessionOpened",
            JukeboxEvent::SessionClosed { .. } => "SessionClosed",
            JukeboxEvent::TransportChanged { .. } => "TransportChanged",
            JukeboxEvent::SongStarted { .. } => "SongStarted",
            JukeboxEvent::SongCompleted { .. } => "SongCompleted",
            JukeboxEvent::SongSkipped { .. } => "SongSkipped",
            JukeboxEvent::QueueChanged { .. } => "QueueChanged",
            JukeboxEvent::VolumeChanged { .. } => "VolumeChanged",
            JukeboxEvent::LoopChanged { .. } => "LoopChanged",
            JukeboxEvent::NothingPlayable { .. } => "NothingPlayable",
        }
    }
}

/// Broadcast bus for jukebox events
///
/// Wraps a `tokio::sync::broadcast` channel. Slow subscribers lag and lose
/// the oldest events rather than blocking session workers.
#[derive(Debug)]
pub struct EventBus {
    tx: broadcast::Sender<JukeboxEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use jukebox_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<JukeboxEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: JukeboxEvent,
    ) -> Result<usize, broadcast::error::SendError<JukeboxEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: JukeboxEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
