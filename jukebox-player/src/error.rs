//! Error types for jukebox-player
//!
//! Resolution and sink failures never escape a session worker as faults;
//! they are converted into forward progress and reported through these
//! variants or through events. The informational variants (`EmptyQueue`,
//! `NothingPlaying`, `NothingPaused`) describe commands that were no-ops.

use thiserror::Error;

/// Main error type for jukebox-player
#[derive(Error, Debug)]
pub enum Error {
    /// Song query had no playable result
    #[error("No playable result for '{0}'")]
    ResolutionFailed(String),

    /// Sink refused to start a resolved song
    #[error("Could not start '{title}': {reason}")]
    SinkStartFailed { title: String, reason: String },

    /// Sink reported an error while a song was playing
    #[error("Playback of '{title}' failed: {reason}")]
    SinkPlaybackFailed { title: String, reason: String },

    /// Volume outside 0-100
    #[error("Volume must be between 0 and 100, got {0}")]
    InvalidVolume(i64),

    /// Queue position outside the pending queue
    #[error("Invalid queue position {position} (queue has {len} songs)")]
    InvalidPosition { position: usize, len: usize },

    /// Command needs an attached sink and the session has none
    #[error("Session {0} is not connected to an audio sink")]
    NotConnected(String),

    /// Nothing pending in the queue
    #[error("Queue is empty")]
    EmptyQueue,

    /// Command needs a current song and there is none
    #[error("Nothing is playing")]
    NothingPlaying,

    /// Resume issued while not paused
    #[error("Nothing is paused")]
    NothingPaused,

    /// Session worker has shut down
    #[error("Session {0} is closed")]
    SessionClosed(String),
}

impl Error {
    /// Whether the error only reports a no-op rather than a fault
    pub fn is_informational(&self) -> bool {
        matches!(
            self,
            Error::EmptyQueue | Error::NothingPlaying | Error::NothingPaused
        )
    }
}

/// Convenience Result type using jukebox-player Error
pub type Result<T> = std::result::Result<T, Error>;
