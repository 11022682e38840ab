//! Audio sink boundary
//!
//! A session drives exactly one [`AudioSink`]. The sink plays one song at a
//! time and reports the end of every started song through the
//! [`CompletionHandle`] it was given, exactly once: natural end, stop, or
//! failure. A handle dropped without being fired counts as a normal end, so a
//! sink that tears down its playback task cannot leave a session waiting.
//!
//! Sinks are obtained per session from a [`SinkConnector`].

pub mod simulated;

pub use simulated::{SimulatedConnector, SimulatedSink, SimulatedSinkSettings};

use async_trait::async_trait;
use jukebox_common::Song;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::registry::SessionKey;

/// Errors reported by a sink or a connector
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SinkError {
    /// Sink refused the stream locator
    #[error("stream rejected: {0}")]
    Rejected(String),

    /// No sink could be attached
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    /// Operation needs a song in progress
    #[error("no stream in progress")]
    Idle,
}

/// How a started song left the sink
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEnd {
    /// Natural end or stop
    Finished,

    /// Sink gave up on the stream
    Failed(String),
}

/// One-shot completion notifier handed to [`AudioSink::start`]
#[derive(Debug)]
pub struct CompletionHandle {
    tx: oneshot::Sender<PlaybackEnd>,
}

impl CompletionHandle {
    /// Create a handle and the receiver observing it
    pub fn pair() -> (Self, oneshot::Receiver<PlaybackEnd>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Report that the song ended normally or was stopped
    pub fn finished(self) {
        let _ = self.tx.send(PlaybackEnd::Finished);
    }

    /// Report that playback failed
    pub fn failed(self, reason: impl Into<String>) {
        let _ = self.tx.send(PlaybackEnd::Failed(reason.into()));
    }
}

/// Audio output controlled by one session
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Start playing `song.stream_locator`, replacing anything in progress
    ///
    /// On `Ok` the sink owns `completion` and must fire it (or drop it) when
    /// the song ends. On `Err` the handle is dropped and the song never
    /// started.
    async fn start(&mut self, song: &Song, completion: CompletionHandle) -> Result<(), SinkError>;

    async fn pause(&mut self) -> Result<(), SinkError>;

    async fn resume(&mut self) -> Result<(), SinkError>;

    /// Stop the song in progress; its completion fires as `Finished`
    ///
    /// Stopping an idle sink is a no-op.
    async fn stop(&mut self) -> Result<(), SinkError>;

    /// Set output gain, 0.0 to 1.0
    async fn set_volume(&mut self, volume: f32) -> Result<(), SinkError>;
}

/// Attaches audio sinks to sessions
#[async_trait]
pub trait SinkConnector: Send + Sync {
    async fn connect(&self, session: &SessionKey) -> Result<Box<dyn AudioSink>, SinkError>;
}
