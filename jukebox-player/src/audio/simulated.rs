//! Timer-driven sink
//!
//! "Plays" a song by sleeping for its duration scaled by `time_scale`.
//! Pause freezes the remaining time, resume continues it, stop ends the song
//! early. Local paths that do not exist are rejected at start; anything with a
//! URL scheme is accepted.

use async_trait::async_trait;
use jukebox_common::config::SinkConfig;
use jukebox_common::Song;
use std::path::Path;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::{AudioSink, CompletionHandle, SinkConnector, SinkError};
use crate::registry::SessionKey;

/// Timing for simulated playback
#[derive(Debug, Clone, Copy)]
pub struct SimulatedSinkSettings {
    /// Multiplier applied to song durations
    pub time_scale: f64,

    /// Length assumed when a song has no duration
    pub default_song_seconds: u64,
}

impl Default for SimulatedSinkSettings {
    fn default() -> Self {
        Self::from(&SinkConfig::default())
    }
}

impl From<&SinkConfig> for SimulatedSinkSettings {
    fn from(config: &SinkConfig) -> Self {
        Self {
            time_scale: config.time_scale,
            default_song_seconds: config.default_song_seconds,
        }
    }
}

impl SimulatedSinkSettings {
    /// Wall-clock time a song occupies the sink
    ///
    /// A duration too large to represent falls back to the default length,
    /// and to "never" if that overflows as well.
    pub fn play_time(&self, song: &Song) -> Duration {
        let scaled = |seconds: u64| Duration::try_from_secs_f64(seconds as f64 * self.time_scale).ok();
        song.duration_seconds
            .and_then(scaled)
            .or_else(|| scaled(self.default_song_seconds))
            .unwrap_or(Duration::MAX)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transport {
    Play,
    Pause,
    Stop,
}

struct ActiveStream {
    control: watch::Sender<Transport>,
    task: JoinHandle<()>,
}

impl ActiveStream {
    fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

/// Sink that plays nothing but keeps accurate time
pub struct SimulatedSink {
    settings: SimulatedSinkSettings,
    active: Option<ActiveStream>,
    volume: f32,
}

impl SimulatedSink {
    pub fn new(settings: SimulatedSinkSettings) -> Self {
        Self {
            settings,
            active: None,
            volume: 1.0,
        }
    }

    /// Current output gain
    pub fn volume(&self) -> f32 {
        self.volume
    }

    fn running(&self) -> Option<&ActiveStream> {
        self.active.as_ref().filter(|stream| stream.is_running())
    }

    fn halt_active(&mut self) {
        if let Some(stream) = self.active.take() {
            let _ = stream.control.send(Transport::Stop);
        }
    }
}

impl Drop for SimulatedSink {
    fn drop(&mut self) {
        self.halt_active();
    }
}

fn is_playable(locator: &str) -> bool {
    locator.contains("://") || Path::new(locator).exists()
}

async fn run_stream(
    length: Duration,
    mut control: watch::Receiver<Transport>,
    completion: CompletionHandle,
) {
    let mut remaining = length;

    loop {
        let state = *control.borrow_and_update();
        match state {
            Transport::Stop => break,
            Transport::Pause => {
                if control.changed().await.is_err() {
                    break;
                }
                continue;
            }
            Transport::Play => {}
        }

        let resumed_at = Instant::now();
        tokio::select! {
            _ = tokio::time::sleep(remaining) => break,
            changed = control.changed() => {
                if changed.is_err() {
                    break;
                }
                remaining = remaining.saturating_sub(resumed_at.elapsed());
            }
        }
    }

    completion.finished();
}

#[async_trait]
impl AudioSink for SimulatedSink {
    async fn start(&mut self, song: &Song, completion: CompletionHandle) -> Result<(), SinkError> {
        self.halt_active();

        if !is_playable(&song.stream_locator) {
            return Err(SinkError::Rejected(format!(
                "{} does not exist",
                song.stream_locator
            )));
        }

        let length = self.settings.play_time(song);
        let (control, rx) = watch::channel(Transport::Play);
        let task = tokio::spawn(run_stream(length, rx, completion));

        debug!("Simulated sink playing {} for {:?}", song.stream_locator, length);
        self.active = Some(ActiveStream { control, task });
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), SinkError> {
        let stream = self.running().ok_or(SinkError::Idle)?;
        let _ = stream.control.send(Transport::Pause);
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), SinkError> {
        let stream = self.running().ok_or(SinkError::Idle)?;
        let _ = stream.control.send(Transport::Play);
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), SinkError> {
        self.halt_active();
        Ok(())
    }

    async fn set_volume(&mut self, volume: f32) -> Result<(), SinkError> {
        self.volume = volume.clamp(0.0, 1.0);
        Ok(())
    }
}

/// Hands every session a fresh [`SimulatedSink`]
#[derive(Debug, Clone, Default)]
pub struct SimulatedConnector {
    settings: SimulatedSinkSettings,
}

impl SimulatedConnector {
    pub fn new(settings: SimulatedSinkSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl SinkConnector for SimulatedConnector {
    async fn connect(&self, session: &SessionKey) -> Result<Box<dyn AudioSink>, SinkError> {
        info!("Attaching simulated sink to session {}", session);
        Ok(Box::new(SimulatedSink::new(self.settings)))
    }
}
