//! Scriptable audio sink
//!
//! The sink never finishes a song on its own: tests end songs explicitly with
//! `SinkMonitor::finish` or `SinkMonitor::fail`, which makes every transition
//! deterministic. Each session gets its own sink with its own playback slot;
//! only the call log is shared.

use async_trait::async_trait;
use jukebox_common::Song;
use jukebox_player::audio::{AudioSink, CompletionHandle, SinkConnector, SinkError};
use jukebox_player::SessionKey;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};

/// Every call a sink received, in order
#[derive(Debug, Clone, PartialEq)]
pub enum SinkCall {
    Start(String),
    Pause,
    Resume,
    Stop,
    Volume(f32),
}

#[derive(Default)]
struct MonitorState {
    calls: Vec<SinkCall>,
    /// Song each session's sink is playing
    active: BTreeMap<SessionKey, (String, CompletionHandle)>,
    rejected: HashSet<String>,
    refuse_connect: bool,
    connects: usize,
}

/// Test-side view of the mock sinks created by one connector
#[derive(Clone, Default)]
pub struct SinkMonitor {
    state: Arc<Mutex<MonitorState>>,
}

impl SinkMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    fn take_any(&self) -> Option<(String, CompletionHandle)> {
        self.state.lock().unwrap().active.pop_first().map(|(_, active)| active)
    }

    fn take(&self, session: &SessionKey) -> Option<(String, CompletionHandle)> {
        self.state.lock().unwrap().active.remove(session)
    }

    /// End the active song normally; returns its locator
    ///
    /// Meant for single-session tests; see [`finish_session`](Self::finish_session).
    pub fn finish(&self) -> Option<String> {
        self.take_any().map(|(locator, handle)| {
            handle.finished();
            locator
        })
    }

    /// End the song playing in `session`
    pub fn finish_session(&self, session: &str) -> Option<String> {
        self.take(&SessionKey::from(session)).map(|(locator, handle)| {
            handle.finished();
            locator
        })
    }

    /// Fail the active song; returns its locator
    pub fn fail(&self, reason: &str) -> Option<String> {
        self.take_any().map(|(locator, handle)| {
            handle.failed(reason);
            locator
        })
    }

    /// Make `start` refuse this locator
    pub fn reject(&self, locator: &str) {
        self.state.lock().unwrap().rejected.insert(locator.to_string());
    }

    /// Make the connector refuse to attach sinks
    pub fn refuse_connections(&self) {
        self.state.lock().unwrap().refuse_connect = true;
    }

    pub fn calls(&self) -> Vec<SinkCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Locators passed to `start`, including rejected ones
    pub fn started(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SinkCall::Start(locator) => Some(locator),
                _ => None,
            })
            .collect()
    }

    /// Locator playing in `session`
    pub fn active(&self, session: &str) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .active
            .get(&SessionKey::from(session))
            .map(|(locator, _)| locator.clone())
    }

    pub fn connects(&self) -> usize {
        self.state.lock().unwrap().connects
    }
}

pub struct MockSink {
    session: SessionKey,
    monitor: SinkMonitor,
}

impl MockSink {
    fn record(&self, call: SinkCall) {
        self.monitor.state.lock().unwrap().calls.push(call);
    }

    fn is_playing(&self) -> bool {
        self.monitor.state.lock().unwrap().active.contains_key(&self.session)
    }
}

#[async_trait]
impl AudioSink for MockSink {
    async fn start(&mut self, song: &Song, completion: CompletionHandle) -> Result<(), SinkError> {
        self.record(SinkCall::Start(song.stream_locator.clone()));

        let replaced = {
            let mut state = self.monitor.state.lock().unwrap();
            if state.rejected.contains(&song.stream_locator) {
                return Err(SinkError::Rejected(format!("cannot open {}", song.stream_locator)));
            }
            state
                .active
                .insert(self.session.clone(), (song.stream_locator.clone(), completion))
        };

        if let Some((_, handle)) = replaced {
            handle.finished();
        }
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), SinkError> {
        self.record(SinkCall::Pause);
        if self.is_playing() {
            Ok(())
        } else {
            Err(SinkError::Idle)
        }
    }

    async fn resume(&mut self) -> Result<(), SinkError> {
        self.record(SinkCall::Resume);
        if self.is_playing() {
            Ok(())
        } else {
            Err(SinkError::Idle)
        }
    }

    async fn stop(&mut self) -> Result<(), SinkError> {
        self.record(SinkCall::Stop);
        if let Some((_, handle)) = self.monitor.take(&self.session) {
            handle.finished();
        }
        Ok(())
    }

    async fn set_volume(&mut self, volume: f32) -> Result<(), SinkError> {
        self.record(SinkCall::Volume(volume));
        Ok(())
    }
}

/// Connector handing out [`MockSink`]s that report to one monitor
pub struct MockConnector {
    monitor: SinkMonitor,
}

impl MockConnector {
    pub fn new(monitor: SinkMonitor) -> Self {
        Self { monitor }
    }
}

#[async_trait]
impl SinkConnector for MockConnector {
    async fn connect(&self, session: &SessionKey) -> Result<Box<dyn AudioSink>, SinkError> {
        let mut state = self.monitor.state.lock().unwrap();
        if state.refuse_connect {
            return Err(SinkError::Unavailable("connections refused".to_string()));
        }
        state.connects += 1;
        drop(state);

        Ok(Box::new(MockSink {
            session: session.clone(),
            monitor: self.monitor.clone(),
        }))
    }
}
