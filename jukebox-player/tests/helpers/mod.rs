//! Test helper modules for jukebox-player integration tests
//!
//! - MockConnector / MockSink: sinks driven by a shared `SinkMonitor`
//! - MockResolver: deterministic resolver with holdable queries
//! - Wait helpers for status snapshots and events

#![allow(dead_code)]

pub mod mock_resolver;
pub mod mock_sink;

pub use mock_resolver::{locator, MockResolver};
pub use mock_sink::{MockConnector, SinkCall, SinkMonitor};

use jukebox_common::events::{EventBus, JukeboxEvent};
use jukebox_common::RequesterId;
use jukebox_player::config::ControllerSettings;
use jukebox_player::playback::{PlaybackController, SessionServices, SessionStatus};
use jukebox_player::SessionKey;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

const WAIT: Duration = Duration::from_secs(5);

/// Everything a test needs to drive one or more sessions
pub struct Harness {
    pub resolver: Arc<MockResolver>,
    pub monitor: SinkMonitor,
    pub services: SessionServices,
    pub settings: ControllerSettings,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(ControllerSettings::default())
    }

    pub fn with_settings(settings: ControllerSettings) -> Self {
        let resolver = MockResolver::new();
        let monitor = SinkMonitor::new();
        let services = SessionServices {
            resolver: resolver.clone(),
            connector: Arc::new(MockConnector::new(monitor.clone())),
            events: Arc::new(EventBus::new(256)),
        };
        Self {
            resolver,
            monitor,
            services,
            settings,
        }
    }

    pub fn controller(&self, key: &str) -> PlaybackController {
        PlaybackController::spawn(SessionKey::from(key), self.services.clone(), self.settings)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JukeboxEvent> {
        self.services.events.subscribe()
    }
}

pub fn user(id: &str) -> RequesterId {
    RequesterId::new(id)
}

/// Wait until the published status satisfies `predicate`
pub async fn wait_for_status(
    controller: &PlaybackController,
    predicate: impl FnMut(&SessionStatus) -> bool,
) -> SessionStatus {
    let mut rx = controller.subscribe_status();
    let status = tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("timed out waiting for session status")
        .expect("session worker stopped");
    status.clone()
}

/// Wait until the current song has the given title
pub async fn wait_for_current(controller: &PlaybackController, title: &str) -> SessionStatus {
    wait_for_status(controller, |s| {
        s.current.as_ref().map(|song| song.title.as_str()) == Some(title)
    })
    .await
}

/// Wait until the session is idle with nothing current
pub async fn wait_for_idle(controller: &PlaybackController) -> SessionStatus {
    wait_for_status(controller, |s| {
        s.current.is_none() && s.transport == jukebox_common::events::TransportState::Idle
    })
    .await
}

/// Receive events until one matches `predicate`
pub async fn wait_for_event(
    rx: &mut broadcast::Receiver<JukeboxEvent>,
    mut predicate: impl FnMut(&JukeboxEvent) -> bool,
) -> JukeboxEvent {
    tokio::time::timeout(WAIT, async {
        loop {
            let event = rx.recv().await.expect("event bus closed");
            if predicate(&event) {
                return event;
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
