//! Session registry
//!
//! Maps session keys to their playback controllers. Controllers are created
//! on first use and torn down on removal; the map itself is the only state
//! shared between sessions.

use jukebox_common::events::{EventBus, JukeboxEvent};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::config::ControllerSettings;
use crate::playback::{PlaybackController, SessionServices};

/// Identifies one independent client session
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionKey(String);

impl SessionKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SessionKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Lazily created, one-per-key playback controllers
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionKey, PlaybackController>>,
    services: SessionServices,
    settings: ControllerSettings,
}

impl SessionRegistry {
    pub fn new(services: SessionServices, settings: ControllerSettings) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            services,
            settings,
        }
    }

    /// Controller for `key`, creating it on first use
    ///
    /// A controller whose worker has shut down is replaced by a fresh one.
    pub async fn get_or_create(&self, key: &SessionKey) -> PlaybackController {
        if let Some(controller) = self.get(key).await {
            return controller;
        }

        let mut sessions = self.sessions.write().await;
        if let Some(controller) = sessions.get(key).filter(|c| !c.is_closed()) {
            return controller.clone();
        }

        let controller = PlaybackController::spawn(key.clone(), self.services.clone(), self.settings);
        sessions.insert(key.clone(), controller.clone());
        drop(sessions);

        info!("Opened session {}", key);
        self.services.events.emit_lossy(JukeboxEvent::SessionOpened {
            session: key.to_string(),
            timestamp: chrono::Utc::now(),
        });
        controller
    }

    /// Existing live controller for `key`
    pub async fn get(&self, key: &SessionKey) -> Option<PlaybackController> {
        self.sessions
            .read()
            .await
            .get(key)
            .filter(|c| !c.is_closed())
            .cloned()
    }

    /// Disconnect and forget the session
    ///
    /// Returns false if there was no such session.
    pub async fn remove(&self, key: &SessionKey) -> bool {
        let removed = self.sessions.write().await.remove(key);
        match removed {
            Some(controller) => {
                controller.disconnect().await;
                true
            }
            None => false,
        }
    }

    /// Keys of live sessions, sorted
    pub async fn keys(&self) -> Vec<SessionKey> {
        let mut keys: Vec<SessionKey> = self
            .sessions
            .read()
            .await
            .iter()
            .filter(|(_, c)| !c.is_closed())
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub async fn len(&self) -> usize {
        self.keys().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Disconnect every session
    pub async fn shutdown(&self) {
        let sessions: Vec<PlaybackController> = self
            .sessions
            .write()
            .await
            .drain()
            .map(|(_, c)| c)
            .collect();

        info!("Disconnecting {} sessions", sessions.len());
        for controller in sessions {
            controller.disconnect().await;
        }
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.services.events
    }

    pub fn settings(&self) -> ControllerSettings {
        self.settings
    }
}
