//! Per-session queue and playback control

pub mod controller;
pub mod events;
pub mod queue;
pub mod state;
mod worker;

pub use controller::PlaybackController;
pub use events::{RequestOutcome, SkipOutcome};
pub use queue::QueueEngine;
pub use state::SessionStatus;

use jukebox_common::events::EventBus;
use std::sync::Arc;

use crate::audio::SinkConnector;
use crate::resolver::Resolver;

/// Collaborators shared by every session
#[derive(Clone)]
pub struct SessionServices {
    pub resolver: Arc<dyn Resolver>,
    pub connector: Arc<dyn SinkConnector>,
    pub events: Arc<EventBus>,
}
