//! Playback controller handle
//!
//! Cheap, cloneable front for one session worker. Every operation is a
//! message on the worker's ordered stream plus a oneshot reply, so callers
//! in different sessions never wait on each other.

use jukebox_common::events::LoopMode;
use jukebox_common::{RequesterId, Song};
use tokio::sync::{mpsc, oneshot, watch};

use super::events::{Command, Reply, RequestOutcome, SessionEvent, SkipOutcome};
use super::state::SessionStatus;
use super::worker::SessionWorker;
use super::SessionServices;
use crate::config::ControllerSettings;
use crate::error::{Error, Result};
use crate::registry::SessionKey;

/// Handle to one session's playback state machine
#[derive(Clone)]
pub struct PlaybackController {
    key: SessionKey,
    inbox: mpsc::UnboundedSender<SessionEvent>,
    status: watch::Receiver<SessionStatus>,
}

impl PlaybackController {
    /// Spawn the session worker and return a handle to it
    ///
    /// Must be called within a tokio runtime.
    pub fn spawn(key: SessionKey, services: SessionServices, settings: ControllerSettings) -> Self {
        let (inbox, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(SessionStatus::initial(
            key.to_string(),
            settings.default_volume,
        ));

        let worker = SessionWorker::new(key.clone(), services, settings, inbox.downgrade(), status_tx);
        tokio::spawn(worker.run(rx));

        Self { key, inbox, status }
    }

    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    async fn call<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.inbox
            .send(SessionEvent::Command(command(reply)))
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())?
    }

    fn closed(&self) -> Error {
        Error::SessionClosed(self.key.to_string())
    }

    /// Attach an audio sink if none is attached
    pub async fn join(&self) -> Result<()> {
        self.call(|reply| Command::Join { reply }).await
    }

    /// Resolve a query and play or queue the result
    ///
    /// Joins automatically when no sink is attached. Returns once the song has
    /// been applied, which may be after earlier requests finish resolving.
    pub async fn request(
        &self,
        query: impl Into<String>,
        requester: RequesterId,
    ) -> Result<RequestOutcome> {
        let query = query.into();
        self.call(|reply| Command::Request {
            query,
            requester,
            reply,
        })
        .await
    }

    pub async fn pause(&self) -> Result<()> {
        self.call(|reply| Command::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.call(|reply| Command::Resume { reply }).await
    }

    /// Skip whatever is playing right now
    ///
    /// If that song ends before the worker sees the skip, the skip is
    /// reported as already applied and the next song keeps playing.
    pub async fn skip(&self) -> Result<SkipOutcome> {
        let target = self.status.borrow().generation;
        self.call(|reply| Command::Skip { target, reply }).await
    }

    /// Skip the song started under `generation`, if it is still playing
    ///
    /// `generation` comes from a [`SessionStatus`] snapshot, so a caller
    /// acting on an old snapshot never skips a song it did not see.
    pub async fn skip_generation(&self, generation: u64) -> Result<SkipOutcome> {
        self.call(|reply| Command::Skip {
            target: Some(generation),
            reply,
        })
        .await
    }

    /// Clear the queue, cancel pending requests and stop the sink
    pub async fn stop(&self) -> Result<()> {
        self.call(|reply| Command::Stop { reply }).await
    }

    /// Set volume 0-100
    pub async fn set_volume(&self, level: i64) -> Result<u8> {
        self.call(|reply| Command::SetVolume { level, reply }).await
    }

    pub async fn set_loop_current(&self, enabled: bool) -> Result<(bool, bool)> {
        self.call(|reply| Command::SetLoop {
            loop_current: Some(enabled),
            loop_queue: None,
            reply,
        })
        .await
    }

    pub async fn set_loop_queue(&self, enabled: bool) -> Result<(bool, bool)> {
        self.call(|reply| Command::SetLoop {
            loop_current: None,
            loop_queue: Some(enabled),
            reply,
        })
        .await
    }

    pub async fn set_loop_mode(&self, mode: LoopMode) -> Result<(bool, bool)> {
        let (loop_current, loop_queue) = mode.flags();
        self.call(|reply| Command::SetLoop {
            loop_current: Some(loop_current),
            loop_queue: Some(loop_queue),
            reply,
        })
        .await
    }

    /// Remove the pending song at a 1-based position
    pub async fn remove(&self, position: usize) -> Result<Song> {
        self.call(|reply| Command::Remove { position, reply }).await
    }

    /// Move a pending song between 1-based positions
    pub async fn move_song(&self, from: usize, to: usize) -> Result<Song> {
        self.call(|reply| Command::Move { from, to, reply }).await
    }

    pub async fn shuffle(&self) -> Result<usize> {
        self.call(|reply| Command::Shuffle { reply }).await
    }

    /// Drop every pending song, keeping the current one
    pub async fn clear_queue(&self) -> Result<usize> {
        self.call(|reply| Command::ClearQueue { reply }).await
    }

    /// Latest published snapshot
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Release the sink and end the worker
    ///
    /// Idempotent: returns immediately if the worker is already gone.
    pub async fn disconnect(&self) {
        let (reply, rx) = oneshot::channel();
        if self.inbox.send(SessionEvent::Disconnect { reply }).is_err() {
            return;
        }
        let _ = rx.await;
    }

    /// Whether the worker has shut down
    pub fn is_closed(&self) -> bool {
        self.inbox.is_closed()
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("key", &self.key)
            .field("closed", &self.is_closed())
            .finish()
    }
}
