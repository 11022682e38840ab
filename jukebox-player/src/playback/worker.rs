//! Session worker
//!
//! One tokio task per session owns the [`QueueEngine`], the transport state and
//! the audio sink. It consumes a single ordered stream that merges user
//! commands, sink completions and resolution results, so no two transitions of
//! a session ever interleave.
//!
//! **Playback generations:** every successful `sink.start()` is tagged with a
//! fresh generation number. Completions carry the generation they belong to
//! and are ignored unless it is still the active one, which makes completions
//! from stopped or replaced songs harmless.
//!
//! **Skips** end the song inside the skip command itself: the sink is
//! stopped and the queue advanced before the next event is read, so anything
//! queued behind a skip sees the song that follows.
//!
//! **Requests:** resolution runs in spawned tasks under a child of the
//! session's cancellation token. Outcomes are applied strictly in request
//! order: a resolution that finishes early waits until every earlier request
//! has been applied.

use std::collections::VecDeque;
use std::sync::Arc;

use jukebox_common::events::{EventBus, JukeboxEvent, QueueChangeTrigger, TransportState};
use jukebox_common::{RequesterId, Song};
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::events::{Command, Reply, RequestOutcome, SessionEvent, SkipOutcome};
use super::queue::QueueEngine;
use super::state::SessionStatus;
use super::SessionServices;
use crate::audio::{AudioSink, CompletionHandle, PlaybackEnd, SinkConnector};
use crate::config::ControllerSettings;
use crate::error::{Error, Result};
use crate::registry::SessionKey;
use crate::resolver::{ResolveError, Resolver};

/// Request waiting for its resolution or for earlier requests to be applied
struct PendingRequest {
    ticket: u64,
    query: String,
    token: CancellationToken,
    reply: Reply<RequestOutcome>,
    result: Option<std::result::Result<Song, ResolveError>>,

    /// Set by a skip issued while nothing was playing
    skip_on_arrival: bool,
}

pub(crate) struct SessionWorker {
    key: SessionKey,
    settings: ControllerSettings,
    resolver: Arc<dyn Resolver>,
    connector: Arc<dyn SinkConnector>,
    events: Arc<EventBus>,
    inbox: mpsc::WeakUnboundedSender<SessionEvent>,
    status: watch::Sender<SessionStatus>,

    engine: QueueEngine,
    transport: TransportState,
    sink: Option<Box<dyn AudioSink>>,
    volume: u8,

    /// Last generation handed out
    generation: u64,
    /// Generation of the song the sink is playing
    active: Option<u64>,
    consecutive_failures: u32,

    next_ticket: u64,
    requests: VecDeque<PendingRequest>,
    cancel: CancellationToken,
}

impl SessionWorker {
    pub(crate) fn new(
        key: SessionKey,
        services: SessionServices,
        settings: ControllerSettings,
        inbox: mpsc::WeakUnboundedSender<SessionEvent>,
        status: watch::Sender<SessionStatus>,
    ) -> Self {
        Self {
            key,
            settings,
            resolver: services.resolver,
            connector: services.connector,
            events: services.events,
            inbox,
            status,
            engine: QueueEngine::new(),
            transport: TransportState::Idle,
            sink: None,
            volume: settings.default_volume,
            generation: 0,
            active: None,
            consecutive_failures: 0,
            next_ticket: 0,
            requests: VecDeque::new(),
            cancel: CancellationToken::new(),
        }
    }

    /// Process the session's event stream until disconnect
    pub(crate) async fn run(mut self, mut rx: mpsc::UnboundedReceiver<SessionEvent>) {
        debug!("Session {} worker started", self.key);
        self.publish_status();

        while let Some(event) = rx.recv().await {
            match event {
                SessionEvent::Command(command) => self.handle_command(command).await,
                SessionEvent::SinkCompleted { generation, end } => {
                    self.on_sink_completed(generation, end).await
                }
                SessionEvent::Resolved { ticket, result } => self.on_resolved(ticket, result).await,
                SessionEvent::Disconnect { reply } => {
                    self.shutdown().await;
                    rx.close();
                    let _ = reply.send(());
                    return;
                }
            }
            self.publish_status();
        }

        // Every controller handle was dropped without a disconnect
        self.shutdown().await;
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Join { reply } => {
                let result = self.join().await;
                self.respond(reply, result);
            }
            Command::Request {
                query,
                requester,
                reply,
            } => self.request(query, requester, reply).await,
            Command::Pause { reply } => {
                let result = self.pause().await;
                self.respond(reply, result);
            }
            Command::Resume { reply } => {
                let result = self.resume().await;
                self.respond(reply, result);
            }
            Command::Skip { target, reply } => {
                let result = self.skip(target).await;
                self.respond(reply, result);
            }
            Command::Stop { reply } => {
                self.stop().await;
                self.respond(reply, Ok(()));
            }
            Command::SetVolume { level, reply } => {
                let result = self.set_volume(level).await;
                self.respond(reply, result);
            }
            Command::SetLoop {
                loop_current,
                loop_queue,
                reply,
            } => {
                let flags = self.set_loop(loop_current, loop_queue);
                self.respond(reply, Ok(flags));
            }
            Command::Remove { position, reply } => {
                let result = self.engine.remove(position);
                if let Ok(song) = &result {
                    info!("Session {}: removed {} from position {}", self.key, song, position);
                    self.emit_queue_changed(QueueChangeTrigger::UserDequeue);
                }
                self.respond(reply, result);
            }
            Command::Move { from, to, reply } => {
                let result = self.engine.move_song(from, to);
                if let Ok(song) = &result {
                    info!("Session {}: moved {} from {} to {}", self.key, song, from, to);
                    self.emit_queue_changed(QueueChangeTrigger::UserReorder);
                }
                self.respond(reply, result);
            }
            Command::Shuffle { reply } => {
                let result = self.engine.shuffle(&mut rand::thread_rng());
                if let Ok(count) = &result {
                    info!("Session {}: shuffled {} songs", self.key, count);
                    self.emit_queue_changed(QueueChangeTrigger::Shuffle);
                }
                self.respond(reply, result);
            }
            Command::ClearQueue { reply } => {
                let removed = self.engine.clear_pending();
                if removed > 0 {
                    info!("Session {}: cleared {} pending songs", self.key, removed);
                    self.emit_queue_changed(QueueChangeTrigger::UserDequeue);
                }
                self.respond(reply, Ok(removed));
            }
        }
    }

    // ------------------------------------------------------------------
    // Sink attachment
    // ------------------------------------------------------------------

    async fn join(&mut self) -> Result<()> {
        if self.sink.is_some() {
            return Ok(());
        }
        self.attach_sink().await
    }

    async fn attach_sink(&mut self) -> Result<()> {
        match self.connector.connect(&self.key).await {
            Ok(mut sink) => {
                if let Err(e) = sink.set_volume(self.gain()).await {
                    warn!("Session {}: sink refused initial volume: {}", self.key, e);
                }
                self.sink = Some(sink);
                info!("Session {} attached to audio sink", self.key);
                Ok(())
            }
            Err(e) => {
                warn!("Session {} could not attach a sink: {}", self.key, e);
                Err(Error::NotConnected(self.key.to_string()))
            }
        }
    }

    // ------------------------------------------------------------------
    // Requests
    // ------------------------------------------------------------------

    async fn request(&mut self, query: String, requester: RequesterId, reply: Reply<RequestOutcome>) {
        if self.sink.is_none() {
            if let Err(e) = self.attach_sink().await {
                self.respond(reply, Err(e));
                return;
            }
        }

        let Some(inbox) = self.inbox.upgrade() else {
            self.respond(reply, Err(Error::SessionClosed(self.key.to_string())));
            return;
        };

        let ticket = self.next_ticket;
        self.next_ticket += 1;

        let token = self.cancel.child_token();
        let task_token = token.clone();
        let resolver = Arc::clone(&self.resolver);
        let task_query = query.clone();

        tokio::spawn(async move {
            let result = tokio::select! {
                _ = task_token.cancelled() => return,
                result = resolver.resolve(&task_query, &requester) => result,
            };
            let _ = inbox.send(SessionEvent::Resolved { ticket, result });
        });

        debug!("Session {}: resolving '{}' (ticket {})", self.key, query, ticket);
        self.requests.push_back(PendingRequest {
            ticket,
            query,
            token,
            reply,
            result: None,
            skip_on_arrival: false,
        });
    }

    async fn on_resolved(&mut self, ticket: u64, result: std::result::Result<Song, ResolveError>) {
        let Some(request) = self.requests.iter_mut().find(|r| r.ticket == ticket) else {
            debug!(
                "Session {}: dropping resolution for withdrawn ticket {}",
                self.key, ticket
            );
            return;
        };
        request.result = Some(result);

        while matches!(self.requests.front(), Some(r) if r.result.is_some()) {
            let Some(request) = self.requests.pop_front() else {
                break;
            };
            let Some(result) = request.result else {
                continue;
            };
            self.apply_resolution(request.query, result, request.skip_on_arrival, request.reply)
                .await;
        }
    }

    async fn apply_resolution(
        &mut self,
        query: String,
        result: std::result::Result<Song, ResolveError>,
        skip_on_arrival: bool,
        reply: Reply<RequestOutcome>,
    ) {
        let song = match result {
            Ok(song) => song,
            Err(e) => {
                info!("Session {}: {}", self.key, e);
                self.respond(reply, Err(Error::ResolutionFailed(query)));
                return;
            }
        };

        if skip_on_arrival {
            let reason = "skipped before playback".to_string();
            info!("Session {}: passing over {} ({})", self.key, song, reason);
            self.emit(JukeboxEvent::SongSkipped {
                session: self.key.to_string(),
                song: song.clone(),
                reason: reason.clone(),
                timestamp: chrono::Utc::now(),
            });
            self.respond(reply, Ok(RequestOutcome::Skipped { song, reason }));
            return;
        }

        if self.engine.peek_current().is_some() {
            let position = self.engine.enqueue(song.clone());
            info!("Session {}: queued {} at position {}", self.key, song, position);
            self.emit_queue_changed(QueueChangeTrigger::UserEnqueue);
            self.respond(reply, Ok(RequestOutcome::Queued { song, position }));
            return;
        }

        // Nothing current: songs left waiting after a give-up keep their turn
        let waiting = self.engine.pending_len();
        self.engine.begin(song.clone());

        if waiting > 0 {
            let position = self.engine.pending_len();
            info!("Session {}: queued {} at position {}", self.key, song, position);
            self.emit_queue_changed(QueueChangeTrigger::UserEnqueue);
            self.play_current().await;
            self.respond(reply, Ok(RequestOutcome::Queued { song, position }));
            return;
        }

        let outcome = match self.play_current().await {
            None => RequestOutcome::NowPlaying { song },
            Some(reason) => RequestOutcome::Skipped { song, reason },
        };
        self.respond(reply, Ok(outcome));
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Start the current song, walking past songs the sink refuses
    ///
    /// Returns why the first attempted song failed, if it did.
    async fn play_current(&mut self) -> Option<String> {
        let mut first_failure = None;

        while let Some(song) = self.engine.peek_current().cloned() {
            match self.start_song(&song).await {
                Ok(()) => return first_failure,
                Err(e) => {
                    let reason = e.to_string();
                    if first_failure.is_none() {
                        first_failure = Some(reason.clone());
                    }
                    if !self.record_failure(&song, reason) {
                        return first_failure;
                    }
                    if self.engine.advance_past_failure().is_some() {
                        self.emit_queue_changed(QueueChangeTrigger::SongFailure);
                    }
                }
            }
        }

        self.set_transport(TransportState::Idle);
        first_failure
    }

    async fn start_song(&mut self, song: &Song) -> Result<()> {
        let gain = self.gain();
        let Some(sink) = self.sink.as_mut() else {
            return Err(Error::NotConnected(self.key.to_string()));
        };

        self.generation += 1;
        let generation = self.generation;
        self.active = None;

        if let Err(e) = sink.set_volume(gain).await {
            warn!("Session {}: sink refused volume: {}", self.key, e);
        }

        let (completion, done) = CompletionHandle::pair();
        sink.start(song, completion)
            .await
            .map_err(|e| Error::SinkStartFailed {
                title: song.title.clone(),
                reason: e.to_string(),
            })?;

        self.watch_completion(generation, done);
        self.active = Some(generation);

        info!(
            "Session {}: now playing {} [{}] requested by {}",
            self.key,
            song,
            song.display_duration(),
            song.requester
        );
        self.emit(JukeboxEvent::SongStarted {
            session: self.key.to_string(),
            song: song.clone(),
            timestamp: chrono::Utc::now(),
        });
        self.set_transport(TransportState::Playing);
        Ok(())
    }

    /// Forward the sink's completion for `generation` onto the event stream
    fn watch_completion(&self, generation: u64, done: oneshot::Receiver<PlaybackEnd>) {
        let inbox = self.inbox.clone();
        tokio::spawn(async move {
            let end = done.await.unwrap_or(PlaybackEnd::Finished);
            if let Some(inbox) = inbox.upgrade() {
                let _ = inbox.send(SessionEvent::SinkCompleted { generation, end });
            }
        });
    }

    /// Count a failed song; returns false once the failure cap is reached
    fn record_failure(&mut self, song: &Song, reason: String) -> bool {
        self.consecutive_failures += 1;
        warn!("Session {}: skipping {}: {}", self.key, song, reason);
        self.emit(JukeboxEvent::SongSkipped {
            session: self.key.to_string(),
            song: song.clone(),
            reason,
            timestamp: chrono::Utc::now(),
        });

        if self.consecutive_failures < self.settings.max_consecutive_failures {
            return true;
        }

        warn!(
            "Session {}: {} songs failed in a row, nothing playable",
            self.key, self.consecutive_failures
        );
        self.emit(JukeboxEvent::NothingPlayable {
            session: self.key.to_string(),
            consecutive_failures: self.consecutive_failures,
            timestamp: chrono::Utc::now(),
        });
        self.engine.drop_current();
        self.active = None;
        self.consecutive_failures = 0;
        self.set_transport(TransportState::Idle);
        false
    }

    async fn on_sink_completed(&mut self, generation: u64, end: PlaybackEnd) {
        if self.active != Some(generation) {
            debug!(
                "Session {}: ignoring completion of stale playback {}",
                self.key, generation
            );
            return;
        }
        self.active = None;
        self.end_current(end, false).await;
    }

    /// Advance past the song that just left the sink and start the next one
    async fn end_current(&mut self, end: PlaybackEnd, skipped: bool) {
        let Some(song) = self.engine.peek_current().cloned() else {
            self.set_transport(TransportState::Idle);
            return;
        };

        match end {
            PlaybackEnd::Finished => {
                self.consecutive_failures = 0;
                debug!("Session {}: finished {} (skipped: {})", self.key, song, skipped);
                self.emit(JukeboxEvent::SongCompleted {
                    session: self.key.to_string(),
                    song,
                    completed: !skipped,
                    timestamp: chrono::Utc::now(),
                });

                let held = self.engine.loop_current();
                if self.engine.advance().is_some() && !held {
                    self.emit_queue_changed(QueueChangeTrigger::SongCompletion);
                }
            }
            PlaybackEnd::Failed(reason) => {
                let error = Error::SinkPlaybackFailed {
                    title: song.title.clone(),
                    reason,
                };
                if !self.record_failure(&song, error.to_string()) {
                    return;
                }
                if self.engine.advance_past_failure().is_some() {
                    self.emit_queue_changed(QueueChangeTrigger::SongFailure);
                }
            }
        }

        self.play_current().await;
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    async fn pause(&mut self) -> Result<()> {
        if self.transport != TransportState::Playing {
            return Err(Error::NothingPlaying);
        }
        let title = self.current_title();
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| Error::NotConnected(self.key.to_string()))?;

        sink.pause()
            .await
            .map_err(|e| Error::SinkPlaybackFailed {
                title,
                reason: e.to_string(),
            })?;

        info!("Session {}: paused", self.key);
        self.set_transport(TransportState::Paused);
        Ok(())
    }

    async fn resume(&mut self) -> Result<()> {
        if self.transport != TransportState::Paused {
            return Err(Error::NothingPaused);
        }
        let title = self.current_title();
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| Error::NotConnected(self.key.to_string()))?;

        sink.resume()
            .await
            .map_err(|e| Error::SinkPlaybackFailed {
                title,
                reason: e.to_string(),
            })?;

        info!("Session {}: resumed", self.key);
        self.set_transport(TransportState::Playing);
        Ok(())
    }

    async fn skip(&mut self, target: Option<u64>) -> Result<SkipOutcome> {
        match (target, self.active) {
            (Some(target), Some(active)) if target == active => self.stop_for_skip().await,
            (Some(target), _) => {
                debug!(
                    "Session {}: skip target {} already ended",
                    self.key, target
                );
                Ok(SkipOutcome::AlreadyApplied)
            }
            // Started after the skip was issued, from a request that was resolving
            (None, Some(_)) => self.stop_for_skip().await,
            (None, None) => match self.requests.front_mut() {
                Some(request) => {
                    request.skip_on_arrival = true;
                    info!(
                        "Session {}: will pass over '{}' once resolved",
                        self.key, request.query
                    );
                    Ok(SkipOutcome::Deferred)
                }
                None => Err(Error::NothingPlaying),
            },
        }
    }

    /// Stop the active song and advance as if it had finished
    ///
    /// The sink's own completion for the stopped generation arrives later
    /// and is dropped as stale.
    async fn stop_for_skip(&mut self) -> Result<SkipOutcome> {
        let song = self
            .engine
            .peek_current()
            .cloned()
            .ok_or(Error::NothingPlaying)?;

        if let Some(sink) = self.sink.as_mut() {
            sink.stop().await.map_err(|e| Error::SinkPlaybackFailed {
                title: song.title.clone(),
                reason: e.to_string(),
            })?;
        }

        info!("Session {}: skipping {}", self.key, song);
        self.active = None;
        self.end_current(PlaybackEnd::Finished, true).await;
        Ok(SkipOutcome::Skipped { song })
    }

    async fn stop(&mut self) {
        let cancelled: Vec<PendingRequest> = self.requests.drain(..).collect();
        for request in &cancelled {
            request.token.cancel();
        }

        let had_pending = self.engine.pending_len() > 0;
        self.engine.clear();
        self.active = None;
        self.consecutive_failures = 0;

        if let Some(sink) = self.sink.as_mut() {
            if let Err(e) = sink.stop().await {
                warn!("Session {}: sink stop failed: {}", self.key, e);
            }
        }

        if had_pending {
            self.emit_queue_changed(QueueChangeTrigger::Stop);
        }
        info!("Session {}: stopped and cleared queue", self.key);
        self.set_transport(TransportState::Idle);

        for request in cancelled {
            self.respond(request.reply, Ok(RequestOutcome::Cancelled));
        }
    }

    async fn set_volume(&mut self, level: i64) -> Result<u8> {
        let volume = u8::try_from(level)
            .ok()
            .filter(|v| *v <= 100)
            .ok_or(Error::InvalidVolume(level))?;

        let title = self.current_title();
        let sink = self
            .sink
            .as_mut()
            .ok_or_else(|| Error::NotConnected(self.key.to_string()))?;

        if self.transport.is_active() {
            sink.set_volume(f32::from(volume) / 100.0)
                .await
                .map_err(|e| Error::SinkPlaybackFailed {
                    title,
                    reason: e.to_string(),
                })?;
        }

        let old_volume = self.volume;
        self.volume = volume;
        if old_volume != volume {
            info!("Session {}: volume {} -> {}", self.key, old_volume, volume);
            self.emit(JukeboxEvent::VolumeChanged {
                session: self.key.to_string(),
                old_volume,
                new_volume: volume,
                timestamp: chrono::Utc::now(),
            });
        }
        Ok(volume)
    }

    fn set_loop(&mut self, loop_current: Option<bool>, loop_queue: Option<bool>) -> (bool, bool) {
        if let Some(enabled) = loop_current {
            self.engine.set_loop_current(enabled);
        }
        if let Some(enabled) = loop_queue {
            self.engine.set_loop_queue(enabled);
        }

        let flags = (self.engine.loop_current(), self.engine.loop_queue());
        info!(
            "Session {}: loop current {}, loop queue {}",
            self.key, flags.0, flags.1
        );
        self.emit(JukeboxEvent::LoopChanged {
            session: self.key.to_string(),
            loop_current: flags.0,
            loop_queue: flags.1,
            timestamp: chrono::Utc::now(),
        });
        flags
    }

    async fn shutdown(&mut self) {
        self.cancel.cancel();
        let cancelled: Vec<PendingRequest> = self.requests.drain(..).collect();

        self.engine.clear();
        self.active = None;

        if let Some(mut sink) = self.sink.take() {
            if let Err(e) = sink.stop().await {
                warn!("Session {}: sink stop failed during disconnect: {}", self.key, e);
            }
        }

        self.set_transport(TransportState::Idle);
        for request in cancelled {
            self.respond(request.reply, Ok(RequestOutcome::Cancelled));
        }
        self.publish_status();

        info!("Session {} disconnected", self.key);
        self.emit(JukeboxEvent::SessionClosed {
            session: self.key.to_string(),
            timestamp: chrono::Utc::now(),
        });
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    /// Publish the new state, then answer the caller
    fn respond<T>(&self, reply: Reply<T>, result: Result<T>) {
        self.publish_status();
        let _ = reply.send(result);
    }

    fn gain(&self) -> f32 {
        f32::from(self.volume) / 100.0
    }

    fn current_title(&self) -> String {
        self.engine
            .peek_current()
            .map(|song| song.title.clone())
            .unwrap_or_default()
    }

    fn set_transport(&mut self, new_state: TransportState) {
        if self.transport == new_state {
            return;
        }
        let old_state = std::mem::replace(&mut self.transport, new_state);
        debug!("Session {}: {} -> {}", self.key, old_state, new_state);
        self.emit(JukeboxEvent::TransportChanged {
            session: self.key.to_string(),
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }

    fn emit(&self, event: JukeboxEvent) {
        self.events.emit_lossy(event);
    }

    fn emit_queue_changed(&self, trigger: QueueChangeTrigger) {
        self.emit(JukeboxEvent::QueueChanged {
            session: self.key.to_string(),
            pending: self.engine.pending_len(),
            trigger,
            timestamp: chrono::Utc::now(),
        });
    }

    fn publish_status(&self) {
        self.status.send_replace(SessionStatus {
            session: self.key.to_string(),
            transport: self.transport,
            current: self.engine.peek_current().cloned(),
            previous: self.engine.previous().cloned(),
            pending: self.engine.pending_snapshot(),
            loop_current: self.engine.loop_current(),
            loop_queue: self.engine.loop_queue(),
            volume: self.volume,
            connected: self.sink.is_some(),
            resolving: self.requests.len(),
            generation: self.active,
        });
    }
}
