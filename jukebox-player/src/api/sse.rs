//! Server-Sent Events (SSE) stream
//!
//! Streams jukebox events to connected clients, optionally filtered to one
//! session with `?session=<key>`.

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct EventFilter {
    session: Option<String>,
}

/// GET /events - SSE event stream
pub async fn event_stream(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("New SSE client connected (session filter: {:?})", filter.session);

    let rx = state.registry.events().subscribe();
    let session = filter.session;

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let session = session.clone();
        async move {
            match result {
                Ok(event) => {
                    if session.as_deref().is_some_and(|s| s != event.session()) {
                        return None;
                    }
                    match serde_json::to_string(&event) {
                        Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
                        Err(e) => {
                            warn!("Failed to serialize event: {}", e);
                            None
                        }
                    }
                }
                Err(e) => {
                    // Lagged subscriber; the missed events are gone
                    warn!("SSE stream error: {:?}", e);
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
