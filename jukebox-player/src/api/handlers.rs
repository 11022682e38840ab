//! HTTP request handlers
//!
//! Each handler looks the session up in the registry (creating it on first
//! use) and forwards to its [`PlaybackController`](crate::playback::PlaybackController).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use jukebox_common::events::LoopMode;
use jukebox_common::human_time::{format_duration, format_duration_opt};
use jukebox_common::{RequesterId, Song};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::AppState;
use crate::error::Error;
use crate::playback::{RequestOutcome, SessionStatus, SkipOutcome};
use crate::registry::SessionKey;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    git_hash: String,
    build_profile: String,
    build_timestamp: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl StatusResponse {
    fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            message: None,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    sessions: Vec<SessionKey>,
}

/// Session status plus pre-formatted durations
#[derive(Debug, Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    status: SessionStatus,
    loop_mode: Option<LoopMode>,
    current_duration: Option<String>,
    pending_duration: String,
}

impl From<SessionStatus> for SessionView {
    fn from(status: SessionStatus) -> Self {
        let current_duration = status
            .current
            .as_ref()
            .map(|song| format_duration_opt(song.duration_seconds));
        let pending_duration = format_duration(status.pending_seconds());
        Self {
            loop_mode: status.loop_mode(),
            current_duration,
            pending_duration,
            status,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SongRequest {
    query: String,
    requester: String,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    volume: i64,
}

#[derive(Debug, Serialize)]
pub struct VolumeResponse {
    volume: u8,
}

#[derive(Debug, Deserialize)]
pub struct LoopRequest {
    mode: Option<String>,
    loop_current: Option<bool>,
    loop_queue: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct LoopResponse {
    loop_current: bool,
    loop_queue: bool,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    from: usize,
    to: usize,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    count: usize,
}

#[derive(Debug, Serialize)]
pub struct SongResponse {
    song: Song,
}

type ApiError = (StatusCode, Json<StatusResponse>);
type ApiResult<T> = Result<Json<T>, ApiError>;

/// Map a controller error onto an HTTP status
fn api_error(e: Error) -> ApiError {
    let status = match &e {
        Error::ResolutionFailed(_) => StatusCode::NOT_FOUND,
        Error::InvalidVolume(_) | Error::InvalidPosition { .. } => StatusCode::BAD_REQUEST,
        Error::NotConnected(_)
        | Error::EmptyQueue
        | Error::NothingPlaying
        | Error::NothingPaused => StatusCode::CONFLICT,
        Error::SessionClosed(_) => StatusCode::GONE,
        Error::SinkStartFailed { .. } | Error::SinkPlaybackFailed { .. } => {
            warn!("Sink error surfaced to API: {}", e);
            StatusCode::BAD_GATEWAY
        }
    };
    (status, Json(StatusResponse::error(e.to_string())))
}

// ============================================================================
// Health & sessions
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "jukebox_player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
    })
}

/// GET /sessions
pub async fn list_sessions(State(state): State<AppState>) -> Json<SessionListResponse> {
    Json(SessionListResponse {
        sessions: state.registry.keys().await,
    })
}

/// GET /sessions/:key
pub async fn session_status(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<SessionView> {
    let key = SessionKey::from(key);
    match state.registry.get(&key).await {
        Some(controller) => Ok(Json(SessionView::from(controller.status()))),
        None => Err((
            StatusCode::NOT_FOUND,
            Json(StatusResponse::error(format!("Unknown session {}", key))),
        )),
    }
}

/// DELETE /sessions/:key
pub async fn disconnect_session(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    let key = SessionKey::from(key);
    if state.registry.remove(&key).await {
        info!("Session {} removed via API", key);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((
            StatusCode::NOT_FOUND,
            Json(StatusResponse::error(format!("Unknown session {}", key))),
        ))
    }
}

// ============================================================================
// Playback control
// ============================================================================

/// POST /sessions/:key/join
pub async fn join(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<StatusResponse> {
    let controller = state.registry.get_or_create(&SessionKey::from(key)).await;
    controller.join().await.map_err(api_error)?;
    Ok(Json(StatusResponse::ok()))
}

/// POST /sessions/:key/request
pub async fn request_song(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<SongRequest>,
) -> ApiResult<RequestOutcome> {
    let controller = state.registry.get_or_create(&SessionKey::from(key)).await;
    let outcome = controller
        .request(req.query, RequesterId::new(req.requester))
        .await
        .map_err(api_error)?;
    Ok(Json(outcome))
}

/// POST /sessions/:key/pause
pub async fn pause(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<StatusResponse> {
    let controller = state.registry.get_or_create(&SessionKey::from(key)).await;
    controller.pause().await.map_err(api_error)?;
    Ok(Json(StatusResponse::ok()))
}

/// POST /sessions/:key/resume
pub async fn resume(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<StatusResponse> {
    let controller = state.registry.get_or_create(&SessionKey::from(key)).await;
    controller.resume().await.map_err(api_error)?;
    Ok(Json(StatusResponse::ok()))
}

/// POST /sessions/:key/skip
pub async fn skip(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<SkipOutcome> {
    let controller = state.registry.get_or_create(&SessionKey::from(key)).await;
    let outcome = controller.skip().await.map_err(api_error)?;
    Ok(Json(outcome))
}

/// POST /sessions/:key/stop
pub async fn stop(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<StatusResponse> {
    let controller = state.registry.get_or_create(&SessionKey::from(key)).await;
    controller.stop().await.map_err(api_error)?;
    Ok(Json(StatusResponse::ok()))
}

/// POST /sessions/:key/volume
pub async fn set_volume(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<VolumeRequest>,
) -> ApiResult<VolumeResponse> {
    let controller = state.registry.get_or_create(&SessionKey::from(key)).await;
    let volume = controller.set_volume(req.volume).await.map_err(api_error)?;
    Ok(Json(VolumeResponse { volume }))
}

/// POST /sessions/:key/loop
///
/// Either `mode` (off, track, queue) or the individual flags.
pub async fn set_loop(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<LoopRequest>,
) -> ApiResult<LoopResponse> {
    let controller = state.registry.get_or_create(&SessionKey::from(key)).await;

    let (loop_current, loop_queue) = match req.mode {
        Some(mode) => {
            let mode = mode
                .parse::<LoopMode>()
                .map_err(|e| (StatusCode::BAD_REQUEST, Json(StatusResponse::error(e))))?;
            controller.set_loop_mode(mode).await.map_err(api_error)?
        }
        None => {
            let status = controller.status();
            let mut flags = (status.loop_current, status.loop_queue);
            if let Some(enabled) = req.loop_current {
                flags = controller.set_loop_current(enabled).await.map_err(api_error)?;
            }
            if let Some(enabled) = req.loop_queue {
                flags = controller.set_loop_queue(enabled).await.map_err(api_error)?;
            }
            flags
        }
    };

    Ok(Json(LoopResponse {
        loop_current,
        loop_queue,
    }))
}

// ============================================================================
// Queue editing
// ============================================================================

/// POST /sessions/:key/shuffle
pub async fn shuffle(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<CountResponse> {
    let controller = state.registry.get_or_create(&SessionKey::from(key)).await;
    let count = controller.shuffle().await.map_err(api_error)?;
    Ok(Json(CountResponse { count }))
}

/// DELETE /sessions/:key/queue
pub async fn clear_queue(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> ApiResult<CountResponse> {
    let controller = state.registry.get_or_create(&SessionKey::from(key)).await;
    let count = controller.clear_queue().await.map_err(api_error)?;
    Ok(Json(CountResponse { count }))
}

/// DELETE /sessions/:key/queue/:position
pub async fn remove_song(
    State(state): State<AppState>,
    Path((key, position)): Path<(String, usize)>,
) -> ApiResult<SongResponse> {
    let controller = state.registry.get_or_create(&SessionKey::from(key)).await;
    let song = controller.remove(position).await.map_err(api_error)?;
    Ok(Json(SongResponse { song }))
}

/// POST /sessions/:key/queue/move
pub async fn move_song(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<MoveRequest>,
) -> ApiResult<SongResponse> {
    let controller = state.registry.get_or_create(&SessionKey::from(key)).await;
    let song = controller
        .move_song(req.from, req.to)
        .await
        .map_err(api_error)?;
    Ok(Json(SongResponse { song }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(e: Error) -> StatusCode {
        api_error(e).0
    }

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(status_of(Error::ResolutionFailed("x".into())), StatusCode::NOT_FOUND);
        assert_eq!(status_of(Error::InvalidVolume(101)), StatusCode::BAD_REQUEST);
        assert_eq!(
            status_of(Error::InvalidPosition { position: 4, len: 1 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(status_of(Error::NotConnected("g1".into())), StatusCode::CONFLICT);
        assert_eq!(status_of(Error::EmptyQueue), StatusCode::CONFLICT);
        assert_eq!(status_of(Error::NothingPlaying), StatusCode::CONFLICT);
        assert_eq!(status_of(Error::NothingPaused), StatusCode::CONFLICT);
        assert_eq!(status_of(Error::SessionClosed("g1".into())), StatusCode::GONE);
        assert_eq!(
            status_of(Error::SinkStartFailed {
                title: "A".into(),
                reason: "busy".into()
            }),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn test_error_body_carries_message() {
        let (_, Json(body)) = api_error(Error::InvalidVolume(150));
        assert_eq!(body.status, "error");
        assert_eq!(
            body.message.as_deref(),
            Some("Volume must be between 0 and 100, got 150")
        );
    }
}
