//! HTTP request handlers

use super::AppContext;
use crate::error::Error;
use crate::provider;
use crate::share::{Signal, SignalingChannel};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use mxt_common::events::{PlaybackState, QueueChangeTrigger};
use mxt_common::model::{is_valid_video_id, PageRequest, VideoPage};
use mxt_common::Video;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

const DEFAULT_SEARCH_PAGE_SIZE: u32 = 10;

type ApiError = (StatusCode, Json<StatusResponse>);

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PlaybackStateResponse {
    pub state: PlaybackState,
    pub playing: bool,
    pub running_entry: Option<Uuid>,
    pub loading_entry: Option<Uuid>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueEntryResponse {
    pub entry_id: Uuid,
    pub video: Video,
    pub skipped_at_runtime: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueResponse {
    pub entries: Vec<QueueEntryResponse>,
    /// Compact form, as used in the `queue` URL parameter
    pub serialized: String,
}

#[derive(Debug, Deserialize)]
pub struct AppendRequest {
    pub video_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueUrlRequest {
    pub queue: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct QueueUrlResponse {
    pub queue: String,
    pub reloaded: bool,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub page_size: Option<u32>,
    pub page_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PeerResponse {
    pub peer_id: String,
}

fn status_error(code: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (
        code,
        Json(StatusResponse {
            status: format!("error: {}", message),
        }),
    )
}

fn error_response(e: Error) -> ApiError {
    let code = match &e {
        Error::EntryNotFound(_) | Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::BadRequest(_) | Error::Deserialize(_) => StatusCode::BAD_REQUEST,
        Error::InvalidState(_) => StatusCode::CONFLICT,
        Error::Provider(_) | Error::Signaling(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if code.is_server_error() {
        error!("Request failed: {}", e);
    }
    status_error(code, e)
}

fn playback_state(ctx: &AppContext) -> PlaybackStateResponse {
    let view = ctx.orchestrator.view();
    PlaybackStateResponse {
        playing: view.playing(),
        state: view.state,
        running_entry: view.running_entry,
        loading_entry: view.loading_entry,
    }
}

// ============================================================================
// Health
// ============================================================================

/// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "mxt-player",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ============================================================================
// Playback
// ============================================================================

/// GET /playback/state
pub async fn get_playback_state(State(ctx): State<AppContext>) -> Json<PlaybackStateResponse> {
    Json(playback_state(&ctx))
}

/// POST /playback/toggle
pub async fn toggle_playback(State(ctx): State<AppContext>) -> Json<PlaybackStateResponse> {
    ctx.orchestrator.toggle_playback().await;
    Json(playback_state(&ctx))
}

/// POST /playback/skip/:index
pub async fn skip_to(
    State(ctx): State<AppContext>,
    Path(index): Path<usize>,
) -> Json<PlaybackStateResponse> {
    info!("Skip to queue index {}", index);
    ctx.orchestrator.skip_to(index).await;
    Json(playback_state(&ctx))
}

// ============================================================================
// Queue
// ============================================================================

/// GET /queue
pub async fn get_queue(State(ctx): State<AppContext>) -> Json<QueueResponse> {
    let queue = ctx.queue.snapshot().await;
    Json(QueueResponse {
        entries: queue
            .entries()
            .iter()
            .map(|e| QueueEntryResponse {
                entry_id: e.id,
                video: e.video.clone(),
                skipped_at_runtime: e.skipped_at_runtime,
            })
            .collect(),
        serialized: queue.serialize(),
    })
}

/// POST /queue/append
///
/// The video must be confirmed by the provider before it is queued.
pub async fn append_video(
    State(ctx): State<AppContext>,
    Json(request): Json<AppendRequest>,
) -> Result<(StatusCode, Json<QueueEntryResponse>), ApiError> {
    if !is_valid_video_id(&request.video_id) {
        return Err(status_error(
            StatusCode::BAD_REQUEST,
            format!("invalid video id {:?}", request.video_id),
        ));
    }

    let video = provider::find_confirmed(ctx.provider.as_ref(), &request.video_id)
        .await
        .map_err(error_response)?
        .ok_or_else(|| {
            status_error(
                StatusCode::NOT_FOUND,
                format!("video {} not found", request.video_id),
            )
        })?;

    let entry = ctx
        .queue
        .append_video(video, QueueChangeTrigger::UserAppend)
        .await;
    info!("Appended video {} as entry {}", entry.video.id, entry.id);

    Ok((
        StatusCode::CREATED,
        Json(QueueEntryResponse {
            entry_id: entry.id,
            video: entry.video,
            skipped_at_runtime: entry.skipped_at_runtime,
        }),
    ))
}

/// DELETE /queue/:entry_id
pub async fn remove_entry(
    State(ctx): State<AppContext>,
    Path(entry_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    ctx.queue
        .remove_entry(entry_id)
        .await
        .map_err(error_response)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /queue/url
pub async fn get_queue_url(State(ctx): State<AppContext>) -> Json<QueueUrlResponse> {
    Json(QueueUrlResponse {
        queue: ctx.url_sync.param(),
        reloaded: false,
    })
}

/// PUT /queue/url - navigation to a new `queue` parameter value
pub async fn put_queue_url(
    State(ctx): State<AppContext>,
    Json(request): Json<QueueUrlRequest>,
) -> Result<Json<QueueUrlResponse>, ApiError> {
    let reloaded = ctx
        .url_sync
        .on_navigation(&request.queue)
        .await
        .map_err(error_response)?;

    Ok(Json(QueueUrlResponse {
        queue: request.queue,
        reloaded,
    }))
}

// ============================================================================
// Search
// ============================================================================

/// GET /search?q=&page_size=&page_id=
pub async fn search(
    State(ctx): State<AppContext>,
    Query(params): Query<SearchParams>,
) -> Result<Json<VideoPage>, ApiError> {
    let page = PageRequest {
        page_size: params.page_size.unwrap_or(DEFAULT_SEARCH_PAGE_SIZE),
        page_id: params.page_id,
    };
    debug!("Searching {:?}", params.q);

    ctx.provider
        .search_videos_by_query(&params.q, &page)
        .await
        .map(Json)
        .map_err(error_response)
}

// ============================================================================
// Sharing
// ============================================================================

/// POST /share
pub async fn share_queue(State(ctx): State<AppContext>) -> Result<Json<SessionResponse>, ApiError> {
    let session_id = ctx
        .share
        .get_or_create_session()
        .await
        .map_err(error_response)?;
    Ok(Json(SessionResponse { session_id }))
}

/// POST /share/peers - attach a new peer to the sharing session
pub async fn connect_peer(
    State(ctx): State<AppContext>,
) -> Result<(StatusCode, Json<PeerResponse>), ApiError> {
    let session_id = ctx
        .share
        .session_id()
        .await
        .ok_or_else(|| status_error(StatusCode::CONFLICT, "the queue is not shared"))?;

    let endpoint = Arc::new(ctx.hub.connect());
    endpoint
        .join_session(&session_id)
        .await
        .map_err(error_response)?;

    let peer_id = endpoint.peer_id().to_string();
    ctx.peers.lock().await.insert(peer_id.clone(), endpoint);
    info!("Peer {} connected to session {}", peer_id, session_id);

    Ok((StatusCode::CREATED, Json(PeerResponse { peer_id })))
}

/// POST /share/peers/:peer_id/signal
pub async fn peer_signal(
    State(ctx): State<AppContext>,
    Path(peer_id): Path<String>,
    Json(signal): Json<Signal>,
) -> Result<StatusCode, ApiError> {
    let endpoint = ctx
        .peers
        .lock()
        .await
        .get(&peer_id)
        .cloned()
        .ok_or_else(|| status_error(StatusCode::NOT_FOUND, format!("unknown peer {}", peer_id)))?;

    endpoint.broadcast(signal).await.map_err(|e| {
        warn!("Signal from peer {} rejected: {}", peer_id, e);
        error_response(e)
    })?;
    Ok(StatusCode::ACCEPTED)
}

/// DELETE /share/peers/:peer_id
pub async fn disconnect_peer(
    State(ctx): State<AppContext>,
    Path(peer_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let endpoint = ctx
        .peers
        .lock()
        .await
        .remove(&peer_id)
        .ok_or_else(|| status_error(StatusCode::NOT_FOUND, format!("unknown peer {}", peer_id)))?;

    endpoint.leave();
    Ok(StatusCode::NO_CONTENT)
}
