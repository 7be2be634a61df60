//! HTTP request handlers
//!
//! Playback control goes through the shared `PlaybackSession`; narration
//! browsing and submission are passthroughs to the narration source.

use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use podwave_common::events::{PlaybackPosition, PlaybackState, SessionPhase};
use podwave_common::human_time::{format_clock, format_rate, format_remaining};
use podwave_common::narration::{LibraryFilter, Submission, TaskStatus};
use podwave_common::{ItemId, NarrationItem};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use super::server::AppContext;
use crate::source::{wait_for_generation, SourceError};

/// Poll interval while waiting for a submitted narration
const GENERATION_POLL_INTERVAL: Duration = Duration::from_secs(3);
/// Give up waiting for a submitted narration after this long
const GENERATION_TIMEOUT: Duration = Duration::from_secs(600);

type ApiError = (StatusCode, Json<StatusResponse>);

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct BuildInfoResponse {
    pub version: String,
    pub git_hash: String,
    pub build_timestamp: String,
    pub build_profile: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

/// Snapshot plus the derived phase and rate label
#[derive(Debug, Serialize)]
pub struct StateResponse {
    #[serde(flatten)]
    pub state: PlaybackState,
    pub phase: SessionPhase,
    pub rate_display: String,
}

impl From<PlaybackState> for StateResponse {
    fn from(state: PlaybackState) -> Self {
        Self {
            phase: state.phase(),
            rate_display: format_rate(state.playback_rate),
            state,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PositionResponse {
    #[serde(flatten)]
    pub position: PlaybackPosition,
    pub position_display: String,
    pub remaining_display: Option<String>,
}

impl From<PlaybackPosition> for PositionResponse {
    fn from(position: PlaybackPosition) -> Self {
        Self {
            position_display: format_clock(position.position_seconds),
            remaining_display: format_remaining(
                position.position_seconds,
                position.duration_seconds,
            ),
            position,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    pub id: ItemId,
}

#[derive(Debug, Deserialize)]
pub struct SeekRequest {
    pub position_seconds: f64,
}

#[derive(Debug, Deserialize)]
pub struct RateRequest {
    pub rate: f64,
}

/// Narration submission: exactly one of `text` or `url`
#[derive(Debug, Deserialize)]
pub struct CreateNarrationRequest {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Start playback once generation finishes
    #[serde(default)]
    pub play_when_ready: bool,
}

fn error_response(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (
        status,
        Json(StatusResponse {
            status: format!("error: {}", message),
        }),
    )
}

/// Map narration source failures onto HTTP statuses
fn source_error(e: SourceError) -> ApiError {
    let status = match &e {
        SourceError::NotFound(_) => StatusCode::NOT_FOUND,
        SourceError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        SourceError::Api { status, .. } if (400..500).contains(status) => StatusCode::BAD_REQUEST,
        SourceError::Api { .. } | SourceError::Transient(_) | SourceError::Decode(_) => {
            StatusCode::BAD_GATEWAY
        }
    };
    warn!("Narration source request failed: {}", e);
    error_response(status, e)
}

fn parse_item_id(raw: &str) -> Result<ItemId, ApiError> {
    raw.parse::<ItemId>()
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e))
}

// ============================================================================
// Health / Build Info
// ============================================================================

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "podwave-player".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// GET /build_info
pub async fn build_info() -> Json<BuildInfoResponse> {
    Json(BuildInfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_timestamp: env!("BUILD_TIMESTAMP").to_string(),
        build_profile: env!("BUILD_PROFILE").to_string(),
    })
}

// ============================================================================
// Playback
// ============================================================================

/// GET /playback/state
pub async fn get_playback_state(State(ctx): State<AppContext>) -> Json<StateResponse> {
    Json(ctx.session.snapshot().into())
}

/// GET /playback/position
pub async fn get_position(State(ctx): State<AppContext>) -> Json<PositionResponse> {
    Json(ctx.session.position().into())
}

/// POST /playback/play
///
/// Resolves once the item is playing or the attempt failed; failures are
/// reported in `last_error`, not as an HTTP error.
pub async fn play(
    State(ctx): State<AppContext>,
    Json(req): Json<PlayRequest>,
) -> Json<StateResponse> {
    debug!(item_id = %req.id, "Play request");
    Json(ctx.session.play_item(req.id).await.into())
}

/// POST /playback/toggle
pub async fn toggle(State(ctx): State<AppContext>) -> Json<StateResponse> {
    Json(ctx.session.toggle_playback().await.into())
}

/// POST /playback/seek
pub async fn seek(
    State(ctx): State<AppContext>,
    Json(req): Json<SeekRequest>,
) -> Result<Json<PositionResponse>, ApiError> {
    if !req.position_seconds.is_finite() {
        return Err(error_response(StatusCode::BAD_REQUEST, "position must be a number"));
    }
    Ok(Json(ctx.session.seek(req.position_seconds).await.into()))
}

/// POST /playback/rate
pub async fn set_rate(
    State(ctx): State<AppContext>,
    Json(req): Json<RateRequest>,
) -> Result<Json<StateResponse>, ApiError> {
    ctx.session
        .set_playback_rate(req.rate)
        .await
        .map(|state| Json(state.into()))
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e))
}

/// POST /playback/rate/next
pub async fn next_rate(State(ctx): State<AppContext>) -> Result<Json<StateResponse>, ApiError> {
    ctx.session
        .cycle_playback_rate()
        .await
        .map(|state| Json(state.into()))
        .map_err(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e))
}

/// POST /playback/close
pub async fn close(State(ctx): State<AppContext>) -> Json<StateResponse> {
    Json(ctx.session.close_session().await.into())
}

// ============================================================================
// Narrations
// ============================================================================

/// GET /narrations/trending
///
/// Failures yield an empty list.
pub async fn trending(State(ctx): State<AppContext>) -> Json<Vec<NarrationItem>> {
    match ctx.source.fetch_trending().await {
        Ok(items) => Json(items),
        Err(e) => {
            warn!("Trending unavailable: {}", e);
            Json(Vec::new())
        }
    }
}

/// GET /narrations
///
/// Failures yield an empty list.
pub async fn library(
    State(ctx): State<AppContext>,
    Query(filter): Query<LibraryFilter>,
) -> Json<Vec<NarrationItem>> {
    match ctx.source.fetch_library(&filter).await {
        Ok(items) => Json(items),
        Err(e) => {
            warn!("Library unavailable: {}", e);
            Json(Vec::new())
        }
    }
}

/// GET /narrations/:id
pub async fn get_narration(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<NarrationItem>, ApiError> {
    let id = parse_item_id(&id)?;
    ctx.source
        .fetch_status(&id)
        .await
        .map(Json)
        .map_err(source_error)
}

/// POST /narrations
pub async fn create_narration(
    State(ctx): State<AppContext>,
    Json(req): Json<CreateNarrationRequest>,
) -> Result<(StatusCode, Json<Submission>), ApiError> {
    let submission = match (req.text.as_deref(), req.url.as_deref()) {
        (Some(text), None) => ctx.source.create_from_text(text).await,
        (None, Some(url)) => ctx.source.create_from_url(url).await,
        _ => {
            return Err(error_response(
                StatusCode::BAD_REQUEST,
                "provide exactly one of text or url",
            ))
        }
    }
    .map_err(source_error)?;

    if req.play_when_ready {
        let session = ctx.session.clone();
        let source = ctx.source.clone();
        let cancel = ctx.background.clone();
        let item_id = submission.item_id;
        tokio::spawn(async move {
            let ready = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(item_id = %item_id, "Shutting down, no longer waiting for narration");
                    return;
                }
                ready = wait_for_generation(
                    source.as_ref(),
                    &item_id,
                    GENERATION_POLL_INTERVAL,
                    GENERATION_TIMEOUT,
                ) => ready,
            };
            match ready {
                Ok(_) if cancel.is_cancelled() => {
                    debug!(item_id = %item_id, "Shutting down, not starting playback");
                }
                Ok(_) => {
                    info!(item_id = %item_id, "Generated narration ready, starting playback");
                    session.play_item(item_id).await;
                }
                Err(e) => error!(item_id = %item_id, "Not playing submitted narration: {}", e),
            }
        });
    }

    Ok((StatusCode::ACCEPTED, Json(submission)))
}

/// GET /tasks/:task_id
pub async fn task_status(
    State(ctx): State<AppContext>,
    Path(task_id): Path<String>,
) -> Result<Json<TaskStatus>, ApiError> {
    ctx.source
        .task_status(&task_id)
        .await
        .map(Json)
        .map_err(source_error)
}

/// DELETE /narrations/:id
///
/// Deleting the narration that is currently loaded also closes the session.
pub async fn delete_narration(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let id = parse_item_id(&id)?;
    ctx.source.delete(&id).await.map_err(source_error)?;

    if ctx.session.snapshot().current_item_id == Some(id) {
        ctx.session.close_session().await;
    }

    Ok(Json(StatusResponse {
        status: "ok".to_string(),
    }))
}
