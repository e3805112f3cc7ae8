//! Streaming control endpoints
//!
//! Thin wrappers over the process supervisor plus the now-playing record.

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::db;
use crate::db::stream_status::NowPlaying;
use crate::supervisor::{RestartReport, StageResult, SupervisorStatus};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use onair_common::db::StreamStatus;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct ControlResponse {
    pub response: String,
}

/// Playback report from the broadcast engine
#[derive(Debug, Deserialize)]
pub struct NowPlayingRequest {
    pub content_item_id: Uuid,
    pub segment_id: Option<Uuid>,
}

/// GET /stream/status
pub async fn stream_status(State(state): State<AppState>) -> Json<SupervisorStatus> {
    Json(state.service.supervisor().status().await)
}

/// POST /stream/start
pub async fn start_stream(State(state): State<AppState>) -> ApiResult<Json<StageResult>> {
    let result = state.service.supervisor().start_all().await;
    if !result.audio {
        return Err(ApiError::Upstream("audio streaming failed to start".to_string()));
    }
    Ok(Json(result))
}

/// POST /stream/stop
pub async fn stop_stream(State(state): State<AppState>) -> Json<StageResult> {
    Json(state.service.supervisor().stop_all().await)
}

/// POST /stream/restart
pub async fn restart_stream(State(state): State<AppState>) -> Json<RestartReport> {
    Json(state.service.supervisor().restart().await)
}

/// POST /stream/skip
pub async fn skip_track(State(state): State<AppState>) -> ApiResult<Json<ControlResponse>> {
    let response = state.service.supervisor().skip_track().await?;
    Ok(Json(ControlResponse { response }))
}

/// POST /stream/reload
pub async fn reload_playlist(State(state): State<AppState>) -> ApiResult<Json<ControlResponse>> {
    let response = state.service.supervisor().reload_playlist().await?;
    Ok(Json(ControlResponse { response }))
}

/// GET /stream/current
pub async fn current_track(State(state): State<AppState>) -> ApiResult<Json<ControlResponse>> {
    let response = state.service.supervisor().current_track().await?;
    Ok(Json(ControlResponse { response }))
}

/// GET /stream/now-playing
pub async fn now_playing(State(state): State<AppState>) -> ApiResult<Json<Option<NowPlaying>>> {
    Ok(Json(db::stream_status::current_playing(&state.db).await?))
}

/// POST /stream/now-playing
pub async fn report_now_playing(
    State(state): State<AppState>,
    Json(request): Json<NowPlayingRequest>,
) -> ApiResult<Json<StreamStatus>> {
    let status =
        db::stream_status::update_now_playing(&state.db, request.content_item_id, request.segment_id).await?;
    Ok(Json(status))
}

pub fn stream_routes() -> Router<AppState> {
    Router::new()
        .route("/stream/status", get(stream_status))
        .route("/stream/start", post(start_stream))
        .route("/stream/stop", post(stop_stream))
        .route("/stream/restart", post(restart_stream))
        .route("/stream/skip", post(skip_track))
        .route("/stream/reload", post(reload_playlist))
        .route("/stream/current", get(current_track))
        .route("/stream/now-playing", get(now_playing).post(report_now_playing))
}
