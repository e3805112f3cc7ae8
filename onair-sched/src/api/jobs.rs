//! Job submission and status endpoints

use super::error::{ApiError, ApiResult};
use super::AppState;
use crate::tasks::{JobKind, JobStatusView};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize)]
pub struct JobAccepted {
    pub job_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct BatchAccepted {
    pub job_ids: Vec<Uuid>,
}

#[derive(Debug, Deserialize)]
pub struct SegmentBatchRequest {
    pub content_item_ids: Vec<Uuid>,
}

async fn enqueue(state: &AppState, kind: JobKind) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let job_id = state.scheduler.submit(kind).await?;
    Ok((StatusCode::ACCEPTED, Json(JobAccepted { job_id })))
}

/// POST /schedule/daily
pub async fn run_daily_now(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    enqueue(&state, JobKind::DailyBuild).await
}

/// POST /schedule/cleanup
pub async fn run_cleanup_now(State(state): State<AppState>) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    enqueue(&state, JobKind::Cleanup).await
}

/// POST /media/:id/probe
pub async fn probe_media(
    State(state): State<AppState>,
    Path(content_item_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    enqueue(&state, JobKind::ProbeMedia { content_item_id }).await
}

/// POST /segments/batch
pub async fn generate_segments(
    State(state): State<AppState>,
    Json(request): Json<SegmentBatchRequest>,
) -> ApiResult<(StatusCode, Json<BatchAccepted>)> {
    if request.content_item_ids.is_empty() {
        return Err(ApiError::BadRequest("content_item_ids is empty".to_string()));
    }
    let job_ids = state.scheduler.submit_segment_batch(&request.content_item_ids).await?;
    Ok((StatusCode::ACCEPTED, Json(BatchAccepted { job_ids })))
}

/// GET /jobs/:id
pub async fn job_status(State(state): State<AppState>, Path(job_id): Path<Uuid>) -> ApiResult<Json<JobStatusView>> {
    state
        .scheduler
        .job_status(job_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("job {}", job_id)))
}

pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/schedule/daily", post(run_daily_now))
        .route("/schedule/cleanup", post(run_cleanup_now))
        .route("/media/:id/probe", post(probe_media))
        .route("/segments/batch", post(generate_segments))
        .route("/jobs/:id", get(job_status))
}
