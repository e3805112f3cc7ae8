//! Operator control router
//!
//! A small surface for operators and the broadcast engine: health,
//! streaming control, on-demand jobs and job status. Listener-facing
//! endpoints live elsewhere.

pub mod error;
pub mod health;
pub mod jobs;
pub mod stream;

pub use error::{ApiError, ApiResult};

use crate::service::SchedulerService;
use crate::tasks::TaskScheduler;
use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub scheduler: TaskScheduler,
    pub service: Arc<SchedulerService>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, scheduler: TaskScheduler, service: Arc<SchedulerService>) -> Self {
        Self {
            db,
            scheduler,
            service,
            startup_time: Utc::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(health::health_routes())
        .merge(stream::stream_routes())
        .merge(jobs::job_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
