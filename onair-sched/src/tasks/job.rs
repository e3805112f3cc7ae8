//! Job model: kinds, lanes, status records

use super::retry::RetryPolicy;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Execution lane; each has its own queue and workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Narration,
    Media,
    /// The daily build, which waits on narration for every entry
    Scheduling,
    /// Cleanup and health checks, kept apart from the daily build
    Maintenance,
}

impl Lane {
    pub const ALL: [Lane; 4] = [Lane::Narration, Lane::Media, Lane::Scheduling, Lane::Maintenance];

    pub fn as_str(&self) -> &'static str {
        match self {
            Lane::Narration => "narration",
            Lane::Media => "media",
            Lane::Scheduling => "scheduling",
            Lane::Maintenance => "maintenance",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "succeeded" => Some(JobStatus::Succeeded),
            "failed" => Some(JobStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Succeeded | JobStatus::Failed)
    }
}

/// Unit of work the scheduler can run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobKind {
    GenerateSegment { content_item_id: Uuid },
    ProbeMedia { content_item_id: Uuid },
    DailyBuild,
    Cleanup,
    HealthCheck,
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::GenerateSegment { .. } => "generate_segment",
            JobKind::ProbeMedia { .. } => "probe_media",
            JobKind::DailyBuild => "daily_build",
            JobKind::Cleanup => "cleanup",
            JobKind::HealthCheck => "health_check",
        }
    }

    pub fn lane(&self) -> Lane {
        match self {
            JobKind::GenerateSegment { .. } => Lane::Narration,
            JobKind::ProbeMedia { .. } => Lane::Media,
            JobKind::DailyBuild => Lane::Scheduling,
            JobKind::Cleanup | JobKind::HealthCheck => Lane::Maintenance,
        }
    }

    /// Retry policy for this kind
    ///
    /// Narration retries three times, media twice; scheduling and
    /// maintenance jobs run once and wait for their next trigger.
    pub fn retry_policy(&self, base: u64, jitter: bool) -> RetryPolicy {
        match self.lane() {
            Lane::Narration => RetryPolicy::with_retries(3, base, jitter),
            Lane::Media => RetryPolicy::with_retries(2, base, jitter),
            Lane::Scheduling | Lane::Maintenance => RetryPolicy::none(),
        }
    }
}

/// Bookkeeping for one submitted job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: Uuid,
    pub kind: JobKind,
    pub lane: Lane,
    pub status: JobStatus,
    pub attempts: u32,
    pub result: Option<Value>,
    pub last_error: Option<String>,
    /// One message per failed attempt, oldest first
    pub history: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    pub fn queued(kind: JobKind) -> Self {
        let now = onair_common::time::now();
        Self {
            id: Uuid::new_v4(),
            lane: kind.lane(),
            kind,
            status: JobStatus::Queued,
            attempts: 0,
            result: None,
            last_error: None,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn view(&self) -> JobStatusView {
        JobStatusView {
            status: self.status,
            result: match self.status {
                JobStatus::Succeeded => self.result.clone(),
                JobStatus::Failed => self.last_error.clone().map(Value::String),
                _ => None,
            },
            ready: self.status.is_terminal(),
        }
    }
}

/// Answer to a job status query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusView {
    pub status: JobStatus,
    pub result: Option<Value>,
    pub ready: bool,
}

/// What a successful job produced
#[derive(Debug, Clone, Default)]
pub struct JobOutput {
    pub result: Value,
    /// Jobs to enqueue once this one succeeds
    pub follow_ups: Vec<JobKind>,
}

impl JobOutput {
    pub fn new(result: Value) -> Self {
        Self {
            result,
            follow_ups: Vec::new(),
        }
    }
}

/// Executes job kinds on behalf of the scheduler
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, kind: &JobKind) -> Result<JobOutput>;
}
