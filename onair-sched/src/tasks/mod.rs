//! Task scheduler
//!
//! Jobs are routed to one of four lanes by kind. Each lane has its own
//! queue and worker pool, so a narration backlog or a long daily build
//! never delays cleanup or health checks. Failed attempts are retried
//! according to the kind's [`RetryPolicy`]; a job that runs out of
//! attempts is recorded as failed with its full attempt history.
//!
//! The in-memory registry only holds live jobs. Once a terminal record is
//! persisted it is evicted and status queries are answered from
//! `job_runs`.

pub mod job;
pub mod retry;
pub mod triggers;

pub use job::{JobKind, JobOutput, JobRecord, JobRunner, JobStatus, JobStatusView, Lane};
pub use retry::RetryPolicy;

use crate::config::SchedulerConfig;
use crate::db;
use crate::error::{Error, Result};
use chrono::{Local, NaiveTime};
use onair_common::events::{EventBus, JobOutcome, OnAirEvent};
use onair_common::time;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Queue depth per lane before `submit` waits
const LANE_CAPACITY: usize = 256;

/// Worker settings for the scheduler
#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    pub workers: HashMap<Lane, usize>,
    pub retry_base: u64,
    /// Length of one backoff unit; one second outside tests
    pub retry_unit: Duration,
    pub retry_jitter: bool,
}

impl SchedulerOptions {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            workers: HashMap::from([
                (Lane::Narration, config.narration_workers),
                (Lane::Media, config.media_workers),
                (Lane::Scheduling, config.scheduling_workers),
                (Lane::Maintenance, config.maintenance_workers),
            ]),
            retry_base: config.retry_base_secs,
            retry_unit: Duration::from_secs(1),
            retry_jitter: config.retry_jitter,
        }
    }

    fn policy_for(&self, kind: &JobKind) -> RetryPolicy {
        RetryPolicy {
            unit: self.retry_unit,
            ..kind.retry_policy(self.retry_base, self.retry_jitter)
        }
    }
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self::from_config(&SchedulerConfig::default())
    }
}

/// Handle to the lane workers and the job registry
///
/// Cheap to clone; all clones share the same lanes.
#[derive(Clone)]
pub struct TaskScheduler {
    inner: Arc<Inner>,
}

struct Inner {
    db: Pool<Sqlite>,
    runner: Arc<dyn JobRunner>,
    options: SchedulerOptions,
    events: EventBus,
    /// Queued and running jobs, plus terminal ones whose persist failed
    registry: RwLock<HashMap<Uuid, JobRecord>>,
    lanes: HashMap<Lane, mpsc::Sender<Uuid>>,
    cancel: CancellationToken,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl TaskScheduler {
    /// Spawn the worker pools for every lane
    pub fn start(db: Pool<Sqlite>, runner: Arc<dyn JobRunner>, options: SchedulerOptions, events: EventBus) -> Self {
        let mut lanes = HashMap::new();
        let mut receivers = Vec::new();
        for lane in Lane::ALL {
            let (tx, rx) = mpsc::channel(LANE_CAPACITY);
            lanes.insert(lane, tx);
            receivers.push((lane, Arc::new(Mutex::new(rx))));
        }

        let scheduler = Self {
            inner: Arc::new(Inner {
                db,
                runner,
                options,
                events,
                registry: RwLock::new(HashMap::new()),
                lanes,
                cancel: CancellationToken::new(),
                handles: Mutex::new(Vec::new()),
            }),
        };

        let mut handles = Vec::new();
        for (lane, rx) in receivers {
            let count = scheduler.inner.options.workers.get(&lane).copied().unwrap_or(1).max(1);
            for worker in 0..count {
                let this = scheduler.clone();
                let rx = rx.clone();
                handles.push(tokio::spawn(async move { this.worker_loop(lane, worker, rx).await }));
            }
            info!(lane = lane.as_str(), workers = count, "Lane started");
        }

        // Only reachable before any caller holds the scheduler
        if let Ok(mut guard) = scheduler.inner.handles.try_lock() {
            guard.extend(handles);
        }

        scheduler
    }

    /// Queue a job on its lane and return its id
    pub async fn submit(&self, kind: JobKind) -> Result<Uuid> {
        if self.inner.cancel.is_cancelled() {
            return Err(Error::Unavailable("scheduler is shutting down".to_string()));
        }

        let record = JobRecord::queued(kind);
        let id = record.id;
        let lane = record.lane;

        if let Err(e) = db::jobs::save_job_run(&self.inner.db, &record).await {
            warn!(job_id = %id, error = %e, "Failed to persist queued job");
        }
        debug!(job_id = %id, kind = record.kind.name(), lane = lane.as_str(), "Job queued");
        self.inner.registry.write().await.insert(id, record);

        let sender = self
            .inner
            .lanes
            .get(&lane)
            .ok_or_else(|| Error::Unavailable(format!("lane {} missing", lane.as_str())))?;
        sender
            .send(id)
            .await
            .map_err(|_| Error::Unavailable(format!("lane {} closed", lane.as_str())))?;

        Ok(id)
    }

    /// Queue one segment-generation job per content item
    pub async fn submit_segment_batch(&self, content_item_ids: &[Uuid]) -> Result<Vec<Uuid>> {
        let mut job_ids = Vec::with_capacity(content_item_ids.len());
        for &content_item_id in content_item_ids {
            job_ids.push(self.submit(JobKind::GenerateSegment { content_item_id }).await?);
        }
        info!(jobs = job_ids.len(), "Segment batch queued");
        Ok(job_ids)
    }

    /// Status, result and readiness of a job
    ///
    /// Falls back to persisted runs for jobs from a previous process.
    pub async fn job_status(&self, id: Uuid) -> Result<Option<JobStatusView>> {
        if let Some(record) = self.inner.registry.read().await.get(&id) {
            return Ok(Some(record.view()));
        }
        Ok(db::jobs::get_job_run(&self.inner.db, id).await?.map(|r| r.view()))
    }

    /// Full record, including attempt history
    pub async fn job_record(&self, id: Uuid) -> Result<Option<JobRecord>> {
        if let Some(record) = self.inner.registry.read().await.get(&id) {
            return Ok(Some(record.clone()));
        }
        db::jobs::get_job_run(&self.inner.db, id).await
    }

    /// Wait until a job is terminal or `limit` elapses
    pub async fn wait_for(&self, id: Uuid, limit: Duration) -> Result<JobStatusView> {
        let poll = async {
            loop {
                match self.job_status(id).await? {
                    Some(view) if view.ready => return Ok(view),
                    Some(_) => tokio::time::sleep(Duration::from_millis(20)).await,
                    None => return Err(Error::NotFound(format!("job {}", id))),
                }
            }
        };
        tokio::time::timeout(limit, poll)
            .await
            .map_err(|_| Error::Unavailable(format!("job {} not finished within {:?}", id, limit)))?
    }

    /// Spawn the recurring triggers: daily build, daily cleanup, health probe
    pub async fn spawn_triggers(&self, build_at: NaiveTime, cleanup_at: NaiveTime, health_every: Duration) {
        let handles = vec![
            self.spawn_daily(build_at, JobKind::DailyBuild),
            self.spawn_daily(cleanup_at, JobKind::Cleanup),
            self.spawn_interval(health_every, JobKind::HealthCheck),
        ];
        self.inner.handles.lock().await.extend(handles);
        info!(
            build_at = %build_at,
            cleanup_at = %cleanup_at,
            health_every_secs = health_every.as_secs(),
            "Recurring triggers scheduled"
        );
    }

    /// Stop accepting work and wait (bounded) for workers to exit
    pub async fn shutdown(&self, limit: Duration) {
        self.inner.cancel.cancel();
        let handles: Vec<_> = self.inner.handles.lock().await.drain(..).collect();
        let joined = tokio::time::timeout(limit, async {
            for handle in handles {
                let _ = handle.await;
            }
        })
        .await;
        if joined.is_err() {
            warn!("Workers still running after {:?}; abandoning", limit);
        }
        info!("Task scheduler stopped");
    }

    fn spawn_daily(&self, at: NaiveTime, kind: JobKind) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                let wait = triggers::until_next_daily(Local::now().naive_local(), at);
                tokio::select! {
                    _ = this.inner.cancel.cancelled() => break,
                    _ = tokio::time::sleep(wait) => {}
                }
                if let Err(e) = this.submit(kind.clone()).await {
                    warn!(kind = kind.name(), error = %e, "Trigger failed to queue job");
                }
            }
        })
    }

    fn spawn_interval(&self, every: Duration, kind: JobKind) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = this.inner.cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if let Err(e) = this.submit(kind.clone()).await {
                    warn!(kind = kind.name(), error = %e, "Trigger failed to queue job");
                }
            }
        })
    }

    async fn worker_loop(&self, lane: Lane, worker: usize, rx: Arc<Mutex<mpsc::Receiver<Uuid>>>) {
        loop {
            let next = {
                let mut rx = rx.lock().await;
                tokio::select! {
                    _ = self.inner.cancel.cancelled() => None,
                    id = rx.recv() => id,
                }
            };
            let Some(id) = next else {
                break;
            };
            self.run_job(id).await;
        }
        debug!(lane = lane.as_str(), worker, "Worker exited");
    }

    async fn run_job(&self, id: Uuid) {
        let Some(kind) = self.inner.registry.read().await.get(&id).map(|r| r.kind.clone()) else {
            warn!(job_id = %id, "Dequeued unknown job");
            return;
        };
        let policy = self.inner.options.policy_for(&kind);
        let max_attempts = policy.max_attempts();

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.update(id, |r| {
                r.status = JobStatus::Running;
                r.attempts = attempt;
            })
            .await;

            match self.inner.runner.run(&kind).await {
                Ok(output) => {
                    self.update(id, |r| {
                        r.status = JobStatus::Succeeded;
                        r.result = Some(output.result.clone());
                    })
                    .await;
                    self.persist_and_evict(id).await;
                    info!(job_id = %id, kind = kind.name(), attempt, "Job succeeded");
                    self.emit_finished(id, &kind, JobOutcome::Succeeded, attempt);

                    for follow_up in output.follow_ups {
                        if let Err(e) = self.submit(follow_up.clone()).await {
                            warn!(job_id = %id, follow_up = follow_up.name(), error = %e, "Failed to queue follow-up job");
                        }
                    }
                    return;
                }
                Err(err) => {
                    let message = err.to_string();
                    self.update(id, |r| {
                        r.history.push(message.clone());
                        r.last_error = Some(message.clone());
                    })
                    .await;

                    let cancelled = self.inner.cancel.is_cancelled();
                    if attempt >= max_attempts || !err.is_retryable() || cancelled {
                        self.fail(id, &kind, attempt).await;
                        return;
                    }

                    let delay = policy.delay_for(attempt);
                    warn!(
                        job_id = %id,
                        kind = kind.name(),
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %message,
                        "Job attempt failed, retrying"
                    );
                    tokio::select! {
                        _ = self.inner.cancel.cancelled() => {
                            self.fail(id, &kind, attempt).await;
                            return;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }

    async fn fail(&self, id: Uuid, kind: &JobKind, attempts: u32) {
        let history = self
            .inner
            .registry
            .read()
            .await
            .get(&id)
            .map(|r| r.history.clone())
            .unwrap_or_default();
        let terminal = Error::RetryExhausted {
            job: kind.name().to_string(),
            attempts,
            history,
        };
        error!(job_id = %id, kind = kind.name(), attempts, error = %terminal, "Job failed");

        self.update(id, |r| {
            r.status = JobStatus::Failed;
            r.last_error = Some(terminal.to_string());
        })
        .await;
        self.persist_and_evict(id).await;
        self.emit_finished(id, kind, JobOutcome::Failed, attempts);
    }

    async fn update(&self, id: Uuid, f: impl FnOnce(&mut JobRecord)) {
        if let Some(record) = self.inner.registry.write().await.get_mut(&id) {
            f(record);
            record.updated_at = time::now();
        }
    }

    /// Persist a terminal record, then drop it from the registry
    ///
    /// A record that could not be saved stays in memory so its status is
    /// still answerable.
    async fn persist_and_evict(&self, id: Uuid) {
        let Some(record) = self.inner.registry.read().await.get(&id).cloned() else {
            return;
        };
        let db = self.inner.db.clone();
        let saved = db::retry::retry_on_lock("job result", 5000, || db::jobs::save_job_run(&db, &record)).await;
        match saved {
            Ok(()) => {
                self.inner.registry.write().await.remove(&id);
            }
            Err(e) => error!(job_id = %id, error = %e, "Failed to persist job result"),
        }
    }

    /// Number of jobs currently held in memory
    pub async fn tracked_jobs(&self) -> usize {
        self.inner.registry.read().await.len()
    }

    fn emit_finished(&self, id: Uuid, kind: &JobKind, outcome: JobOutcome, attempts: u32) {
        self.inner.events.emit_lossy(OnAirEvent::JobFinished {
            job_id: id,
            kind: kind.name().to_string(),
            outcome,
            attempts,
            timestamp: time::now(),
        });
    }
}
