//! Daily scheduling workflow and retention cleanup
//!
//! Selection, narration, then activation. Narration is attempted for every
//! entry before export starts; an entry whose segment could not be stored
//! is a soft warning since the engine still plays the raw content.

use crate::config::StationPaths;
use crate::db;
use crate::error::{Error, Result};
use crate::health::HealthProbe;
use crate::media::MediaProbe;
use crate::publisher::{Activation, PlaylistPublisher};
use crate::segments::SegmentGenerator;
use crate::selector::ContentSelector;
use crate::supervisor::ProcessSupervisor;
use crate::tasks::{JobKind, JobOutput, JobRunner};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use onair_common::events::{EventBus, OnAirEvent};
use onair_common::time;
use serde::Serialize;
use serde_json::json;
use sqlx::{Pool, Sqlite};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Outcome of one daily build
#[derive(Debug, Clone, Serialize)]
pub struct DailyReport {
    pub playlist_id: Uuid,
    pub entries: usize,
    /// Entries with a stored segment after the narration stage
    pub segments_ready: usize,
    /// Stored segments that have no narration audio
    pub segments_text_only: usize,
    /// Degradations that did not stop the build
    pub warnings: Vec<String>,
    pub activation: Activation,
}

pub struct SchedulerService {
    db: Pool<Sqlite>,
    paths: StationPaths,
    selector: ContentSelector,
    segments: Arc<SegmentGenerator>,
    publisher: PlaylistPublisher,
    supervisor: Arc<ProcessSupervisor>,
    health: HealthProbe,
    media: MediaProbe,
    events: EventBus,
    retention_days: i64,
    narration_concurrency: usize,
}

impl SchedulerService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        db: Pool<Sqlite>,
        paths: StationPaths,
        selector: ContentSelector,
        segments: Arc<SegmentGenerator>,
        publisher: PlaylistPublisher,
        supervisor: Arc<ProcessSupervisor>,
        health: HealthProbe,
        media: MediaProbe,
        events: EventBus,
    ) -> Self {
        Self {
            db,
            paths,
            selector,
            segments,
            publisher,
            supervisor,
            health,
            media,
            events,
            retention_days: 7,
            narration_concurrency: 2,
        }
    }

    pub fn with_retention_days(mut self, days: i64) -> Self {
        self.retention_days = days;
        self
    }

    /// Simultaneous narration requests during a daily build
    pub fn with_narration_concurrency(mut self, concurrency: usize) -> Self {
        self.narration_concurrency = concurrency.max(1);
        self
    }

    pub fn supervisor(&self) -> &Arc<ProcessSupervisor> {
        &self.supervisor
    }

    pub fn health(&self) -> &HealthProbe {
        &self.health
    }

    /// Build, narrate and activate the playlist for `date`
    ///
    /// Fails with [`Error::Stage`] naming the first fatal stage; narration
    /// gaps are reported as warnings on success.
    pub async fn run_daily_scheduling(&self, date: NaiveDate) -> Result<DailyReport> {
        info!(date = %date, "Daily scheduling started");

        let playlist = self
            .selector
            .build_draft_playlist(date)
            .await
            .map_err(|e| stage_failed("select", e))?;
        let entries = db::playlists::list_entry_items(&self.db, playlist.id)
            .await
            .map_err(|e| stage_failed("load_entries", e))?;
        self.events.emit_lossy(OnAirEvent::PlaylistBuilt {
            playlist_id: playlist.id,
            entry_count: entries.len(),
            timestamp: time::now(),
        });

        let mut warnings = Vec::new();
        let mut segments_ready = 0;
        let mut segments_text_only = 0;

        let limiter = Arc::new(Semaphore::new(self.narration_concurrency));
        let mut tasks = JoinSet::new();
        for entry in &entries {
            let generator = self.segments.clone();
            let limiter = limiter.clone();
            let item = entry.item.clone();
            tasks.spawn(async move {
                let _permit = limiter.acquire_owned().await;
                let outcome = generator.ensure_segment(&item).await;
                (item.id, outcome)
            });
        }
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((_, Ok(segment))) => {
                    segments_ready += 1;
                    if segment.narration_audio_path.is_none() {
                        segments_text_only += 1;
                    }
                }
                Ok((item_id, Err(e))) => {
                    warn!(content_item_id = %item_id, error = %e, "Segment not stored, item will play without narration");
                    warnings.push(format!("segment for {}: {}", item_id, e));
                }
                Err(e) => {
                    warn!(error = %e, "Segment task aborted");
                    warnings.push(format!("segment task aborted: {}", e));
                }
            }
        }
        if segments_text_only > 0 {
            warnings.push(format!("{} segments have no narration audio", segments_text_only));
        }

        let activation = self
            .publisher
            .activate(playlist.id)
            .await
            .map_err(|e| stage_failed("publish", e))?;
        if !activation.engine_reloaded {
            warnings.push("broadcast engine did not acknowledge reload".to_string());
        }

        info!(
            playlist_id = %playlist.id,
            entries = entries.len(),
            segments_ready,
            warnings = warnings.len(),
            "Daily scheduling finished"
        );

        Ok(DailyReport {
            playlist_id: playlist.id,
            entries: entries.len(),
            segments_ready,
            segments_text_only,
            warnings,
            activation,
        })
    }

    /// Remove inactive playlists older than the retention window
    ///
    /// Deletes rows (entries cascade) and export files. The active
    /// playlist is never removed whatever its age.
    pub async fn cleanup_old_playlists(&self) -> Result<Vec<Uuid>> {
        let cutoff = time::now() - chrono::Duration::days(self.retention_days);
        let expired = db::playlists::list_expired_inactive(&self.db, cutoff).await?;

        let mut removed = Vec::new();
        for playlist in expired {
            if !db::playlists::delete_inactive(&self.db, playlist.id).await? {
                // Activated since it was listed
                continue;
            }
            let export = self.paths.export_path(playlist.id);
            match tokio::fs::remove_file(&export).await {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(playlist_id = %playlist.id, error = %e, "Failed to remove export file"),
            }
            removed.push(playlist.id);
        }

        if !removed.is_empty() {
            info!(removed = removed.len(), retention_days = self.retention_days, "Old playlists purged");
            self.events.emit_lossy(OnAirEvent::PlaylistsPurged {
                playlist_ids: removed.clone(),
                timestamp: time::now(),
            });
        }
        Ok(removed)
    }
}

/// Log the first fatal stage and wrap its error
fn stage_failed(stage: &'static str, source: Error) -> Error {
    error!(stage, error = %source, "Daily scheduling failed");
    Error::Stage {
        stage,
        source: Box::new(source),
    }
}

#[async_trait]
impl JobRunner for SchedulerService {
    async fn run(&self, kind: &JobKind) -> Result<JobOutput> {
        match kind {
            JobKind::GenerateSegment { content_item_id } => {
                let segment = self.segments.ensure_segment_for(*content_item_id).await?;
                Ok(JobOutput::new(json!({
                    "segment_id": segment.id,
                    "content_item_id": segment.content_item_id,
                    "has_audio": segment.narration_audio_path.is_some(),
                })))
            }
            JobKind::ProbeMedia { content_item_id } => {
                let probed = self.media.probe_item(*content_item_id).await?;
                Ok(JobOutput {
                    result: serde_json::to_value(&probed).unwrap_or_default(),
                    follow_ups: vec![JobKind::GenerateSegment {
                        content_item_id: *content_item_id,
                    }],
                })
            }
            JobKind::DailyBuild => {
                let report = self.run_daily_scheduling(Local::now().date_naive()).await?;
                Ok(JobOutput::new(serde_json::to_value(&report).unwrap_or_default()))
            }
            JobKind::Cleanup => {
                let removed = self.cleanup_old_playlists().await?;
                Ok(JobOutput::new(json!({ "removed": removed })))
            }
            JobKind::HealthCheck => {
                let report = self.health.run().await;
                if let Err(e) = self.supervisor.refresh_listener_count().await {
                    warn!(error = %e, "Listener count not refreshed");
                }
                Ok(JobOutput::new(serde_json::to_value(&report).unwrap_or_default()))
            }
        }
    }
}
