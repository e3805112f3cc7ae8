//! Process supervisor
//!
//! Owns the broadcast server, the playlist engine and the video pipeline.
//! The registry mapping each [`ProcessKind`] to its handle lives behind a
//! mutex and is only reachable through the supervisor's operations. Start
//! and stop are idempotent; control commands go over the engine's control
//! channel with a bounded timeout.

pub mod control;
mod process;
pub mod stats;
pub mod video;

pub use control::ControlClient;
pub use stats::StatsClient;

use crate::config::{ExternalConfig, SchedulerConfig, StationPaths};
use crate::db;
use crate::error::{Error, Result};
use async_trait::async_trait;
use onair_common::db::{ContentItem, MediaKind};
use onair_common::events::{EventBus, OnAirEvent, ProcessKind, ProcessState};
use onair_common::time;
use process::ManagedProcess;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Approved videos used when the active playlist has none
const VIDEO_FALLBACK_LIMIT: i64 = 20;

/// Playlist reload hook used by the publisher
#[async_trait]
pub trait EngineControl: Send + Sync {
    async fn reload_playlist(&self) -> Result<String>;
}

/// Commands, addresses and timeouts for the managed processes
#[derive(Debug, Clone)]
pub struct SupervisorSettings {
    pub server_command: Vec<String>,
    pub engine_command: Vec<String>,
    pub ffmpeg: String,
    pub control_addr: String,
    pub control_namespace: String,
    pub stats_url: String,
    pub control_timeout: Duration,
    pub stop_timeout: Duration,
    pub start_grace: Duration,
    pub restart_settle: Duration,
    pub video_freshness: Duration,
}

impl SupervisorSettings {
    pub fn new(config: &SchedulerConfig, external: &ExternalConfig) -> Self {
        Self {
            server_command: external.server_command.clone(),
            engine_command: external.engine_command.clone(),
            ffmpeg: external.ffmpeg.clone(),
            control_addr: external.control_addr.clone(),
            control_namespace: external.control_namespace.clone(),
            stats_url: external.stats_url.clone(),
            control_timeout: config.control_timeout,
            stop_timeout: config.stop_timeout,
            start_grace: config.start_grace,
            restart_settle: config.restart_settle,
            video_freshness: config.video_freshness,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessStatus {
    pub process: ProcessKind,
    pub state: ProcessState,
    pub pid: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SupervisorStatus {
    pub processes: Vec<ProcessStatus>,
    /// Whether the statistics endpoint answered
    pub server_reachable: bool,
    pub listeners: i64,
    /// Video index rewritten within the freshness window
    pub video_fresh: bool,
    /// Video process alive and its index fresh
    pub video_live: bool,
}

/// Per-stage outcome of start or stop of everything
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct StageResult {
    pub audio: bool,
    pub video: bool,
}

impl StageResult {
    pub fn ok(&self) -> bool {
        self.audio && self.video
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RestartReport {
    pub stop: StageResult,
    pub start: StageResult,
    pub success: bool,
}

pub struct ProcessSupervisor {
    db: Pool<Sqlite>,
    paths: StationPaths,
    settings: SupervisorSettings,
    control: ControlClient,
    stats: StatsClient,
    events: EventBus,
    registry: Mutex<HashMap<ProcessKind, ManagedProcess>>,
}

impl ProcessSupervisor {
    pub fn new(db: Pool<Sqlite>, paths: StationPaths, settings: SupervisorSettings, events: EventBus) -> Self {
        let control = ControlClient::new(
            settings.control_addr.clone(),
            settings.control_namespace.clone(),
            settings.control_timeout,
        );
        let stats = StatsClient::new(settings.stats_url.clone(), settings.control_timeout);
        let registry = [ProcessKind::BroadcastServer, ProcessKind::PlaylistEngine, ProcessKind::VideoPipeline]
            .into_iter()
            .map(|kind| (kind, ManagedProcess::new(kind)))
            .collect();

        Self {
            db,
            paths,
            settings,
            control,
            stats,
            events,
            registry: Mutex::new(registry),
        }
    }

    /// Start the broadcast server, then the playlist engine
    pub async fn start_audio(&self) -> Result<()> {
        let mut registry = self.registry.lock().await;
        self.ensure_running(&mut registry, ProcessKind::BroadcastServer, &self.settings.server_command)
            .await?;
        self.ensure_running(&mut registry, ProcessKind::PlaylistEngine, &self.settings.engine_command)
            .await
    }

    /// Stop the playlist engine, then the broadcast server
    ///
    /// Returns false if either needed a force-kill.
    pub async fn stop_audio(&self) -> bool {
        let mut registry = self.registry.lock().await;
        let engine = self.ensure_stopped(&mut registry, ProcessKind::PlaylistEngine).await;
        let server = self.ensure_stopped(&mut registry, ProcessKind::BroadcastServer).await;
        engine && server
    }

    /// Write the video concat list and start the pipeline
    ///
    /// Fails when there is no approved video to loop over.
    pub async fn start_video(&self) -> Result<()> {
        let mut registry = self.registry.lock().await;
        if Self::is_running(&mut registry, ProcessKind::VideoPipeline) {
            return Ok(());
        }

        let videos = self.video_sources().await?;
        if videos.is_empty() {
            return Err(Error::ProcessStart("video_pipeline: no approved video content".to_string()));
        }
        video::write_concat_list(&self.paths, &videos).await?;
        tokio::fs::create_dir_all(self.paths.hls_dir()).await?;
        info!(videos = videos.len(), "Video concat list written");

        let mut command = vec![self.settings.ffmpeg.clone()];
        command.extend(video::pipeline_args(&self.paths));
        self.ensure_running(&mut registry, ProcessKind::VideoPipeline, &command).await
    }

    pub async fn stop_video(&self) -> bool {
        let mut registry = self.registry.lock().await;
        self.ensure_stopped(&mut registry, ProcessKind::VideoPipeline).await
    }

    /// Start audio and video; each reported separately
    pub async fn start_all(&self) -> StageResult {
        let audio = match self.start_audio().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Audio start failed");
                false
            }
        };
        let video = match self.start_video().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Video start failed");
                false
            }
        };
        StageResult { audio, video }
    }

    pub async fn stop_all(&self) -> StageResult {
        StageResult {
            audio: self.stop_audio().await,
            video: self.stop_video().await,
        }
    }

    /// Stop everything, settle, start everything
    pub async fn restart(&self) -> RestartReport {
        info!("Restarting managed processes");
        let stop = self.stop_all().await;
        tokio::time::sleep(self.settings.restart_settle).await;
        let start = self.start_all().await;

        let report = RestartReport {
            stop,
            start,
            success: stop.ok() && start.ok(),
        };
        info!(success = report.success, "Restart finished");
        report
    }

    /// Liveness of each process plus listener count and video freshness
    pub async fn status(&self) -> SupervisorStatus {
        let processes = {
            let mut registry = self.registry.lock().await;
            let mut statuses = Vec::new();
            for kind in [ProcessKind::BroadcastServer, ProcessKind::PlaylistEngine, ProcessKind::VideoPipeline] {
                if let Some(process) = registry.get_mut(&kind) {
                    let before = process.state;
                    let state = process.probe();
                    self.announce(kind, before, state);
                    statuses.push(ProcessStatus {
                        process: kind,
                        state,
                        pid: process.pid(),
                    });
                }
            }
            statuses
        };

        let listeners = self.stats.fetch_listeners().await;
        let video_fresh = video::manifest_is_fresh(&self.paths.hls_manifest_path(), self.settings.video_freshness).await;
        let video_running = processes
            .iter()
            .any(|p| p.process == ProcessKind::VideoPipeline && p.state == ProcessState::Running);

        SupervisorStatus {
            processes,
            server_reachable: listeners.is_some(),
            listeners: listeners.unwrap_or(0),
            video_fresh,
            video_live: video_running && video_fresh,
        }
    }

    /// Poll the listener count and store it on the status record
    pub async fn refresh_listener_count(&self) -> Result<i64> {
        let listeners = self.stats.fetch_listeners().await.unwrap_or(0);
        db::stream_status::update_listeners(&self.db, listeners).await?;
        Ok(listeners)
    }

    pub async fn skip_track(&self) -> Result<String> {
        self.control.skip().await
    }

    pub async fn reload_playlist(&self) -> Result<String> {
        self.control.reload().await
    }

    pub async fn current_track(&self) -> Result<String> {
        self.control.current().await
    }

    async fn video_sources(&self) -> Result<Vec<ContentItem>> {
        if let Some(active) = db::playlists::get_active_playlist(&self.db).await? {
            let videos: Vec<ContentItem> = db::playlists::list_entry_items(&self.db, active.id)
                .await?
                .into_iter()
                .map(|e| e.item)
                .filter(|item| item.media_kind == MediaKind::Video)
                .collect();
            if !videos.is_empty() {
                return Ok(videos);
            }
        }
        db::content::list_approved_limited(&self.db, MediaKind::Video, VIDEO_FALLBACK_LIMIT).await
    }

    fn is_running(registry: &mut HashMap<ProcessKind, ManagedProcess>, kind: ProcessKind) -> bool {
        registry
            .get_mut(&kind)
            .map(|p| p.probe() == ProcessState::Running)
            .unwrap_or(false)
    }

    async fn ensure_running(
        &self,
        registry: &mut HashMap<ProcessKind, ManagedProcess>,
        kind: ProcessKind,
        command: &[String],
    ) -> Result<()> {
        let process = registry
            .entry(kind)
            .or_insert_with(|| ManagedProcess::new(kind));

        let before = process.probe();
        if before == ProcessState::Running {
            return Ok(());
        }

        self.announce(kind, before, ProcessState::Starting);
        let result = process.start(command, self.settings.start_grace).await;
        self.announce(kind, ProcessState::Starting, process.state);
        result
    }

    async fn ensure_stopped(&self, registry: &mut HashMap<ProcessKind, ManagedProcess>, kind: ProcessKind) -> bool {
        let Some(process) = registry.get_mut(&kind) else {
            return true;
        };

        let before = process.probe();
        if before != ProcessState::Running {
            process.state = ProcessState::Stopped;
            self.announce(kind, before, ProcessState::Stopped);
            return true;
        }

        self.announce(kind, before, ProcessState::Stopping);
        let graceful = process.stop(self.settings.stop_timeout).await;
        self.announce(kind, ProcessState::Stopping, process.state);
        graceful
    }

    fn announce(&self, process: ProcessKind, old_state: ProcessState, new_state: ProcessState) {
        if old_state == new_state {
            return;
        }
        info!(
            process = process.as_str(),
            from = ?old_state,
            to = ?new_state,
            "Process state changed"
        );
        self.events.emit_lossy(OnAirEvent::ProcessStateChanged {
            process,
            old_state,
            new_state,
            timestamp: time::now(),
        });
    }
}

#[async_trait]
impl EngineControl for ProcessSupervisor {
    async fn reload_playlist(&self) -> Result<String> {
        self.control.reload().await
    }
}
