//! Test helper utilities
//!
//! Shared by the onair-sched integration tests; not every test file uses
//! every helper.

#![allow(dead_code)]

pub mod db_utils;
pub mod fakes;

pub use db_utils::{backdate_playlist, create_test_db, seed_content, seed_item};
pub use fakes::{closed_addr, spawn_control_stub, FakeNarration, NarrationMode, RecordingEngine};

use onair_common::config::RootFolderInitializer;
use onair_common::events::EventBus;
use onair_sched::config::{SchedulerConfig, StationPaths};
use onair_sched::health::HealthProbe;
use onair_sched::media::MediaProbe;
use onair_sched::publisher::PlaylistPublisher;
use onair_sched::segments::SegmentGenerator;
use onair_sched::selector::ContentSelector;
use onair_sched::service::SchedulerService;
use onair_sched::supervisor::{ProcessSupervisor, SupervisorSettings};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Supervisor settings whose control and stats endpoints refuse connections
pub fn offline_settings() -> SupervisorSettings {
    let control = closed_addr();
    let stats = closed_addr();
    SupervisorSettings {
        server_command: vec!["sleep".to_string(), "30".to_string()],
        engine_command: vec!["sleep".to_string(), "30".to_string()],
        ffmpeg: "false".to_string(),
        control_addr: control,
        control_namespace: "onair".to_string(),
        stats_url: format!("http://{}/admin/stats.xml", stats),
        control_timeout: Duration::from_millis(500),
        stop_timeout: Duration::from_secs(2),
        start_grace: Duration::from_millis(100),
        restart_settle: Duration::from_millis(10),
        video_freshness: Duration::from_secs(30),
    }
}

/// Fully wired scheduling core over a scratch root
pub struct Station {
    pub root: TempDir,
    pub db: SqlitePool,
    pub paths: StationPaths,
    pub events: EventBus,
    pub narration: Arc<FakeNarration>,
    pub engine: Arc<RecordingEngine>,
    pub supervisor: Arc<ProcessSupervisor>,
    pub service: Arc<SchedulerService>,
}

impl Station {
    pub async fn new(mode: NarrationMode) -> Self {
        let (root, db) = create_test_db().await.unwrap();
        RootFolderInitializer::new(root.path().to_path_buf())
            .ensure_directory_exists()
            .unwrap();
        let paths = StationPaths::new(root.path());
        let events = EventBus::new(64);
        let config = SchedulerConfig::default();

        let narration = Arc::new(FakeNarration::new(mode, paths.narration_dir()));
        let engine = Arc::new(RecordingEngine::default());
        let supervisor = Arc::new(ProcessSupervisor::new(
            db.clone(),
            paths.clone(),
            offline_settings(),
            events.clone(),
        ));

        let service = Arc::new(SchedulerService::new(
            db.clone(),
            paths.clone(),
            ContentSelector::new(db.clone(), config.slot_target, config.audio_ratio),
            Arc::new(
                SegmentGenerator::new(db.clone(), narration.clone(), events.clone())
                    .with_timeouts(Duration::from_millis(200), Duration::from_millis(200)),
            ),
            PlaylistPublisher::new(db.clone(), paths.clone(), engine.clone(), events.clone()),
            supervisor.clone(),
            HealthProbe::new(db.clone(), narration.clone(), paths.root().to_path_buf(), 1.0),
            MediaProbe::new(db.clone(), "false", Duration::from_secs(5)),
            events.clone(),
        ));

        Self {
            root,
            db,
            paths,
            events,
            narration,
            engine,
            supervisor,
            service,
        }
    }
}
