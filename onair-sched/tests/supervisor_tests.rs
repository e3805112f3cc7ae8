//! Process supervision and the control channel

mod helpers;

use helpers::{create_test_db, offline_settings, seed_content, spawn_control_stub};
use onair_common::db::MediaKind;
use onair_common::events::{EventBus, OnAirEvent, ProcessKind, ProcessState};
use onair_sched::config::StationPaths;
use onair_sched::error::Error;
use onair_sched::supervisor::{ProcessSupervisor, SupervisorSettings};
use std::time::{Duration, Instant};

async fn supervisor(settings: SupervisorSettings) -> (tempfile::TempDir, ProcessSupervisor) {
    let (dir, pool) = create_test_db().await.unwrap();
    let paths = StationPaths::new(dir.path());
    (dir, ProcessSupervisor::new(pool, paths, settings, EventBus::new(16)))
}

#[tokio::test]
async fn test_skip_without_engine_fails_within_timeout() {
    let (_dir, supervisor) = supervisor(offline_settings()).await;

    let started = Instant::now();
    let result = supervisor.skip_track().await;
    assert!(matches!(result, Err(Error::ControlChannel(_))));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_control_commands_are_namespaced() {
    let (addr, received, _stub) = spawn_control_stub("Done").await;
    let settings = SupervisorSettings {
        control_addr: addr,
        ..offline_settings()
    };
    let (_dir, supervisor) = supervisor(settings).await;

    assert_eq!(supervisor.skip_track().await.unwrap(), "Done");
    assert_eq!(supervisor.current_track().await.unwrap(), "Done");
    assert_eq!(
        *received.lock().unwrap(),
        vec!["onair.skip".to_string(), "onair.current".to_string()]
    );
}

#[tokio::test]
async fn test_status_with_nothing_running() {
    let (_dir, supervisor) = supervisor(offline_settings()).await;
    let status = supervisor.status().await;

    assert_eq!(status.processes.len(), 3);
    assert!(status.processes.iter().all(|p| p.state == ProcessState::Stopped));
    assert!(!status.server_reachable);
    assert_eq!(status.listeners, 0);
    assert!(!status.video_fresh);
    assert!(!status.video_live);
}

#[tokio::test]
async fn test_video_start_requires_approved_video() {
    let (_dir, supervisor) = supervisor(offline_settings()).await;
    let result = supervisor.start_video().await;
    assert!(matches!(result, Err(Error::ProcessStart(_))));
}

#[tokio::test]
async fn test_stop_when_not_running_is_noop_success() {
    let (_dir, supervisor) = supervisor(offline_settings()).await;
    assert!(supervisor.stop_audio().await);
    assert!(supervisor.stop_video().await);
}

#[cfg(unix)]
#[tokio::test]
async fn test_audio_start_stop_is_idempotent() {
    let (dir, pool) = create_test_db().await.unwrap();
    let events = EventBus::new(64);
    let mut rx = events.subscribe();
    let supervisor = ProcessSupervisor::new(pool, StationPaths::new(dir.path()), offline_settings(), events);

    supervisor.start_audio().await.unwrap();
    supervisor.start_audio().await.unwrap();

    let status = supervisor.status().await;
    let running: Vec<_> = status
        .processes
        .iter()
        .filter(|p| p.state == ProcessState::Running)
        .map(|p| p.process)
        .collect();
    assert_eq!(running, vec![ProcessKind::BroadcastServer, ProcessKind::PlaylistEngine]);

    assert!(supervisor.stop_audio().await);
    assert!(supervisor.stop_audio().await);
    let status = supervisor.status().await;
    assert!(status.processes.iter().all(|p| p.state == ProcessState::Stopped));

    // starting, running, stopping, stopped for each audio process
    let mut transitions = 0;
    while let Ok(event) = rx.try_recv() {
        if let OnAirEvent::ProcessStateChanged { process, .. } = event {
            assert_ne!(process, ProcessKind::VideoPipeline);
            transitions += 1;
        }
    }
    assert_eq!(transitions, 8);
}

#[cfg(unix)]
#[tokio::test]
async fn test_failed_video_pipeline_reports_start_failure() {
    let (dir, pool) = create_test_db().await.unwrap();
    seed_content(&pool, MediaKind::Video, 2).await;
    let paths = StationPaths::new(dir.path());
    let supervisor = ProcessSupervisor::new(pool, paths.clone(), offline_settings(), EventBus::new(16));

    // The configured transcoder exits immediately
    let result = supervisor.start_video().await;
    assert!(matches!(result, Err(Error::ProcessStart(_))));

    let concat = tokio::fs::read_to_string(paths.video_concat_path()).await.unwrap();
    assert_eq!(concat.lines().count(), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn test_restart_reports_each_stage() {
    let (_dir, supervisor) = supervisor(offline_settings()).await;
    supervisor.start_audio().await.unwrap();

    let report = supervisor.restart().await;
    assert!(report.stop.audio);
    assert!(report.stop.video);
    assert!(report.start.audio);
    // No approved video in the catalog
    assert!(!report.start.video);
    assert!(!report.success);

    supervisor.stop_all().await;
}
