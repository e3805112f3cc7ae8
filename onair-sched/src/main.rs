//! onair-sched - unattended broadcast scheduler
//!
//! Resolves the root folder, opens the catalog, wires the scheduling
//! components together and serves the operator control router until
//! interrupted.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use onair_common::config::{load_toml_config_or_default, RootFolderInitializer, RootFolderResolver};
use onair_common::events::EventBus;
use onair_sched::api::{build_router, AppState};
use onair_sched::config::{ExternalConfig, SchedulerConfig, StationPaths};
use onair_sched::health::HealthProbe;
use onair_sched::media::MediaProbe;
use onair_sched::narration::{HttpNarrationClient, NarrationService};
use onair_sched::publisher::PlaylistPublisher;
use onair_sched::segments::SegmentGenerator;
use onair_sched::selector::ContentSelector;
use onair_sched::service::SchedulerService;
use onair_sched::supervisor::{EngineControl, ProcessSupervisor, SupervisorSettings};
use onair_sched::tasks::{SchedulerOptions, TaskScheduler};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Bound on one transcoder probe
const MEDIA_PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// How long in-flight jobs get to finish on shutdown
const SHUTDOWN_GRACE: Duration = Duration::from_secs(15);

#[derive(Parser, Debug)]
#[command(name = "onair-sched")]
#[command(about = "Unattended broadcast scheduler")]
#[command(version)]
struct Args {
    /// Port for the operator control router
    #[arg(short, long, default_value = "5790", env = "ONAIR_PORT")]
    port: u16,

    /// Root folder holding the database and media tree
    #[arg(short, long, env = "ONAIR_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long, env = "ONAIR_CONFIG")]
    config: Option<PathBuf>,

    /// Start the streaming processes on launch
    #[arg(long)]
    autostart: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let toml = load_toml_config_or_default(args.config.as_deref());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml.logging.filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting onair-sched {}", env!("CARGO_PKG_VERSION"));

    let root_folder = RootFolderResolver::new(args.root_folder.clone(), Some(toml.clone())).resolve();
    let initializer = RootFolderInitializer::new(root_folder.clone());
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;
    info!("Root folder: {}", root_folder.display());

    let db_path = initializer.database_path();
    let db = onair_common::db::init_database(&db_path)
        .await
        .with_context(|| format!("Failed to open database {}", db_path.display()))?;

    let orphaned = onair_sched::db::jobs::fail_orphaned_runs(&db)
        .await
        .context("Failed to reconcile job runs")?;
    if orphaned > 0 {
        warn!(orphaned, "Marked jobs interrupted by the previous run as failed");
    }

    let config = SchedulerConfig::from_database(&db).await;
    let external = ExternalConfig::from(&toml);
    let paths = StationPaths::new(root_folder);
    let events = EventBus::new(256);

    let narration: Arc<dyn NarrationService> = Arc::new(
        HttpNarrationClient::new(
            external.narration_base_url.clone(),
            external.narration_text_timeout,
            external.narration_tts_timeout,
            paths.narration_dir(),
        )
        .context("Failed to build narration client")?,
    );

    let supervisor = Arc::new(ProcessSupervisor::new(
        db.clone(),
        paths.clone(),
        SupervisorSettings::new(&config, &external),
        events.clone(),
    ));
    let engine: Arc<dyn EngineControl> = supervisor.clone();

    let service = Arc::new(
        SchedulerService::new(
            db.clone(),
            paths.clone(),
            ContentSelector::new(db.clone(), config.slot_target, config.audio_ratio),
            Arc::new(
                SegmentGenerator::new(db.clone(), narration.clone(), events.clone())
                    .with_timeouts(external.narration_text_timeout, external.narration_tts_timeout),
            ),
            PlaylistPublisher::new(db.clone(), paths.clone(), engine, events.clone()),
            supervisor.clone(),
            HealthProbe::new(db.clone(), narration, paths.root().to_path_buf(), config.disk_usage_threshold),
            MediaProbe::new(db.clone(), external.ffprobe.clone(), MEDIA_PROBE_TIMEOUT),
            events.clone(),
        )
        .with_retention_days(config.retention_days)
        .with_narration_concurrency(config.narration_workers),
    );

    let scheduler = TaskScheduler::start(
        db.clone(),
        service.clone(),
        SchedulerOptions::from_config(&config),
        events.clone(),
    );
    scheduler
        .spawn_triggers(config.daily_build_time, config.daily_cleanup_time, config.health_interval)
        .await;

    if args.autostart {
        let started = supervisor.start_all().await;
        info!(audio = started.audio, video = started.video, "Streaming autostart finished");
    }

    let app = build_router(AppState::new(db.clone(), scheduler.clone(), service));
    let addr = SocketAddr::from(([127, 0, 0, 1], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    scheduler.shutdown(SHUTDOWN_GRACE).await;
    let stopped = supervisor.stop_all().await;
    info!(audio = stopped.audio, video = stopped.video, "Managed processes stopped");

    db.close().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received terminate signal, shutting down"),
    }
}
