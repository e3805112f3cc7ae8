//! Database initialization
//!
//! Creates the Catalog Store on first run and brings an existing one up to
//! the current schema. Every statement is idempotent, so this runs on every
//! startup.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Per-connection pragmas: every pooled connection gets foreign keys,
    // WAL and the busy timeout, not just the first one.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_millis(5000));

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    init_default_settings(&pool).await?;

    Ok(pool)
}

/// Create all Catalog Store tables and indexes (idempotent)
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_content_items_table(pool).await?;
    create_playlists_table(pool).await?;
    create_playlist_entries_table(pool).await?;
    create_segments_table(pool).await?;
    create_stream_status_table(pool).await?;
    create_job_runs_table(pool).await?;
    Ok(())
}

/// Create the settings table
///
/// Stores runtime tunables as key-value pairs.
pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_content_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_items (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            creator TEXT NOT NULL,
            description TEXT,
            category TEXT,
            media_kind TEXT NOT NULL CHECK (media_kind IN ('audio', 'video')),
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'approved', 'rejected')),
            file_path TEXT NOT NULL,
            duration_seconds INTEGER,
            play_count INTEGER NOT NULL DEFAULT 0,
            last_played_at TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_content_items_status_kind ON content_items(status, media_kind)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_playlists_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playlists (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            description TEXT,
            active INTEGER NOT NULL DEFAULT 0 CHECK (active IN (0, 1)),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // At most one active playlist, enforced by the store itself
    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_playlists_single_active ON playlists(active) WHERE active = 1",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_playlist_entries_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS playlist_entries (
            playlist_id TEXT NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
            content_item_id TEXT NOT NULL REFERENCES content_items(id),
            position INTEGER NOT NULL CHECK (position >= 0),
            PRIMARY KEY (playlist_id, position)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_segments_table(pool: &SqlitePool) -> Result<()> {
    // content_item_id UNIQUE is the idempotency key for narration generation
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS segments (
            id TEXT PRIMARY KEY,
            content_item_id TEXT NOT NULL UNIQUE REFERENCES content_items(id) ON DELETE CASCADE,
            narration_text TEXT NOT NULL,
            narration_audio_path TEXT,
            personality TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_stream_status_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS stream_status (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            current_content_item_id TEXT REFERENCES content_items(id) ON DELETE SET NULL,
            current_segment_id TEXT REFERENCES segments(id) ON DELETE SET NULL,
            started_at TEXT,
            listeners INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_job_runs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS job_runs (
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL,
            lane TEXT NOT NULL,
            status TEXT NOT NULL,
            attempts INTEGER NOT NULL DEFAULT 0,
            result_json TEXT,
            last_error TEXT,
            attempt_history_json TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Initialize or update default settings
///
/// Ensures every tunable exists; NULL values are reset to their default.
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Playlist building
    ensure_setting(pool, "playlist_slot_target", "50").await?;
    ensure_setting(pool, "playlist_audio_ratio", "0.7").await?;
    ensure_setting(pool, "playlist_retention_days", "7").await?;

    // Process supervision
    ensure_setting(pool, "control_timeout_ms", "5000").await?;
    ensure_setting(pool, "process_stop_timeout_ms", "10000").await?;
    ensure_setting(pool, "process_start_grace_ms", "3000").await?;
    ensure_setting(pool, "restart_settle_ms", "3000").await?;
    ensure_setting(pool, "video_freshness_secs", "30").await?;

    // Task scheduling
    ensure_setting(pool, "daily_build_time", "06:00").await?;
    ensure_setting(pool, "daily_cleanup_time", "02:00").await?;
    ensure_setting(pool, "health_interval_secs", "300").await?;
    ensure_setting(pool, "retry_base_secs", "2").await?;
    ensure_setting(pool, "retry_jitter", "true").await?;
    ensure_setting(pool, "narration_lane_workers", "2").await?;
    ensure_setting(pool, "media_lane_workers", "1").await?;
    ensure_setting(pool, "scheduling_lane_workers", "1").await?;
    ensure_setting(pool, "maintenance_lane_workers", "1").await?;

    // Health
    ensure_setting(pool, "disk_usage_threshold", "0.9").await?;

    info!("Default settings initialized");
    Ok(())
}

/// Ensure a setting exists with the specified default value
///
/// If the setting doesn't exist, it will be created with the default.
/// If the setting exists but has a NULL value, it will be reset to the default.
pub async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    // INSERT OR IGNORE tolerates concurrent initialization
    let inserted = sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(default_value)
        .execute(pool)
        .await?
        .rows_affected();

    if inserted == 0 {
        sqlx::query("UPDATE settings SET value = ? WHERE key = ? AND value IS NULL")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;
    }

    Ok(())
}
