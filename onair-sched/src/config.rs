//! Scheduler configuration
//!
//! Runtime tunables live in the `settings` table and are read once at
//! startup; deployment-level values (commands, addresses, URLs) come from
//! the TOML file. Unparseable or missing settings keep their defaults.

use chrono::NaiveTime;
use onair_common::config::TomlConfig;
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

/// Database-backed tunables for the scheduling core
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Total playlist slots per daily build
    pub slot_target: usize,
    /// Share of slots reserved for audio (remainder goes to video)
    pub audio_ratio: f64,
    /// Inactive playlists older than this are purged
    pub retention_days: i64,
    pub control_timeout: Duration,
    pub stop_timeout: Duration,
    /// How long a freshly spawned process must survive to count as started
    pub start_grace: Duration,
    /// Pause between the stop and start stages of a restart
    pub restart_settle: Duration,
    pub video_freshness: Duration,
    pub daily_build_time: NaiveTime,
    pub daily_cleanup_time: NaiveTime,
    pub health_interval: Duration,
    pub retry_base_secs: u64,
    pub retry_jitter: bool,
    pub narration_workers: usize,
    pub media_workers: usize,
    pub scheduling_workers: usize,
    pub maintenance_workers: usize,
    /// Fraction of the media root's disk above which health reports warning
    pub disk_usage_threshold: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            slot_target: 50,
            audio_ratio: 0.7,
            retention_days: 7,
            control_timeout: Duration::from_secs(5),
            stop_timeout: Duration::from_secs(10),
            start_grace: Duration::from_secs(3),
            restart_settle: Duration::from_secs(3),
            video_freshness: Duration::from_secs(30),
            daily_build_time: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default(),
            daily_cleanup_time: NaiveTime::from_hms_opt(2, 0, 0).unwrap_or_default(),
            health_interval: Duration::from_secs(300),
            retry_base_secs: 2,
            retry_jitter: true,
            narration_workers: 2,
            media_workers: 1,
            scheduling_workers: 1,
            maintenance_workers: 1,
            disk_usage_threshold: 0.9,
        }
    }
}

impl SchedulerConfig {
    /// Load scheduler configuration from database settings
    ///
    /// Falls back to the default for every key that is missing or fails to
    /// parse; a bad value is logged, never fatal.
    pub async fn from_database(db_pool: &Pool<Sqlite>) -> Self {
        let mut config = Self::default();

        if let Some(v) = read_setting::<usize>(db_pool, "playlist_slot_target").await {
            config.slot_target = v;
        }
        if let Some(v) = read_setting::<f64>(db_pool, "playlist_audio_ratio").await {
            config.audio_ratio = v.clamp(0.0, 1.0);
        }
        if let Some(v) = read_setting::<i64>(db_pool, "playlist_retention_days").await {
            config.retention_days = v.max(0);
        }
        if let Some(v) = read_setting::<u64>(db_pool, "control_timeout_ms").await {
            config.control_timeout = Duration::from_millis(v);
        }
        if let Some(v) = read_setting::<u64>(db_pool, "process_stop_timeout_ms").await {
            config.stop_timeout = Duration::from_millis(v);
        }
        if let Some(v) = read_setting::<u64>(db_pool, "process_start_grace_ms").await {
            config.start_grace = Duration::from_millis(v);
        }
        if let Some(v) = read_setting::<u64>(db_pool, "restart_settle_ms").await {
            config.restart_settle = Duration::from_millis(v);
        }
        if let Some(v) = read_setting::<u64>(db_pool, "video_freshness_secs").await {
            config.video_freshness = Duration::from_secs(v);
        }
        if let Some(v) = read_time_setting(db_pool, "daily_build_time").await {
            config.daily_build_time = v;
        }
        if let Some(v) = read_time_setting(db_pool, "daily_cleanup_time").await {
            config.daily_cleanup_time = v;
        }
        if let Some(v) = read_setting::<u64>(db_pool, "health_interval_secs").await {
            config.health_interval = Duration::from_secs(v.max(1));
        }
        if let Some(v) = read_setting::<u64>(db_pool, "retry_base_secs").await {
            config.retry_base_secs = v;
        }
        if let Some(v) = read_setting::<String>(db_pool, "retry_jitter").await {
            config.retry_jitter = v.to_lowercase() == "true";
        }
        if let Some(v) = read_setting::<usize>(db_pool, "narration_lane_workers").await {
            config.narration_workers = v.max(1);
        }
        if let Some(v) = read_setting::<usize>(db_pool, "media_lane_workers").await {
            config.media_workers = v.max(1);
        }
        if let Some(v) = read_setting::<usize>(db_pool, "scheduling_lane_workers").await {
            config.scheduling_workers = v.max(1);
        }
        if let Some(v) = read_setting::<usize>(db_pool, "maintenance_lane_workers").await {
            config.maintenance_workers = v.max(1);
        }
        if let Some(v) = read_setting::<f64>(db_pool, "disk_usage_threshold").await {
            config.disk_usage_threshold = v.clamp(0.0, 1.0);
        }

        config
    }
}

async fn read_setting<T: FromStr>(db_pool: &Pool<Sqlite>, key: &str) -> Option<T> {
    let raw = sqlx::query_scalar::<_, String>("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db_pool)
        .await
        .ok()
        .flatten()?;

    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable setting");
            None
        }
    }
}

async fn read_time_setting(db_pool: &Pool<Sqlite>, key: &str) -> Option<NaiveTime> {
    let raw = read_setting::<String>(db_pool, key).await?;
    match NaiveTime::parse_from_str(&raw, "%H:%M") {
        Ok(t) => Some(t),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring setting: expected HH:MM");
            None
        }
    }
}

/// Well-known file locations under the root folder
#[derive(Debug, Clone)]
pub struct StationPaths {
    root: PathBuf,
}

impl StationPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn playlists_dir(&self) -> PathBuf {
        self.root.join("playlists")
    }

    /// Export file for one playlist
    pub fn export_path(&self, playlist_id: Uuid) -> PathBuf {
        self.playlists_dir().join(format!("playlist_{}.m3u", playlist_id))
    }

    /// File the broadcast engine polls for the live playlist
    pub fn current_playlist_path(&self) -> PathBuf {
        self.playlists_dir().join("current.m3u")
    }

    pub fn narration_dir(&self) -> PathBuf {
        self.root.join("narration")
    }

    pub fn video_dir(&self) -> PathBuf {
        self.root.join("video_stream")
    }

    /// Concat list consumed by the video pipeline
    pub fn video_concat_path(&self) -> PathBuf {
        self.video_dir().join("video_playlist.txt")
    }

    pub fn hls_dir(&self) -> PathBuf {
        self.video_dir().join("hls")
    }

    /// Segment index rewritten by the video pipeline
    pub fn hls_manifest_path(&self) -> PathBuf {
        self.hls_dir().join("playlist.m3u8")
    }
}

/// Deployment settings for the external collaborators
///
/// Thin view over the TOML sections the scheduling core needs.
#[derive(Debug, Clone)]
pub struct ExternalConfig {
    pub narration_base_url: String,
    pub narration_text_timeout: Duration,
    pub narration_tts_timeout: Duration,
    pub server_command: Vec<String>,
    pub engine_command: Vec<String>,
    pub control_addr: String,
    pub control_namespace: String,
    pub stats_url: String,
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl From<&TomlConfig> for ExternalConfig {
    fn from(toml: &TomlConfig) -> Self {
        Self {
            narration_base_url: toml.narration.base_url.clone(),
            narration_text_timeout: Duration::from_secs(toml.narration.text_timeout_secs),
            narration_tts_timeout: Duration::from_secs(toml.narration.tts_timeout_secs),
            server_command: toml.broadcast.server_command.clone(),
            engine_command: toml.broadcast.engine_command.clone(),
            control_addr: toml.broadcast.control_addr.clone(),
            control_namespace: toml.broadcast.control_namespace.clone(),
            stats_url: toml.broadcast.stats_url.clone(),
            ffmpeg: toml.video.ffmpeg.clone(),
            ffprobe: toml.video.ffprobe.clone(),
        }
    }
}

impl Default for ExternalConfig {
    fn default() -> Self {
        Self::from(&TomlConfig::default())
    }
}
