//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`ONAIR_ROOT_FOLDER`)
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "ONAIR_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "onair.db";

/// TOML configuration file contents
///
/// Every section is optional; a missing file yields `TomlConfig::default()`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and media tree
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub narration: NarrationConfig,
    #[serde(default)]
    pub broadcast: BroadcastConfig,
    #[serde(default)]
    pub video: VideoConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive for tracing-subscriber (e.g. "onair_sched=debug")
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "onair_sched=info,onair_common=info".to_string(),
        }
    }
}

/// Narration service endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarrationConfig {
    pub base_url: String,
    pub text_timeout_secs: u64,
    pub tts_timeout_secs: u64,
}

impl Default for NarrationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            text_timeout_secs: 30,
            tts_timeout_secs: 60,
        }
    }
}

/// Broadcast engine processes and control plane
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Streaming server command line (program followed by arguments)
    pub server_command: Vec<String>,
    /// Playlist-reload engine command line
    pub engine_command: Vec<String>,
    /// Control channel address (line protocol)
    pub control_addr: String,
    /// Command namespace used on the control channel (`<namespace>.skip`)
    pub control_namespace: String,
    /// Administrative statistics endpoint
    pub stats_url: String,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            server_command: vec![
                "icecast2".to_string(),
                "-c".to_string(),
                "config/icecast.xml".to_string(),
            ],
            engine_command: vec!["liquidsoap".to_string(), "config/radio.liq".to_string()],
            control_addr: "127.0.0.1:1234".to_string(),
            control_namespace: "onair".to_string(),
            stats_url: "http://localhost:8000/admin/stats.xml".to_string(),
        }
    }
}

/// Video transcoding pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Transcoder program used for the HLS pipeline and for media probing
    pub ffmpeg: String,
    pub ffprobe: String,
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
        }
    }
}

/// Load TOML configuration from an explicit path
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Invalid TOML in {}: {}", path.display(), e)))
}

/// Load TOML configuration, treating a missing file as defaults
///
/// A missing file is not an error; a malformed one is logged and ignored.
pub fn load_toml_config_or_default(path: Option<&Path>) -> TomlConfig {
    let path = match path.map(PathBuf::from).or_else(default_config_path) {
        Some(p) => p,
        None => return TomlConfig::default(),
    };

    if !path.exists() {
        return TomlConfig::default();
    }

    match load_toml_config(&path) {
        Ok(config) => {
            info!("Loaded configuration from {}", path.display());
            config
        }
        Err(e) => {
            warn!("Ignoring configuration file: {}", e);
            TomlConfig::default()
        }
    }
}

/// Write TOML configuration (used by tests and first-run setup)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Failed to serialize config: {}", e)))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

/// Resolves the root folder following the documented priority order
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    toml: Option<TomlConfig>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, toml: Option<TomlConfig>) -> Self {
        Self { cli_arg, toml }
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = self.toml.as_ref().and_then(|t| t.root_folder.clone()) {
            return path;
        }

        // Priority 4: OS-dependent compiled default
        default_root_folder()
    }
}

/// Creates the root folder layout on first run
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root folder and its media subdirectories (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        for dir in [
            self.root.clone(),
            self.root.join("playlists"),
            self.root.join("narration"),
            self.root.join("video_stream").join("hls"),
        ] {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join(DATABASE_FILE)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}

/// Default configuration file path for the platform
fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("onair").join("config.toml"));
    if let Some(path) = &user_config {
        if path.exists() {
            return user_config;
        }
    }
    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/onair/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }
    user_config
}

/// OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("onair"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/onair"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("onair"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/onair"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("onair"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\onair"))
    } else {
        PathBuf::from("./onair_data")
    }
}
