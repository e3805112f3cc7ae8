//! Health probe
//!
//! Reports store reachability, narration reachability and disk usage of
//! the media root. Observation only; nothing here takes corrective action.

use crate::narration::NarrationService;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use sysinfo::Disks;
use tracing::{debug, warn};

/// Bound on the store round-trip
const DB_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Warning,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCheck {
    pub name: &'static str,
    pub status: HealthStatus,
    pub detail: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    /// Worst status among the individual checks
    pub status: HealthStatus,
    pub checks: Vec<HealthCheck>,
}

impl HealthReport {
    fn from_checks(checks: Vec<HealthCheck>) -> Self {
        let status = checks
            .iter()
            .map(|c| c.status)
            .max()
            .unwrap_or(HealthStatus::Healthy);
        Self { status, checks }
    }
}

pub struct HealthProbe {
    db: Pool<Sqlite>,
    narration: Arc<dyn NarrationService>,
    media_root: PathBuf,
    disk_threshold: f64,
}

impl HealthProbe {
    pub fn new(db: Pool<Sqlite>, narration: Arc<dyn NarrationService>, media_root: PathBuf, disk_threshold: f64) -> Self {
        Self {
            db,
            narration,
            media_root,
            disk_threshold,
        }
    }

    pub async fn run(&self) -> HealthReport {
        let checks = vec![
            self.check_database().await,
            self.check_narration().await,
            self.check_disk().await,
        ];
        let report = HealthReport::from_checks(checks);
        if report.status == HealthStatus::Healthy {
            debug!("Health check passed");
        } else {
            warn!(status = ?report.status, "Health check degraded");
        }
        report
    }

    async fn check_database(&self) -> HealthCheck {
        let probe = sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(&self.db);
        let (status, detail) = match tokio::time::timeout(DB_PROBE_TIMEOUT, probe).await {
            Ok(Ok(_)) => (HealthStatus::Healthy, "reachable".to_string()),
            Ok(Err(e)) => (HealthStatus::Error, e.to_string()),
            Err(_) => (HealthStatus::Error, "timed out".to_string()),
        };
        HealthCheck {
            name: "database",
            status,
            detail,
        }
    }

    // Narration down only degrades output to templated intros
    async fn check_narration(&self) -> HealthCheck {
        let (status, detail) = match self.narration.health().await {
            Ok(()) => (HealthStatus::Healthy, "reachable".to_string()),
            Err(e) => (HealthStatus::Warning, e.to_string()),
        };
        HealthCheck {
            name: "narration",
            status,
            detail,
        }
    }

    async fn check_disk(&self) -> HealthCheck {
        let root = self.media_root.clone();
        let usage = tokio::task::spawn_blocking(move || disk_usage(&root)).await.ok().flatten();

        let (status, detail) = match usage {
            Some(used) => (
                classify_disk_usage(used, self.disk_threshold),
                format!("{:.1}% used", used * 100.0),
            ),
            None => (HealthStatus::Warning, "no disk found for media root".to_string()),
        };
        HealthCheck {
            name: "disk",
            status,
            detail,
        }
    }
}

/// Warning at or above the threshold, error once the disk is full
pub fn classify_disk_usage(used_fraction: f64, threshold: f64) -> HealthStatus {
    if used_fraction >= 0.99 {
        HealthStatus::Error
    } else if used_fraction >= threshold {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    }
}

/// Used fraction of the disk whose mount point is the longest prefix of `path`
fn disk_usage(path: &Path) -> Option<f64> {
    let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    let disks = Disks::new_with_refreshed_list();
    let disk = disks
        .list()
        .iter()
        .filter(|d| path.starts_with(d.mount_point()))
        .max_by_key(|d| d.mount_point().as_os_str().len())?;

    let total = disk.total_space();
    if total == 0 {
        return None;
    }
    let used = total.saturating_sub(disk.available_space());
    Some(used as f64 / total as f64)
}
