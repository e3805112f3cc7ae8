//! Media probing with the transcoder
//!
//! Runs `ffprobe` on a content item's file and stores its duration when
//! the catalog does not have one yet.

use crate::db;
use crate::error::{Error, Result};
use serde::Deserialize;
use sqlx::{Pool, Sqlite};
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    // ffprobe reports numbers as strings
    duration: Option<String>,
}

/// Whole seconds from ffprobe's JSON output, if it reports a duration
pub fn parse_probe_duration(json: &str) -> Result<Option<i64>> {
    let output: ProbeOutput =
        serde_json::from_str(json).map_err(|e| Error::Media(format!("unreadable probe output: {}", e)))?;
    Ok(output
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(|d| d.round() as i64))
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ProbeResult {
    pub content_item_id: Uuid,
    pub duration_seconds: Option<i64>,
    /// False when the catalog already had a duration
    pub updated: bool,
}

pub struct MediaProbe {
    db: Pool<Sqlite>,
    ffprobe: String,
    timeout: Duration,
}

impl MediaProbe {
    pub fn new(db: Pool<Sqlite>, ffprobe: impl Into<String>, timeout: Duration) -> Self {
        Self {
            db,
            ffprobe: ffprobe.into(),
            timeout,
        }
    }

    pub async fn probe_item(&self, content_item_id: Uuid) -> Result<ProbeResult> {
        let item = db::content::get_content_item(&self.db, content_item_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("content item {}", content_item_id)))?;

        if let Some(existing) = item.duration_seconds {
            debug!(content_item_id = %item.id, duration = existing, "Duration already known");
            return Ok(ProbeResult {
                content_item_id,
                duration_seconds: Some(existing),
                updated: false,
            });
        }

        let duration = self.probe_duration(Path::new(&item.file_path)).await?;
        if let Some(secs) = duration {
            db::content::set_duration(&self.db, item.id, secs).await?;
            info!(content_item_id = %item.id, duration = secs, "Stored probed duration");
        }

        Ok(ProbeResult {
            content_item_id,
            duration_seconds: duration,
            updated: duration.is_some(),
        })
    }

    pub async fn probe_duration(&self, file: &Path) -> Result<Option<i64>> {
        let run = Command::new(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .arg(file)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| Error::Media(format!("{} timed out after {:?}", self.ffprobe, self.timeout)))?
            .map_err(|e| Error::Media(format!("failed to run {}: {}", self.ffprobe, e)))?;

        if !output.status.success() {
            return Err(Error::Media(format!(
                "{} exited with {} for {}",
                self.ffprobe,
                output.status,
                file.display()
            )));
        }

        parse_probe_duration(&String::from_utf8_lossy(&output.stdout))
    }
}
