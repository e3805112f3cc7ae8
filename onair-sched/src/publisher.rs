//! Playlist export and activation
//!
//! Activation runs export, swap, publish in that order. Each stage can
//! fail; earlier stages are not rolled back. The export file is complete
//! on disk before the swap commits, and both the export and the engine's
//! well-known file are replaced by rename so readers never see a partial
//! file. Swap through engine reload runs under one lock, so the engine's
//! file always belongs to the last playlist swapped in.

use crate::config::StationPaths;
use crate::db;
use crate::db::playlists::EntryItem;
use crate::error::{Error, Result};
use crate::supervisor::EngineControl;
use onair_common::db::ContentItem;
use onair_common::events::{EventBus, OnAirEvent};
use onair_common::time;
use serde::Serialize;
use sqlx::{Pool, Sqlite};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

/// Wait budget for the activation swap when the store is busy
const SWAP_LOCK_WAIT_MS: u64 = 5000;

/// One export position: the item plus its playable narration, if any
#[derive(Debug, Clone)]
pub struct ExportEntry {
    pub item: ContentItem,
    pub narration_audio: Option<PathBuf>,
}

/// Outcome of a successful activation
#[derive(Debug, Clone, Serialize)]
pub struct Activation {
    pub playlist_id: Uuid,
    pub previous_playlist_id: Option<Uuid>,
    pub export_path: PathBuf,
    pub entries: usize,
    /// False when the engine could not be told to reload; it still picks
    /// the file up on its next poll or start
    pub engine_reloaded: bool,
}

/// Render an extended M3U playlist
pub fn render_m3u(entries: &[ExportEntry]) -> String {
    let mut out = String::from("#EXTM3U\n");
    for entry in entries {
        let item = &entry.item;
        if let Some(audio) = &entry.narration_audio {
            let _ = writeln!(out, "#EXTINF:-1,Intro - {}", item.title);
            let _ = writeln!(out, "{}", audio.display());
        }
        let duration = item.duration_seconds.unwrap_or(-1);
        let _ = writeln!(out, "#EXTINF:{},{} - {}", duration, item.title, item.creator);
        let _ = writeln!(out, "{}", item.file_path.display());
    }
    out
}

pub struct PlaylistPublisher {
    db: Pool<Sqlite>,
    paths: StationPaths,
    engine: Arc<dyn EngineControl>,
    events: EventBus,
    publish_lock: Mutex<()>,
}

impl PlaylistPublisher {
    pub fn new(db: Pool<Sqlite>, paths: StationPaths, engine: Arc<dyn EngineControl>, events: EventBus) -> Self {
        Self {
            db,
            paths,
            engine,
            events,
            publish_lock: Mutex::new(()),
        }
    }

    /// Write the playlist's export file and return its path
    pub async fn export(&self, playlist_id: Uuid) -> Result<(PathBuf, usize)> {
        if db::playlists::get_playlist(&self.db, playlist_id).await?.is_none() {
            return Err(Error::NotFound(format!("playlist {}", playlist_id)));
        }

        let entries = db::playlists::list_entry_items(&self.db, playlist_id).await?;
        let export_entries = self.resolve_narration(entries).await?;
        let body = render_m3u(&export_entries);

        let path = self.paths.export_path(playlist_id);
        write_replace(&path, body.as_bytes()).await?;

        info!(playlist_id = %playlist_id, entries = export_entries.len(), path = %path.display(), "Playlist exported");
        Ok((path, export_entries.len()))
    }

    /// Export, swap to active, and publish to the broadcast engine
    pub async fn activate(&self, playlist_id: Uuid) -> Result<Activation> {
        let (export_path, entries) = self.export(playlist_id).await?;

        let _publishing = self.publish_lock.lock().await;
        let db = self.db.clone();
        let previous = db::retry::retry_on_lock("playlist activation", SWAP_LOCK_WAIT_MS, || {
            db::playlists::activate(&db, playlist_id)
        })
        .await?;
        info!(playlist_id = %playlist_id, previous = ?previous, "Playlist activated");
        self.events.emit_lossy(OnAirEvent::PlaylistActivated {
            playlist_id,
            previous_playlist_id: previous,
            timestamp: time::now(),
        });

        let contents = tokio::fs::read(&export_path).await?;
        write_replace(&self.paths.current_playlist_path(), &contents).await?;

        let engine_reloaded = match self.engine.reload_playlist().await {
            Ok(response) => {
                info!(response = %response, "Broadcast engine reloaded playlist");
                true
            }
            Err(e) => {
                warn!(error = %e, "Broadcast engine not reloaded; it will read the playlist on next poll");
                false
            }
        };

        Ok(Activation {
            playlist_id,
            previous_playlist_id: previous,
            export_path,
            entries,
            engine_reloaded,
        })
    }

    async fn resolve_narration(&self, entries: Vec<EntryItem>) -> Result<Vec<ExportEntry>> {
        let mut resolved = Vec::with_capacity(entries.len());
        for entry in entries {
            let segment = db::segments::find_by_content(&self.db, entry.item.id).await?;
            let narration_audio = match segment.and_then(|s| s.narration_audio_path) {
                Some(path) if tokio::fs::try_exists(&path).await.unwrap_or(false) => Some(path),
                _ => None,
            };
            resolved.push(ExportEntry {
                item: entry.item,
                narration_audio,
            });
        }
        Ok(resolved)
    }
}

/// Write to a sibling temp file, then rename over `path`
async fn write_replace(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "playlist".to_string());
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));
    tokio::fs::write(&tmp, contents).await?;
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e.into());
    }
    Ok(())
}
