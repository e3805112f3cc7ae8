//! Catalog Store models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Media kind of a content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Audio => "audio",
            MediaKind::Video => "video",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "audio" => Some(MediaKind::Audio),
            "video" => Some(MediaKind::Video),
            _ => None,
        }
    }
}

/// Moderation status of a content item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentStatus {
    Pending,
    Approved,
    Rejected,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Pending => "pending",
            ContentStatus::Approved => "approved",
            ContentStatus::Rejected => "rejected",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(ContentStatus::Pending),
            "approved" => Some(ContentStatus::Approved),
            "rejected" => Some(ContentStatus::Rejected),
            _ => None,
        }
    }
}

/// An approved (or pending) media asset owned by the Catalog Store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: Uuid,
    pub title: String,
    pub creator: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub media_kind: MediaKind,
    pub status: ContentStatus,
    pub file_path: PathBuf,
    /// Duration in whole seconds; None when not yet probed
    pub duration_seconds: Option<i64>,
    pub play_count: i64,
    pub last_played_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A playlist header
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One position in a playlist
///
/// Positions within a playlist form a dense zero-based sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub playlist_id: Uuid,
    pub content_item_id: Uuid,
    pub position: i64,
}

/// Generated narration attached to exactly one content item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: Uuid,
    pub content_item_id: Uuid,
    pub narration_text: String,
    /// None when speech synthesis failed; the text is kept regardless
    pub narration_audio_path: Option<PathBuf>,
    pub personality: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Singleton on-air status record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StreamStatus {
    pub current_content_item_id: Option<Uuid>,
    pub current_segment_id: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub listeners: i64,
    pub updated_at: Option<DateTime<Utc>>,
}
