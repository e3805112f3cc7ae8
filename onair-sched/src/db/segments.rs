//! Segment queries
//!
//! `segments.content_item_id` is UNIQUE: inserts never create a second
//! segment for an item, and the caller re-reads by key to get the winner.

use super::{parse_ts, parse_uuid};
use crate::error::{Error, Result};
use onair_common::db::Segment;
use onair_common::time;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use std::path::PathBuf;
use uuid::Uuid;

fn segment_from_row(row: &SqliteRow) -> Result<Segment> {
    Ok(Segment {
        id: parse_uuid(&row.get::<String, _>("id"), "segments.id")?,
        content_item_id: parse_uuid(&row.get::<String, _>("content_item_id"), "segments.content_item_id")?,
        narration_text: row.get("narration_text"),
        narration_audio_path: row.get::<Option<String>, _>("narration_audio_path").map(PathBuf::from),
        personality: row.get("personality"),
        created_at: parse_ts(&row.get::<String, _>("created_at"), "segments.created_at")?,
    })
}

pub async fn find_by_content(db: &Pool<Sqlite>, content_item_id: Uuid) -> Result<Option<Segment>> {
    let row = sqlx::query(
        r#"
        SELECT id, content_item_id, narration_text, narration_audio_path, personality, created_at
        FROM segments
        WHERE content_item_id = ?
        "#,
    )
    .bind(content_item_id.to_string())
    .fetch_optional(db)
    .await?;
    row.as_ref().map(segment_from_row).transpose()
}

pub async fn get_segment(db: &Pool<Sqlite>, id: Uuid) -> Result<Option<Segment>> {
    let row = sqlx::query(
        r#"
        SELECT id, content_item_id, narration_text, narration_audio_path, personality, created_at
        FROM segments
        WHERE id = ?
        "#,
    )
    .bind(id.to_string())
    .fetch_optional(db)
    .await?;
    row.as_ref().map(segment_from_row).transpose()
}

/// Insert unless the content item already has a segment
///
/// Returns the stored segment and whether this call created it. When a
/// concurrent writer won, the returned segment is theirs.
pub async fn insert_if_absent(db: &Pool<Sqlite>, segment: &Segment) -> Result<(Segment, bool)> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO segments (id, content_item_id, narration_text, narration_audio_path, personality, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(content_item_id) DO NOTHING
        "#,
    )
    .bind(segment.id.to_string())
    .bind(segment.content_item_id.to_string())
    .bind(&segment.narration_text)
    .bind(segment.narration_audio_path.as_ref().map(|p| p.to_string_lossy().to_string()))
    .bind(&segment.personality)
    .bind(time::to_db(segment.created_at))
    .execute(db)
    .await?
    .rows_affected()
        > 0;

    let stored = find_by_content(db, segment.content_item_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("segment for content item {}", segment.content_item_id)))?;

    Ok((stored, inserted))
}
