//! Content item queries

use super::{corrupt, parse_opt_ts, parse_ts, parse_uuid};
use crate::error::{Error, Result};
use onair_common::db::{ContentItem, ContentStatus, MediaKind};
use onair_common::time;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use std::path::PathBuf;
use uuid::Uuid;

pub(crate) const CONTENT_COLUMNS: &str = "id, title, creator, description, category, media_kind, status, \
     file_path, duration_seconds, play_count, last_played_at, created_at";

pub(crate) fn content_from_row(row: &SqliteRow) -> Result<ContentItem> {
    let media_kind: String = row.get("media_kind");
    let status: String = row.get("status");

    Ok(ContentItem {
        id: parse_uuid(&row.get::<String, _>("id"), "content_items.id")?,
        title: row.get("title"),
        creator: row.get("creator"),
        description: row.get("description"),
        category: row.get("category"),
        media_kind: MediaKind::from_str(&media_kind)
            .ok_or_else(|| corrupt("content_items.media_kind", &media_kind))?,
        status: ContentStatus::from_str(&status)
            .ok_or_else(|| corrupt("content_items.status", &status))?,
        file_path: PathBuf::from(row.get::<String, _>("file_path")),
        duration_seconds: row.get("duration_seconds"),
        play_count: row.get("play_count"),
        last_played_at: parse_opt_ts(row.get("last_played_at"), "content_items.last_played_at")?,
        created_at: parse_ts(&row.get::<String, _>("created_at"), "content_items.created_at")?,
    })
}

/// All approved items of one media kind
pub async fn list_approved(db: &Pool<Sqlite>, kind: MediaKind) -> Result<Vec<ContentItem>> {
    let sql = format!(
        "SELECT {} FROM content_items WHERE status = 'approved' AND media_kind = ? ORDER BY created_at",
        CONTENT_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(kind.as_str()).fetch_all(db).await?;
    rows.iter().map(content_from_row).collect()
}

/// Up to `limit` approved items of one media kind, newest first
pub async fn list_approved_limited(db: &Pool<Sqlite>, kind: MediaKind, limit: i64) -> Result<Vec<ContentItem>> {
    let sql = format!(
        "SELECT {} FROM content_items WHERE status = 'approved' AND media_kind = ? \
         ORDER BY created_at DESC LIMIT ?",
        CONTENT_COLUMNS
    );
    let rows = sqlx::query(&sql).bind(kind.as_str()).bind(limit).fetch_all(db).await?;
    rows.iter().map(content_from_row).collect()
}

pub async fn get_content_item(db: &Pool<Sqlite>, id: Uuid) -> Result<Option<ContentItem>> {
    let sql = format!("SELECT {} FROM content_items WHERE id = ?", CONTENT_COLUMNS);
    let row = sqlx::query(&sql).bind(id.to_string()).fetch_optional(db).await?;
    row.as_ref().map(content_from_row).transpose()
}

/// Insert a content item
///
/// Ingestion lives outside the scheduling core; this is its write path
/// into the store.
pub async fn insert_content_item(db: &Pool<Sqlite>, item: &ContentItem) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO content_items (id, title, creator, description, category, media_kind, status,
                                   file_path, duration_seconds, play_count, last_played_at, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(item.id.to_string())
    .bind(&item.title)
    .bind(&item.creator)
    .bind(&item.description)
    .bind(&item.category)
    .bind(item.media_kind.as_str())
    .bind(item.status.as_str())
    .bind(item.file_path.to_string_lossy().to_string())
    .bind(item.duration_seconds)
    .bind(item.play_count)
    .bind(item.last_played_at.map(time::to_db))
    .bind(time::to_db(item.created_at))
    .execute(db)
    .await?;

    Ok(())
}

/// Record a probed duration
pub async fn set_duration(db: &Pool<Sqlite>, id: Uuid, duration_seconds: i64) -> Result<()> {
    let affected = sqlx::query("UPDATE content_items SET duration_seconds = ? WHERE id = ?")
        .bind(duration_seconds)
        .bind(id.to_string())
        .execute(db)
        .await?
        .rows_affected();

    if affected == 0 {
        return Err(Error::NotFound(format!("content item {}", id)));
    }
    Ok(())
}
