//! Singleton on-air status
//!
//! The `stream_status` table holds at most one row (id = 1). Every write is
//! a single upsert, so readers see either the old or the new state.

use super::content::{content_from_row, CONTENT_COLUMNS};
use super::{parse_opt_ts, parse_opt_uuid};
use crate::db::segments;
use crate::error::{Error, Result};
use onair_common::db::{ContentItem, Segment, StreamStatus};
use onair_common::time;
use serde::Serialize;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

/// Joined view of what is on air
#[derive(Debug, Clone, Serialize)]
pub struct NowPlaying {
    pub item: ContentItem,
    pub segment: Option<Segment>,
    pub status: StreamStatus,
}

/// Current status; default when nothing has been recorded yet
pub async fn get_status(db: &Pool<Sqlite>) -> Result<StreamStatus> {
    let row = sqlx::query(
        r#"
        SELECT current_content_item_id, current_segment_id, started_at, listeners, updated_at
        FROM stream_status
        WHERE id = 1
        "#,
    )
    .fetch_optional(db)
    .await?;

    let Some(row) = row else {
        return Ok(StreamStatus::default());
    };

    Ok(StreamStatus {
        current_content_item_id: parse_opt_uuid(row.get("current_content_item_id"), "stream_status.current_content_item_id")?,
        current_segment_id: parse_opt_uuid(row.get("current_segment_id"), "stream_status.current_segment_id")?,
        started_at: parse_opt_ts(row.get("started_at"), "stream_status.started_at")?,
        listeners: row.get("listeners"),
        updated_at: parse_opt_ts(row.get("updated_at"), "stream_status.updated_at")?,
    })
}

/// Record a new on-air item and count the play
///
/// Status upsert and play-count increment commit together.
pub async fn update_now_playing(
    db: &Pool<Sqlite>,
    content_item_id: Uuid,
    segment_id: Option<Uuid>,
) -> Result<StreamStatus> {
    let now = time::to_db(time::now());
    let mut tx = db.begin().await?;

    let touched = sqlx::query(
        "UPDATE content_items SET play_count = play_count + 1, last_played_at = ? WHERE id = ?",
    )
    .bind(&now)
    .bind(content_item_id.to_string())
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if touched == 0 {
        return Err(Error::NotFound(format!("content item {}", content_item_id)));
    }

    sqlx::query(
        r#"
        INSERT INTO stream_status (id, current_content_item_id, current_segment_id, started_at, listeners, updated_at)
        VALUES (1, ?, ?, ?, 0, ?)
        ON CONFLICT(id) DO UPDATE SET
            current_content_item_id = excluded.current_content_item_id,
            current_segment_id = excluded.current_segment_id,
            started_at = excluded.started_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(content_item_id.to_string())
    .bind(segment_id.map(|id| id.to_string()))
    .bind(&now)
    .bind(&now)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    get_status(db).await
}

/// Record the latest listener count, creating the row if needed
pub async fn update_listeners(db: &Pool<Sqlite>, listeners: i64) -> Result<()> {
    let now = time::to_db(time::now());
    sqlx::query(
        r#"
        INSERT INTO stream_status (id, listeners, updated_at)
        VALUES (1, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            listeners = excluded.listeners,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(listeners.max(0))
    .bind(&now)
    .execute(db)
    .await?;
    Ok(())
}

/// Content and narration currently on air, if anything is
pub async fn current_playing(db: &Pool<Sqlite>) -> Result<Option<NowPlaying>> {
    let status = get_status(db).await?;
    let Some(content_id) = status.current_content_item_id else {
        return Ok(None);
    };

    let sql = format!("SELECT {} FROM content_items WHERE id = ?", CONTENT_COLUMNS);
    let Some(row) = sqlx::query(&sql).bind(content_id.to_string()).fetch_optional(db).await? else {
        return Ok(None);
    };
    let item = content_from_row(&row)?;

    let segment = match status.current_segment_id {
        Some(segment_id) => segments::get_segment(db, segment_id).await?,
        None => None,
    };

    Ok(Some(NowPlaying { item, segment, status }))
}
