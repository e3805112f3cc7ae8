//! Playlist and playlist entry queries
//!
//! Drafts are written in one transaction so a reader never sees a header
//! without its entries. Activation swaps the single active flag in one
//! transaction; the partial unique index on `playlists(active)` makes a
//! second active row impossible even if two swaps interleave.

use super::content::{content_from_row, CONTENT_COLUMNS};
use super::{parse_ts, parse_uuid};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use onair_common::db::{ContentItem, Playlist, PlaylistEntry};
use onair_common::time;
use sqlx::sqlite::SqliteRow;
use sqlx::{Pool, Row, Sqlite};
use uuid::Uuid;

/// A playlist position joined with its content item
#[derive(Debug, Clone)]
pub struct EntryItem {
    pub position: i64,
    pub item: ContentItem,
}

fn playlist_from_row(row: &SqliteRow) -> Result<Playlist> {
    Ok(Playlist {
        id: parse_uuid(&row.get::<String, _>("id"), "playlists.id")?,
        name: row.get("name"),
        description: row.get("description"),
        active: row.get::<i64, _>("active") == 1,
        created_at: parse_ts(&row.get::<String, _>("created_at"), "playlists.created_at")?,
        updated_at: parse_ts(&row.get::<String, _>("updated_at"), "playlists.updated_at")?,
    })
}

/// Persist an inactive playlist with entries at positions 0..n-1
pub async fn create_draft(
    db: &Pool<Sqlite>,
    name: &str,
    description: Option<&str>,
    content_ids: &[Uuid],
) -> Result<Playlist> {
    let now = time::now();
    let playlist = Playlist {
        id: Uuid::new_v4(),
        name: name.to_string(),
        description: description.map(str::to_string),
        active: false,
        created_at: now,
        updated_at: now,
    };

    let mut tx = db.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO playlists (id, name, description, active, created_at, updated_at)
        VALUES (?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(playlist.id.to_string())
    .bind(&playlist.name)
    .bind(&playlist.description)
    .bind(time::to_db(now))
    .bind(time::to_db(now))
    .execute(&mut *tx)
    .await?;

    for (position, content_id) in content_ids.iter().enumerate() {
        sqlx::query("INSERT INTO playlist_entries (playlist_id, content_item_id, position) VALUES (?, ?, ?)")
            .bind(playlist.id.to_string())
            .bind(content_id.to_string())
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    Ok(playlist)
}

pub async fn get_playlist(db: &Pool<Sqlite>, id: Uuid) -> Result<Option<Playlist>> {
    let row = sqlx::query("SELECT id, name, description, active, created_at, updated_at FROM playlists WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(db)
        .await?;
    row.as_ref().map(playlist_from_row).transpose()
}

pub async fn get_active_playlist(db: &Pool<Sqlite>) -> Result<Option<Playlist>> {
    let row = sqlx::query(
        "SELECT id, name, description, active, created_at, updated_at FROM playlists WHERE active = 1",
    )
    .fetch_optional(db)
    .await?;
    row.as_ref().map(playlist_from_row).transpose()
}

/// Entries of a playlist in position order
pub async fn list_entries(db: &Pool<Sqlite>, playlist_id: Uuid) -> Result<Vec<PlaylistEntry>> {
    let rows = sqlx::query(
        "SELECT content_item_id, position FROM playlist_entries WHERE playlist_id = ? ORDER BY position",
    )
    .bind(playlist_id.to_string())
    .fetch_all(db)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(PlaylistEntry {
                playlist_id,
                content_item_id: parse_uuid(&row.get::<String, _>("content_item_id"), "playlist_entries.content_item_id")?,
                position: row.get("position"),
            })
        })
        .collect()
}

/// Entries with their content items, in position order
pub async fn list_entry_items(db: &Pool<Sqlite>, playlist_id: Uuid) -> Result<Vec<EntryItem>> {
    let columns = CONTENT_COLUMNS
        .split(", ")
        .map(|c| format!("c.{}", c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT e.position, {} FROM playlist_entries e \
         JOIN content_items c ON c.id = e.content_item_id \
         WHERE e.playlist_id = ? ORDER BY e.position",
        columns
    );

    let rows = sqlx::query(&sql).bind(playlist_id.to_string()).fetch_all(db).await?;
    rows.iter()
        .map(|row| {
            Ok(EntryItem {
                position: row.get("position"),
                item: content_from_row(row)?,
            })
        })
        .collect()
}

/// Make `playlist_id` the single active playlist
///
/// Returns the previously active playlist, if any and different.
pub async fn activate(db: &Pool<Sqlite>, playlist_id: Uuid) -> Result<Option<Uuid>> {
    let now = time::to_db(time::now());
    let mut tx = db.begin().await?;

    // Write first: the transaction takes the write lock before it reads the
    // current holder, so concurrent swaps serialize instead of both reading
    // the same holder.
    let touched = sqlx::query("UPDATE playlists SET updated_at = ? WHERE id = ?")
        .bind(&now)
        .bind(playlist_id.to_string())
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if touched == 0 {
        return Err(Error::NotFound(format!("playlist {}", playlist_id)));
    }

    let previous: Option<String> =
        sqlx::query_scalar("SELECT id FROM playlists WHERE active = 1 AND id != ?")
            .bind(playlist_id.to_string())
            .fetch_optional(&mut *tx)
            .await?;

    sqlx::query("UPDATE playlists SET active = 0, updated_at = ? WHERE active = 1 AND id != ?")
        .bind(&now)
        .bind(playlist_id.to_string())
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE playlists SET active = 1 WHERE id = ?")
        .bind(playlist_id.to_string())
        .execute(&mut *tx)
        .await
        .map_err(activation_error)?;

    tx.commit().await.map_err(activation_error)?;

    previous.map(|id| parse_uuid(&id, "playlists.id")).transpose()
}

fn activation_error(err: sqlx::Error) -> Error {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            Error::ActivationConflict(db_err.message().to_string())
        }
        _ => Error::Database(err),
    }
}

/// Inactive playlists created before `cutoff`
pub async fn list_expired_inactive(db: &Pool<Sqlite>, cutoff: DateTime<Utc>) -> Result<Vec<Playlist>> {
    let rows = sqlx::query(
        r#"
        SELECT id, name, description, active, created_at, updated_at
        FROM playlists
        WHERE active = 0 AND created_at < ?
        ORDER BY created_at
        "#,
    )
    .bind(time::to_db(cutoff))
    .fetch_all(db)
    .await?;
    rows.iter().map(playlist_from_row).collect()
}

/// Delete a playlist and its entries, unless it is active
///
/// The active check is part of the DELETE itself, so a playlist activated
/// after it was listed for cleanup survives. Returns whether a row was
/// removed.
pub async fn delete_inactive(db: &Pool<Sqlite>, playlist_id: Uuid) -> Result<bool> {
    let deleted = sqlx::query("DELETE FROM playlists WHERE id = ? AND active = 0")
        .bind(playlist_id.to_string())
        .execute(db)
        .await?
        .rows_affected();
    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use onair_common::db::{init_database, ContentStatus, MediaKind};
    use std::path::PathBuf;
    use tempfile::TempDir;

    async fn seed_items(db: &Pool<Sqlite>, n: usize) -> Vec<Uuid> {
        let mut ids = Vec::new();
        for i in 0..n {
            let item = ContentItem {
                id: Uuid::new_v4(),
                title: format!("Track {}", i),
                creator: "Tester".to_string(),
                description: None,
                category: None,
                media_kind: MediaKind::Audio,
                status: ContentStatus::Approved,
                file_path: PathBuf::from(format!("/media/{}.mp3", i)),
                duration_seconds: Some(180),
                play_count: 0,
                last_played_at: None,
                created_at: time::now(),
            };
            crate::db::content::insert_content_item(db, &item).await.unwrap();
            ids.push(item.id);
        }
        ids
    }

    #[tokio::test]
    async fn test_create_draft_is_inactive_with_dense_positions() {
        let dir = TempDir::new().unwrap();
        let db = init_database(&dir.path().join("onair.db")).await.unwrap();
        let ids = seed_items(&db, 4).await;

        let playlist = create_draft(&db, "Daily Mix - 2024-03-01", None, &ids).await.unwrap();
        assert!(!playlist.active);

        let entries = list_entries(&db, playlist.id).await.unwrap();
        let positions: Vec<i64> = entries.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
        assert_eq!(entries[2].content_item_id, ids[2]);

        let items = list_entry_items(&db, playlist.id).await.unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[1].item.title, "Track 1");
    }

    #[tokio::test]
    async fn test_activate_swaps_single_holder() {
        let dir = TempDir::new().unwrap();
        let db = init_database(&dir.path().join("onair.db")).await.unwrap();
        let ids = seed_items(&db, 2).await;

        let a = create_draft(&db, "A", None, &ids).await.unwrap();
        let b = create_draft(&db, "B", None, &ids).await.unwrap();

        assert_eq!(activate(&db, a.id).await.unwrap(), None);
        assert_eq!(activate(&db, b.id).await.unwrap(), Some(a.id));
        // Re-activating the holder is a no-op swap
        assert_eq!(activate(&db, b.id).await.unwrap(), None);

        let active = get_active_playlist(&db).await.unwrap().unwrap();
        assert_eq!(active.id, b.id);
        assert!(!get_playlist(&db, a.id).await.unwrap().unwrap().active);
    }

    #[tokio::test]
    async fn test_activate_unknown_playlist() {
        let dir = TempDir::new().unwrap();
        let db = init_database(&dir.path().join("onair.db")).await.unwrap();

        let result = activate(&db, Uuid::new_v4()).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(get_active_playlist(&db).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_inactive_spares_active() {
        let dir = TempDir::new().unwrap();
        let db = init_database(&dir.path().join("onair.db")).await.unwrap();
        let ids = seed_items(&db, 1).await;

        let a = create_draft(&db, "A", None, &ids).await.unwrap();
        let b = create_draft(&db, "B", None, &ids).await.unwrap();
        activate(&db, a.id).await.unwrap();

        assert!(!delete_inactive(&db, a.id).await.unwrap());
        assert!(delete_inactive(&db, b.id).await.unwrap());
        assert!(list_entries(&db, b.id).await.unwrap().is_empty());

        let future = time::now() + chrono::Duration::days(1);
        let expired = list_expired_inactive(&db, future).await.unwrap();
        assert!(expired.is_empty(), "Only the active playlist remains");
    }
}
