//! Database test utilities

use anyhow::Result;
use chrono::{DateTime, Utc};
use onair_common::db::{init_database, ContentItem, ContentStatus, MediaKind};
use onair_common::time;
use sqlx::SqlitePool;
use std::path::PathBuf;
use tempfile::TempDir;
use uuid::Uuid;

/// Create a scratch root with an initialized catalog
///
/// The TempDir must outlive the pool.
pub async fn create_test_db() -> Result<(TempDir, SqlitePool)> {
    let temp_dir = TempDir::new()?;
    let pool = init_database(&temp_dir.path().join("onair.db")).await?;
    Ok((temp_dir, pool))
}

/// Insert one approved item
pub async fn seed_item(
    db: &SqlitePool,
    kind: MediaKind,
    title: &str,
    file_path: PathBuf,
    duration_seconds: Option<i64>,
) -> ContentItem {
    let item = ContentItem {
        id: Uuid::new_v4(),
        title: title.to_string(),
        creator: "Test Creator".to_string(),
        description: Some("seeded for tests".to_string()),
        category: Some("test".to_string()),
        media_kind: kind,
        status: ContentStatus::Approved,
        file_path,
        duration_seconds,
        play_count: 0,
        last_played_at: None,
        created_at: time::now(),
    };
    onair_sched::db::content::insert_content_item(db, &item).await.unwrap();
    item
}

/// Insert `n` approved items of one kind and return their ids
pub async fn seed_content(db: &SqlitePool, kind: MediaKind, n: usize) -> Vec<Uuid> {
    let mut ids = Vec::with_capacity(n);
    for i in 0..n {
        let path = PathBuf::from(format!("/media/{}/{}.bin", kind.as_str(), i));
        let item = seed_item(db, kind, &format!("{} {}", kind.as_str(), i), path, Some(180)).await;
        ids.push(item.id);
    }
    ids
}

/// Move a playlist's creation time into the past
pub async fn backdate_playlist(db: &SqlitePool, playlist_id: Uuid, created_at: DateTime<Utc>) {
    sqlx::query("UPDATE playlists SET created_at = ? WHERE id = ?")
        .bind(time::to_db(created_at))
        .bind(playlist_id.to_string())
        .execute(db)
        .await
        .unwrap();
}
