//! Export and single-active-playlist activation

mod helpers;

use helpers::{seed_content, seed_item, NarrationMode, Station};
use onair_common::db::{MediaKind, Segment};
use onair_common::time;
use onair_sched::db;
use onair_sched::error::Error;
use onair_sched::publisher::PlaylistPublisher;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use uuid::Uuid;

fn publisher(station: &Station) -> PlaylistPublisher {
    PlaylistPublisher::new(
        station.db.clone(),
        station.paths.clone(),
        station.engine.clone(),
        station.events.clone(),
    )
}

async fn active_ids(station: &Station) -> Vec<String> {
    sqlx::query_scalar("SELECT id FROM playlists WHERE active = 1")
        .fetch_all(&station.db)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_export_writes_narration_only_when_audio_exists() {
    let station = Station::new(NarrationMode::Ok).await;
    let narrated = seed_item(&station.db, MediaKind::Audio, "Sunrise", PathBuf::from("/media/sunrise.mp3"), Some(212)).await;
    let missing = seed_item(&station.db, MediaKind::Video, "Harbor", PathBuf::from("/media/harbor.mp4"), None).await;

    let intro = station.paths.narration_dir().join("intro_sunrise.mp3");
    tokio::fs::write(&intro, b"ID3").await.unwrap();
    for (item, audio) in [
        (&narrated, Some(intro.clone())),
        (&missing, Some(PathBuf::from("/nonexistent/intro.mp3"))),
    ] {
        let segment = Segment {
            id: Uuid::new_v4(),
            content_item_id: item.id,
            narration_text: "hello".to_string(),
            narration_audio_path: audio,
            personality: None,
            created_at: time::now(),
        };
        db::segments::insert_if_absent(&station.db, &segment).await.unwrap();
    }

    let playlist = db::playlists::create_draft(&station.db, "Test", None, &[narrated.id, missing.id])
        .await
        .unwrap();
    let (path, entries) = publisher(&station).export(playlist.id).await.unwrap();
    assert_eq!(entries, 2);
    assert_eq!(path, station.paths.export_path(playlist.id));

    let body = tokio::fs::read_to_string(&path).await.unwrap();
    let expected = format!(
        "#EXTM3U\n\
         #EXTINF:-1,Intro - Sunrise\n{}\n\
         #EXTINF:212,Sunrise - Test Creator\n/media/sunrise.mp3\n\
         #EXTINF:-1,Harbor - Test Creator\n/media/harbor.mp4\n",
        intro.display()
    );
    assert_eq!(body, expected);
}

#[tokio::test]
async fn test_activate_publishes_and_reloads_engine() {
    let station = Station::new(NarrationMode::Ok).await;
    let ids = seed_content(&station.db, MediaKind::Audio, 3).await;
    let first = db::playlists::create_draft(&station.db, "First", None, &ids).await.unwrap();
    let second = db::playlists::create_draft(&station.db, "Second", None, &ids[..1]).await.unwrap();
    let publisher = publisher(&station);

    let activation = publisher.activate(first.id).await.unwrap();
    assert_eq!(activation.previous_playlist_id, None);
    assert!(activation.engine_reloaded);

    let activation = publisher.activate(second.id).await.unwrap();
    assert_eq!(activation.previous_playlist_id, Some(first.id));
    assert_eq!(active_ids(&station).await, vec![second.id.to_string()]);

    let current = tokio::fs::read_to_string(station.paths.current_playlist_path()).await.unwrap();
    let exported = tokio::fs::read_to_string(station.paths.export_path(second.id)).await.unwrap();
    assert_eq!(current, exported);
    assert_eq!(station.engine.reloads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_engine_reload_failure_is_soft() {
    let station = Station::new(NarrationMode::Ok).await;
    station.engine.fail.store(true, Ordering::SeqCst);
    let ids = seed_content(&station.db, MediaKind::Audio, 2).await;
    let playlist = db::playlists::create_draft(&station.db, "P", None, &ids).await.unwrap();

    let activation = publisher(&station).activate(playlist.id).await.unwrap();
    assert!(!activation.engine_reloaded);
    assert!(station.paths.current_playlist_path().exists());
    assert_eq!(active_ids(&station).await, vec![playlist.id.to_string()]);
}

#[tokio::test]
async fn test_activate_unknown_playlist_is_not_found() {
    let station = Station::new(NarrationMode::Ok).await;
    let result = publisher(&station).activate(Uuid::new_v4()).await;
    assert!(matches!(result, Err(Error::NotFound(_))));
    assert!(active_ids(&station).await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_activation_leaves_exactly_one_active() {
    let station = Station::new(NarrationMode::Ok).await;
    let ids = seed_content(&station.db, MediaKind::Audio, 4).await;
    let a = db::playlists::create_draft(&station.db, "A", None, &ids[..2]).await.unwrap();
    let b = db::playlists::create_draft(&station.db, "B", None, &ids[2..]).await.unwrap();
    let publisher = Arc::new(publisher(&station));

    for round in 0..50 {
        let first = tokio::spawn({
            let publisher = publisher.clone();
            async move { publisher.activate(a.id).await }
        });
        let second = tokio::spawn({
            let publisher = publisher.clone();
            async move { publisher.activate(b.id).await }
        });
        first.await.unwrap().unwrap();
        second.await.unwrap().unwrap();

        let active = active_ids(&station).await;
        assert_eq!(active.len(), 1);
        assert!(active[0] == a.id.to_string() || active[0] == b.id.to_string());

        // The engine's file is the winner's export
        let winner = Uuid::parse_str(&active[0]).unwrap();
        let published = std::fs::read_to_string(station.paths.current_playlist_path()).unwrap();
        let exported = std::fs::read_to_string(station.paths.export_path(winner)).unwrap();
        assert_eq!(published, exported, "round {} published a losing playlist", round);
    }

    // Playback reports converge on the winner's content
    let winner = Uuid::parse_str(&active_ids(&station).await[0]).unwrap();
    let entries = db::playlists::list_entries(&station.db, winner).await.unwrap();
    db::stream_status::update_now_playing(&station.db, entries[0].content_item_id, None)
        .await
        .unwrap();
    let status = db::stream_status::get_status(&station.db).await.unwrap();
    assert_eq!(status.current_content_item_id, Some(entries[0].content_item_id));
}
