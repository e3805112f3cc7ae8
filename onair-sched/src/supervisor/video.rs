//! Video pipeline inputs and liveness
//!
//! The pipeline loops over a concat list and rewrites an HLS index as it
//! encodes. The index's modification time is the only liveness signal: a
//! stale index means the encoder stalled even if its process is alive.
//! This is a heuristic, not a guarantee.

use crate::config::StationPaths;
use crate::error::Result;
use onair_common::db::ContentItem;
use std::path::Path;
use std::time::{Duration, SystemTime};

/// Render a concat list, one `file '<path>'` line per item
pub fn render_concat_list(items: &[ContentItem]) -> String {
    items
        .iter()
        .map(|item| format!("file '{}'\n", escape_concat_path(&item.file_path.to_string_lossy())))
        .collect()
}

/// Quote a path for a single-quoted concat entry
fn escape_concat_path(path: &str) -> String {
    path.replace('\'', r"'\''")
}

/// Write the concat list the pipeline reads
pub async fn write_concat_list(paths: &StationPaths, items: &[ContentItem]) -> Result<()> {
    tokio::fs::create_dir_all(paths.video_dir()).await?;
    tokio::fs::write(paths.video_concat_path(), render_concat_list(items)).await?;
    Ok(())
}

/// Transcoder arguments for the looping HLS pipeline
pub fn pipeline_args(paths: &StationPaths) -> Vec<String> {
    let segment_pattern = paths.hls_dir().join("segment_%03d.ts");
    [
        "-hide_banner",
        "-loglevel",
        "error",
        "-nostdin",
        "-re",
        "-f",
        "concat",
        "-safe",
        "0",
        "-stream_loop",
        "-1",
        "-i",
    ]
    .iter()
    .map(|s| s.to_string())
    .chain([paths.video_concat_path().to_string_lossy().to_string()])
    .chain(
        [
            "-c:v",
            "libx264",
            "-c:a",
            "aac",
            "-preset",
            "veryfast",
            "-g",
            "25",
            "-sc_threshold",
            "0",
            "-f",
            "hls",
            "-hls_time",
            "10",
            "-hls_list_size",
            "6",
            "-hls_flags",
            "delete_segments",
            "-hls_segment_filename",
        ]
        .iter()
        .map(|s| s.to_string()),
    )
    .chain([
        segment_pattern.to_string_lossy().to_string(),
        paths.hls_manifest_path().to_string_lossy().to_string(),
    ])
    .collect()
}

/// True if the manifest exists and was modified within `window`
pub async fn manifest_is_fresh(manifest: &Path, window: Duration) -> bool {
    let modified = match tokio::fs::metadata(manifest).await.and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return false,
    };
    // A clock step backwards makes the file look fresh, which is harmless
    SystemTime::now()
        .duration_since(modified)
        .map(|age| age < window)
        .unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use onair_common::db::{ContentStatus, MediaKind};
    use std::path::PathBuf;
    use uuid::Uuid;

    fn video(path: &str) -> ContentItem {
        ContentItem {
            id: Uuid::new_v4(),
            title: "v".to_string(),
            creator: "c".to_string(),
            description: None,
            category: None,
            media_kind: MediaKind::Video,
            status: ContentStatus::Approved,
            file_path: PathBuf::from(path),
            duration_seconds: None,
            play_count: 0,
            last_played_at: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = render_concat_list(&[video("/media/a.mp4"), video("/media/it's here.mp4")]);
        assert_eq!(list, "file '/media/a.mp4'\nfile '/media/it'\\''s here.mp4'\n");
    }

    #[test]
    fn test_pipeline_reads_concat_and_writes_manifest() {
        let paths = StationPaths::new("/srv/onair");
        let args = pipeline_args(&paths);
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "/srv/onair/video_stream/video_playlist.txt");
        assert_eq!(args.last().unwrap(), "/srv/onair/video_stream/hls/playlist.m3u8");
    }

    #[tokio::test]
    async fn test_manifest_freshness() {
        let dir = tempfile::TempDir::new().unwrap();
        let manifest = dir.path().join("playlist.m3u8");

        assert!(!manifest_is_fresh(&manifest, Duration::from_secs(30)).await);

        std::fs::write(&manifest, "#EXTM3U\n").unwrap();
        assert!(manifest_is_fresh(&manifest, Duration::from_secs(30)).await);
        assert!(!manifest_is_fresh(&manifest, Duration::ZERO).await);
    }
}
