//! Content selection for the daily playlist
//!
//! Splits a slot target between audio and video by a fixed ratio, samples
//! each approved pool without replacement (an undersized pool just yields
//! fewer slots), then shuffles the combined list.

use crate::db;
use crate::error::{Error, Result};
use chrono::NaiveDate;
use onair_common::db::{ContentItem, MediaKind, Playlist};
use rand::seq::SliceRandom;
use rand::Rng;
use sqlx::{Pool, Sqlite};
use tracing::info;
use uuid::Uuid;

/// Slot counts per media kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotPlan {
    pub audio: usize,
    pub video: usize,
}

impl SlotPlan {
    /// Quotas capped by pool sizes
    pub fn new(total: usize, audio_ratio: f64, audio_pool: usize, video_pool: usize) -> Self {
        let ratio = audio_ratio.clamp(0.0, 1.0);
        // Epsilon keeps 50 * 0.7 at 35 rather than 34.999...
        let audio_quota = ((total as f64 * ratio) + 1e-9).floor() as usize;
        let audio_quota = audio_quota.min(total);
        let video_quota = total - audio_quota;

        Self {
            audio: audio_quota.min(audio_pool),
            video: video_quota.min(video_pool),
        }
    }

    pub fn total(&self) -> usize {
        self.audio + self.video
    }
}

/// Pick content ids for a playlist, in playback order
pub fn select_slots<R: Rng + ?Sized>(
    audio: &[ContentItem],
    video: &[ContentItem],
    total: usize,
    audio_ratio: f64,
    rng: &mut R,
) -> Vec<Uuid> {
    let plan = SlotPlan::new(total, audio_ratio, audio.len(), video.len());

    let mut picked: Vec<Uuid> = audio
        .choose_multiple(rng, plan.audio)
        .chain(video.choose_multiple(rng, plan.video))
        .map(|item| item.id)
        .collect();
    picked.shuffle(rng);
    picked
}

/// Builds draft playlists from the approved catalog
pub struct ContentSelector {
    db: Pool<Sqlite>,
    slot_target: usize,
    audio_ratio: f64,
}

impl ContentSelector {
    pub fn new(db: Pool<Sqlite>, slot_target: usize, audio_ratio: f64) -> Self {
        Self {
            db,
            slot_target,
            audio_ratio,
        }
    }

    /// Materialize an inactive playlist for `date`
    ///
    /// Fails with [`Error::NoContent`] when there is no approved audio and
    /// no approved video.
    pub async fn build_draft_playlist(&self, date: NaiveDate) -> Result<Playlist> {
        let audio = db::content::list_approved(&self.db, MediaKind::Audio).await?;
        let video = db::content::list_approved(&self.db, MediaKind::Video).await?;

        if audio.is_empty() && video.is_empty() {
            return Err(Error::NoContent);
        }

        let content_ids = select_slots(&audio, &video, self.slot_target, self.audio_ratio, &mut rand::thread_rng());

        let name = format!("Daily Mix - {}", date.format("%Y-%m-%d"));
        let description = format!("Automatically curated playlist for {}", date.format("%B %d, %Y"));
        let playlist = db::playlists::create_draft(&self.db, &name, Some(&description), &content_ids).await?;

        info!(
            playlist_id = %playlist.id,
            entries = content_ids.len(),
            audio_pool = audio.len(),
            video_pool = video.len(),
            "Draft playlist built"
        );
        Ok(playlist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use onair_common::db::ContentStatus;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;
    use std::path::PathBuf;

    fn pool(kind: MediaKind, n: usize) -> Vec<ContentItem> {
        (0..n)
            .map(|i| ContentItem {
                id: Uuid::new_v4(),
                title: format!("{} {}", kind.as_str(), i),
                creator: "c".to_string(),
                description: None,
                category: None,
                media_kind: kind,
                status: ContentStatus::Approved,
                file_path: PathBuf::from(format!("/m/{}", i)),
                duration_seconds: None,
                play_count: 0,
                last_played_at: None,
                created_at: chrono::Utc::now(),
            })
            .collect()
    }

    #[test]
    fn test_plan_default_split() {
        assert_eq!(SlotPlan::new(50, 0.7, 100, 100), SlotPlan { audio: 35, video: 15 });
    }

    #[test]
    fn test_plan_undersized_pools() {
        assert_eq!(SlotPlan::new(50, 0.7, 40, 0), SlotPlan { audio: 35, video: 0 });
        assert_eq!(SlotPlan::new(50, 0.7, 3, 2), SlotPlan { audio: 3, video: 2 });
    }

    #[test]
    fn test_plan_never_exceeds_total_or_pools() {
        for total in [0usize, 1, 7, 50, 51] {
            for ratio in [0.0, 0.3, 0.7, 1.0] {
                for (a, v) in [(0usize, 0usize), (5, 100), (100, 5), (200, 200)] {
                    let plan = SlotPlan::new(total, ratio, a, v);
                    assert!(plan.total() <= total);
                    assert!(plan.audio <= a);
                    assert!(plan.video <= v);
                }
            }
        }
    }

    #[test]
    fn test_selection_has_no_duplicates_and_mixes_kinds() {
        let audio = pool(MediaKind::Audio, 60);
        let video = pool(MediaKind::Video, 30);
        let mut rng = StdRng::seed_from_u64(42);

        let picked = select_slots(&audio, &video, 50, 0.7, &mut rng);
        assert_eq!(picked.len(), 50);

        let unique: HashSet<_> = picked.iter().collect();
        assert_eq!(unique.len(), 50);

        let video_ids: HashSet<_> = video.iter().map(|v| v.id).collect();
        assert_eq!(picked.iter().filter(|id| video_ids.contains(id)).count(), 15);
    }
}
