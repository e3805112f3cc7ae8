//! Segment generation
//!
//! One narration segment per content item. Text comes from the narration
//! service, or from a personality template when the service fails; audio
//! is optional and its failure never loses the text. The store's unique
//! key on the content item makes concurrent generation converge on a
//! single segment.

use crate::db;
use crate::error::{Error, Result};
use crate::narration::{NarrationService, Personality};
use chrono::{Local, Timelike};
use onair_common::db::{ContentItem, Segment};
use onair_common::events::{EventBus, OnAirEvent};
use onair_common::time;
use sqlx::{Pool, Sqlite};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub struct SegmentGenerator {
    db: Pool<Sqlite>,
    narration: Arc<dyn NarrationService>,
    events: EventBus,
    text_timeout: Duration,
    tts_timeout: Duration,
}

impl SegmentGenerator {
    pub fn new(db: Pool<Sqlite>, narration: Arc<dyn NarrationService>, events: EventBus) -> Self {
        Self {
            db,
            narration,
            events,
            text_timeout: Duration::from_secs(30),
            tts_timeout: Duration::from_secs(60),
        }
    }

    /// Upper bounds on each narration call, on top of the client's own
    pub fn with_timeouts(mut self, text_timeout: Duration, tts_timeout: Duration) -> Self {
        self.text_timeout = text_timeout;
        self.tts_timeout = tts_timeout;
        self
    }

    /// Return the item's segment, generating it on first use
    pub async fn ensure_segment(&self, item: &ContentItem) -> Result<Segment> {
        if let Some(existing) = db::segments::find_by_content(&self.db, item.id).await? {
            debug!(content_item_id = %item.id, segment_id = %existing.id, "Segment already exists");
            return Ok(existing);
        }

        let personality = Personality::for_hour(Local::now().hour(), &mut rand::thread_rng());

        let prompt = personality.intro_prompt(item);
        let (text, fallback_text) =
            match bounded(self.text_timeout, "generate_text", self.narration.generate_text(&prompt)).await {
                Ok(text) => (text, false),
                Err(e) => {
                    warn!(
                        content_item_id = %item.id,
                        personality = personality.as_str(),
                        error = %e,
                        "Narration text unavailable, using template"
                    );
                    (personality.fallback_intro(item), true)
                }
            };

        let audio_path =
            match bounded(self.tts_timeout, "generate_tts", self.narration.synthesize(item.id, &text)).await {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!(content_item_id = %item.id, error = %e, "Narration audio unavailable, keeping text only");
                    None
                }
            };

        let candidate = Segment {
            id: Uuid::new_v4(),
            content_item_id: item.id,
            narration_text: text,
            narration_audio_path: audio_path,
            personality: Some(personality.as_str().to_string()),
            created_at: time::now(),
        };

        let (stored, created) = db::segments::insert_if_absent(&self.db, &candidate).await?;

        if created {
            info!(
                content_item_id = %item.id,
                segment_id = %stored.id,
                fallback_text,
                has_audio = stored.narration_audio_path.is_some(),
                "Segment created"
            );
            self.events.emit_lossy(OnAirEvent::SegmentCreated {
                segment_id: stored.id,
                content_item_id: item.id,
                fallback_text,
                has_audio: stored.narration_audio_path.is_some(),
                timestamp: time::now(),
            });
        } else {
            // A concurrent run stored its segment first; our audio is orphaned
            debug!(content_item_id = %item.id, segment_id = %stored.id, "Lost segment race, discarding duplicate");
            if let Some(path) = &candidate.narration_audio_path {
                if stored.narration_audio_path.as_ref() != Some(path) {
                    let _ = tokio::fs::remove_file(path).await;
                }
            }
        }

        Ok(stored)
    }

    /// Look up a content item and ensure its segment
    pub async fn ensure_segment_for(&self, content_item_id: Uuid) -> Result<Segment> {
        let item = db::content::get_content_item(&self.db, content_item_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("content item {}", content_item_id)))?;
        self.ensure_segment(&item).await
    }
}

async fn bounded<T>(limit: Duration, call: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| Error::NarrationUnavailable(format!("{} timed out after {:?}", call, limit)))?
}
