//! Event types for the OnAir event system
//!
//! Components announce state changes on a shared [`EventBus`]; the operator
//! router and tests subscribe to observe them. Emission never blocks and a
//! missing subscriber is not an error for lossy events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// External process managed by the supervisor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessKind {
    /// Streaming server that listeners connect to
    BroadcastServer,
    /// Playlist-reload engine feeding the streaming server
    PlaylistEngine,
    /// Video transcoding pipeline producing the HLS manifest
    VideoPipeline,
}

impl ProcessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessKind::BroadcastServer => "broadcast_server",
            ProcessKind::PlaylistEngine => "playlist_engine",
            ProcessKind::VideoPipeline => "video_pipeline",
        }
    }
}

/// Lifecycle state of a managed process
///
/// `Crashed` is only ever observed by a liveness probe; the next start
/// attempt treats it like `Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Stopped,
    Starting,
    Running,
    Stopping,
    Crashed,
}

/// Terminal outcome of a scheduled job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded,
    Failed,
}

/// OnAir event types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum OnAirEvent {
    /// A draft playlist was materialized
    PlaylistBuilt {
        playlist_id: Uuid,
        entry_count: usize,
        timestamp: DateTime<Utc>,
    },

    /// A narration segment was persisted for a content item
    SegmentCreated {
        segment_id: Uuid,
        content_item_id: Uuid,
        /// True when templated text was used instead of generated text
        fallback_text: bool,
        has_audio: bool,
        timestamp: DateTime<Utc>,
    },

    /// The single active playlist changed
    PlaylistActivated {
        playlist_id: Uuid,
        previous_playlist_id: Option<Uuid>,
        timestamp: DateTime<Utc>,
    },

    /// A managed process changed lifecycle state
    ProcessStateChanged {
        process: ProcessKind,
        old_state: ProcessState,
        new_state: ProcessState,
        timestamp: DateTime<Utc>,
    },

    /// A job reached a terminal state
    JobFinished {
        job_id: Uuid,
        kind: String,
        outcome: JobOutcome,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },

    /// Inactive playlists were removed by retention cleanup
    PlaylistsPurged {
        playlist_ids: Vec<Uuid>,
        timestamp: DateTime<Utc>,
    },
}

/// Event bus for broadcasting [`OnAirEvent`]s
///
/// Cloning is cheap; all clones share the same channel.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<OnAirEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// Slow subscribers lose the oldest events once `capacity` is exceeded.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<OnAirEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: OnAirEvent) -> Result<usize, broadcast::error::SendError<OnAirEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: OnAirEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscriber_receives_emitted_event() {
        let bus = EventBus::new(10);
        let mut rx = bus.subscribe();

        let playlist_id = Uuid::new_v4();
        bus.emit(OnAirEvent::PlaylistActivated {
            playlist_id,
            previous_playlist_id: None,
            timestamp: Utc::now(),
        })
        .unwrap();

        match rx.recv().await.unwrap() {
            OnAirEvent::PlaylistActivated { playlist_id: got, .. } => assert_eq!(got, playlist_id),
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_emit_without_subscribers_errors_but_lossy_does_not() {
        let bus = EventBus::new(10);
        let event = OnAirEvent::PlaylistsPurged {
            playlist_ids: vec![],
            timestamp: Utc::now(),
        };
        assert!(bus.emit(event.clone()).is_err());
        bus.emit_lossy(event);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.capacity(), 10);
    }

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = OnAirEvent::ProcessStateChanged {
            process: ProcessKind::VideoPipeline,
            old_state: ProcessState::Starting,
            new_state: ProcessState::Running,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "ProcessStateChanged");
        assert_eq!(json["process"], "video_pipeline");
        assert_eq!(json["new_state"], "running");
    }
}
