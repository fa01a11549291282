//! Event types for the MixTube event system
//!
//! Provides shared event definitions and the EventBus used to fan events out
//! to SSE clients and other observers.

mod playback_types;
mod queue_types;

pub use playback_types::{NotificationLevel, PlaybackState};
pub use queue_types::{QueueChangeTrigger, QueueEntryInfo};

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// MixTube event types
///
/// Events are broadcast via EventBus and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MxtEvent {
    /// Orchestrator playback state changed
    PlaybackStateChanged {
        old_state: PlaybackState,
        new_state: PlaybackState,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// The entry actually playing changed (None once playback stopped)
    RunningEntryChanged {
        entry_id: Option<Uuid>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A user-triggered load started or settled (None when nothing is loading)
    LoadingEntryChanged {
        entry_id: Option<Uuid>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue contents changed
    QueueChanged {
        entries: Vec<QueueEntryInfo>,
        trigger: QueueChangeTrigger,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Entry flagged as skipped because it failed to load
    EntrySkipped {
        entry_id: Uuid,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Hand-off to the next entry is about to happen
    ///
    /// Only emitted when something was playing before.
    ComingNext {
        current_title: String,
        next_title: Option<String>,
        thumbnail_url: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// User-facing notification (info / warning / error)
    Notification {
        level: NotificationLevel,
        message: String,
        duration_ms: u64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue sharing session established
    SharingStarted {
        session_id: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Queue sharing session lost
    SharingEnded {
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl MxtEvent {
    /// Event name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            MxtEvent::PlaybackStateChanged { .. } => "PlaybackStateChanged",
            MxtEvent::RunningEntryChanged { .. } => "RunningEntryChanged",
            MxtEvent::LoadingEntryChanged { .. } => "LoadingEntryChanged",
            MxtEvent::QueueChanged { .. } => "QueueChanged",
            MxtEvent::EntrySkipped { .. } => "EntrySkipped",
            MxtEvent::ComingNext { .. } => "ComingNext",
            MxtEvent::Notification { .. } => "Notification",
            MxtEvent::SharingStarted { .. } => "SharingStarted",
            MxtEvent::SharingEnded { .. } => "SharingEnded",
        }
    }
}

/// One-to-many event broadcaster
///
/// Thin wrapper around `tokio::sync::broadcast`. Slow subscribers lose the
/// oldest events once `capacity` is exceeded.
pub struct EventBus {
    tx: broadcast::Sender<MxtEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use mxt_common::events::EventBus;
    ///
    /// let event_bus = EventBus::new(256);
    /// assert_eq!(event_bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<MxtEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: MxtEvent) -> Result<usize, broadcast::error::SendError<MxtEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: MxtEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
