//! Queue type definitions
//!
//! Supporting types for queue change notifications.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Why the queue changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum QueueChangeTrigger {
    /// Local user appended a video
    UserAppend,
    /// A registered peer appended a video through the shared queue
    PeerAppend,
    /// Local user removed an entry
    UserRemove,
    /// Queue replaced from its serialized form (navigation, shared link)
    Navigation,
}

impl std::fmt::Display for QueueChangeTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueChangeTrigger::UserAppend => write!(f, "UserAppend"),
            QueueChangeTrigger::PeerAppend => write!(f, "PeerAppend"),
            QueueChangeTrigger::UserRemove => write!(f, "UserRemove"),
            QueueChangeTrigger::Navigation => write!(f, "Navigation"),
        }
    }
}

/// Queue entry information for SSE events and API responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueEntryInfo {
    /// Queue entry UUID (stable for the lifetime of the entry)
    pub entry_id: Uuid,
    /// Provider video id
    pub video_id: String,
    /// Video title
    pub title: String,
    /// Set once the entry failed to load during playback
    pub skipped_at_runtime: bool,
}
