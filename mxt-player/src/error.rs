//! Error types for mxt-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;
use uuid::Uuid;

/// Main error type for mxt-player
#[derive(Error, Debug)]
pub enum Error {
    /// Shared errors from mxt-common
    #[error(transparent)]
    Common(#[from] mxt_common::Error),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP server errors
    #[error("HTTP server error: {0}")]
    Http(String),

    /// A media element failed to become playable
    #[error("Load error for video {video_id}: {reason}")]
    Load { video_id: String, reason: String },

    /// No valid entry left to try
    #[error("No playable entry left in the queue")]
    NoPlayableEntry,

    /// Slot preparation abandoned because the slot was finished
    #[error("Preparation cancelled")]
    Cancelled,

    /// Serialized queue is malformed or references unknown videos
    #[error("Cannot load shared queue: {0}")]
    Deserialize(String),

    /// Video provider request failed
    #[error("Video provider error: {0}")]
    Provider(String),

    /// Peer signaling failed (session, broadcast)
    #[error("Signaling error: {0}")]
    Signaling(String),

    /// Queue entry not present
    #[error("Queue entry not found: {0}")]
    EntryNotFound(Uuid),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Invalid request
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience Result type using mxt-player Error
pub type Result<T> = std::result::Result<T, Error>;

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Provider(e.to_string())
    }
}
