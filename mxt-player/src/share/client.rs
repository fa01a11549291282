//! Shared queue, peer side

use super::signaling::{Command, Signal, SignalingChannel};
use crate::error::Result;
use std::sync::Arc;
use tracing::debug;

/// Controls a queue shared by another host
pub struct SharedQueueClient {
    channel: Arc<dyn SignalingChannel>,
}

impl SharedQueueClient {
    pub fn new(channel: Arc<dyn SignalingChannel>) -> Self {
        Self { channel }
    }

    /// The shared queue id is the signaling session id
    pub async fn join_shared_queue(&self, shared_queue_id: &str) -> Result<()> {
        debug!("Joining shared queue {}", shared_queue_id);
        self.channel.join_session(shared_queue_id).await
    }

    /// Announce ourselves; required before any command is accepted
    pub async fn say_hello(&self, name: &str) -> Result<()> {
        self.channel.broadcast(Signal::Hello(name.to_string())).await
    }

    pub async fn append_video(&self, video_id: &str) -> Result<()> {
        self.channel
            .broadcast(Signal::Command(Command::AppendVideo {
                video_id: video_id.to_string(),
            }))
            .await
    }
}
