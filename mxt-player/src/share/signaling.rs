//! Peer signaling channel
//!
//! Peers meet in a session and exchange typed signals. Everything a channel
//! observes (signals from other peers, peer departures, loss of the network)
//! is delivered as one ordered [`SessionEvent`] stream per subscriber, so a
//! consumer handles them strictly in receipt order.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Connection-scoped peer identifier assigned by the signaling layer
pub type PeerId = String;

/// Signal payload, tagged by signal type
///
/// Wire form: `{"type":"hello","data":"Alice"}` or
/// `{"type":"command","data":{"type":"appendVideo","params":{"videoId":"..."}}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "camelCase")]
pub enum Signal {
    /// Peer announces its display name
    Hello(String),
    Command(Command),
}

/// Queue command sent by a peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "params", rename_all = "camelCase")]
pub enum Command {
    AppendVideo {
        #[serde(rename = "videoId")]
        video_id: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Signal { signal: Signal, from: PeerId },
    PeersLeft(Vec<PeerId>),
    /// The session was lost; no further events follow
    NetworkDisconnected,
}

#[async_trait]
pub trait SignalingChannel: Send + Sync {
    /// Create a new session and join it
    async fn initiate_session(&self) -> Result<String>;

    async fn join_session(&self, session_id: &str) -> Result<()>;

    /// Send a signal to every other member of the current session
    async fn broadcast(&self, signal: Signal) -> Result<()>;

    /// Receive the events of this endpoint from now on
    fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hello_wire_format() {
        let signal = Signal::Hello("Alice".to_string());
        assert_eq!(
            serde_json::to_value(&signal).unwrap(),
            json!({"type": "hello", "data": "Alice"})
        );
    }

    #[test]
    fn test_command_wire_format() {
        let value = json!({
            "type": "command",
            "data": {"type": "appendVideo", "params": {"videoId": "dQw4w9WgXcQ"}}
        });
        let signal: Signal = serde_json::from_value(value.clone()).unwrap();

        assert_eq!(
            signal,
            Signal::Command(Command::AppendVideo {
                video_id: "dQw4w9WgXcQ".to_string()
            })
        );
        assert_eq!(serde_json::to_value(&signal).unwrap(), value);
    }

    #[test]
    fn test_unknown_command_is_rejected() {
        let value = json!({"type": "command", "data": {"type": "removeVideo", "params": {}}});
        assert!(serde_json::from_value::<Signal>(value).is_err());
    }
}
