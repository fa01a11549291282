//! Peers that completed the hello handshake

use super::signaling::PeerId;
use std::collections::HashMap;

/// Display name per registered peer
#[derive(Debug, Default)]
pub struct PeerRegistry {
    names: HashMap<PeerId, String>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `peer` under `name`; a peer can only register once
    pub fn register(&mut self, peer: &str, name: &str) -> bool {
        if self.names.contains_key(peer) {
            return false;
        }
        self.names.insert(peer.to_string(), name.to_string());
        true
    }

    pub fn name(&self, peer: &str) -> Option<&str> {
        self.names.get(peer).map(String::as_str)
    }

    pub fn remove(&mut self, peer: &str) -> Option<String> {
        self.names.remove(peer)
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }
}
