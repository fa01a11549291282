//! In-process signaling hub
//!
//! Plays the role of the signaling service for peers living in the same
//! process: the host's own endpoint, peers attached through the HTTP API,
//! and tests. Each [`LocalEndpoint`] is one connection with its own peer id.

use super::signaling::{PeerId, SessionEvent, Signal, SignalingChannel};
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

type Subscribers = Mutex<Vec<mpsc::UnboundedSender<SessionEvent>>>;

fn deliver(subscribers: &Subscribers, event: &SessionEvent) {
    subscribers
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .retain(|tx| tx.send(event.clone()).is_ok());
}

#[derive(Default)]
pub struct LocalHub {
    /// Members of each session, in join order
    sessions: Mutex<HashMap<String, Vec<(PeerId, Arc<Subscribers>)>>>,
}

impl LocalHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Open a new connection to the hub
    pub fn connect(self: &Arc<Self>) -> LocalEndpoint {
        LocalEndpoint {
            peer_id: Uuid::new_v4().simple().to_string(),
            hub: Arc::clone(self),
            session: Mutex::new(None),
            subscribers: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn session_members(&self, session_id: &str) -> Vec<PeerId> {
        self.lock()
            .get(session_id)
            .map(|members| members.iter().map(|(id, _)| id.clone()).collect())
            .unwrap_or_default()
    }

    pub fn has_session(&self, session_id: &str) -> bool {
        self.lock().contains_key(session_id)
    }

    /// Drop a whole session as if the network went away
    ///
    /// Every member is told once; later broadcasts to the session fail.
    pub fn disconnect_network(&self, session_id: &str) -> bool {
        let Some(members) = self.lock().remove(session_id) else {
            return false;
        };
        info!("Session {} lost its network connection", session_id);
        for (_, subscribers) in &members {
            deliver(subscribers, &SessionEvent::NetworkDisconnected);
        }
        true
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<(PeerId, Arc<Subscribers>)>>> {
        self.sessions.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn create_session(&self) -> String {
        let session_id = Uuid::new_v4().simple().to_string();
        self.lock().insert(session_id.clone(), Vec::new());
        session_id
    }

    fn join(&self, session_id: &str, peer_id: &str, subscribers: &Arc<Subscribers>) -> Result<()> {
        let mut sessions = self.lock();
        let members = sessions
            .get_mut(session_id)
            .ok_or_else(|| Error::Signaling(format!("unknown session {}", session_id)))?;
        if !members.iter().any(|(id, _)| id == peer_id) {
            members.push((peer_id.to_string(), Arc::clone(subscribers)));
        }
        Ok(())
    }

    fn broadcast(&self, session_id: &str, from: &str, signal: Signal) -> Result<()> {
        let sessions = self.lock();
        let members = sessions
            .get(session_id)
            .ok_or_else(|| Error::Signaling(format!("session {} is gone", session_id)))?;

        let event = SessionEvent::Signal {
            signal,
            from: from.to_string(),
        };
        for (peer_id, subscribers) in members {
            if peer_id != from {
                deliver(subscribers, &event);
            }
        }
        Ok(())
    }

    fn leave(&self, session_id: &str, peer_id: &str) {
        let mut sessions = self.lock();
        let Some(members) = sessions.get_mut(session_id) else {
            return;
        };
        let before = members.len();
        members.retain(|(id, _)| id != peer_id);
        if members.len() == before {
            return;
        }

        debug!("Peer {} left session {}", peer_id, session_id);
        let event = SessionEvent::PeersLeft(vec![peer_id.to_string()]);
        for (_, subscribers) in members.iter() {
            deliver(subscribers, &event);
        }
    }
}

/// One connection to a [`LocalHub`]
///
/// Dropping the endpoint leaves its session.
pub struct LocalEndpoint {
    peer_id: PeerId,
    hub: Arc<LocalHub>,
    session: Mutex<Option<String>>,
    subscribers: Arc<Subscribers>,
}

impl LocalEndpoint {
    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn session_id(&self) -> Option<String> {
        self.session_guard().clone()
    }

    /// Leave the current session, telling the remaining members
    pub fn leave(&self) {
        if let Some(session_id) = self.session_guard().take() {
            self.hub.leave(&session_id, &self.peer_id);
        }
    }

    fn session_guard(&self) -> MutexGuard<'_, Option<String>> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn enter(&self, session_id: &str) -> Result<()> {
        self.hub.join(session_id, &self.peer_id, &self.subscribers)?;
        let previous = self.session_guard().replace(session_id.to_string());
        if let Some(previous) = previous.filter(|p| p != session_id) {
            self.hub.leave(&previous, &self.peer_id);
        }
        Ok(())
    }
}

#[async_trait]
impl SignalingChannel for LocalEndpoint {
    async fn initiate_session(&self) -> Result<String> {
        let session_id = self.hub.create_session();
        self.enter(&session_id)?;
        info!("Peer {} initiated session {}", self.peer_id, session_id);
        Ok(session_id)
    }

    async fn join_session(&self, session_id: &str) -> Result<()> {
        self.enter(session_id)?;
        debug!("Peer {} joined session {}", self.peer_id, session_id);
        Ok(())
    }

    async fn broadcast(&self, signal: Signal) -> Result<()> {
        let session_id = self
            .session_id()
            .ok_or_else(|| Error::Signaling("not connected to a session".to_string()))?;
        self.hub.broadcast(&session_id, &self.peer_id, signal)
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        rx
    }
}

impl Drop for LocalEndpoint {
    fn drop(&mut self) {
        self.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_reaches_other_members_only() {
        let hub = LocalHub::new();
        let host = hub.connect();
        let peer = hub.connect();
        let mut host_events = host.subscribe();
        let mut peer_events = peer.subscribe();

        let session = host.initiate_session().await.unwrap();
        peer.join_session(&session).await.unwrap();
        peer.broadcast(Signal::Hello("Bob".into())).await.unwrap();

        assert_eq!(
            host_events.recv().await.unwrap(),
            SessionEvent::Signal {
                signal: Signal::Hello("Bob".into()),
                from: peer.peer_id().to_string()
            }
        );
        assert!(peer_events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_join_unknown_session_fails() {
        let hub = LocalHub::new();
        let peer = hub.connect();
        assert!(matches!(
            peer.join_session("nope").await,
            Err(Error::Signaling(_))
        ));
        assert!(peer.broadcast(Signal::Hello("x".into())).await.is_err());
    }

    #[tokio::test]
    async fn test_leaving_and_dropping_notify_members() {
        let hub = LocalHub::new();
        let host = hub.connect();
        let mut events = host.subscribe();
        let session = host.initiate_session().await.unwrap();

        let a = hub.connect();
        let b = hub.connect();
        a.join_session(&session).await.unwrap();
        b.join_session(&session).await.unwrap();
        let (a_id, b_id) = (a.peer_id().to_string(), b.peer_id().to_string());

        a.leave();
        a.leave();
        drop(b);

        assert_eq!(events.recv().await.unwrap(), SessionEvent::PeersLeft(vec![a_id]));
        assert_eq!(events.recv().await.unwrap(), SessionEvent::PeersLeft(vec![b_id]));
        assert_eq!(hub.session_members(&session), vec![host.peer_id().to_string()]);
    }

    #[tokio::test]
    async fn test_network_disconnect_drops_session() {
        let hub = LocalHub::new();
        let host = hub.connect();
        let mut events = host.subscribe();
        let session = host.initiate_session().await.unwrap();

        assert!(hub.disconnect_network(&session));
        assert_eq!(events.recv().await.unwrap(), SessionEvent::NetworkDisconnected);
        assert!(!hub.has_session(&session));
        assert!(host.broadcast(Signal::Hello("x".into())).await.is_err());
    }
}
