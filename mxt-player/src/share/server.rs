//! Shared queue, host side
//!
//! Opens a signaling session on demand and applies the commands of peers to
//! the local queue. A peer must say hello before its commands are honoured;
//! one task handles the session's events one at a time, so commands reach the
//! queue in the order they were received.

use super::registry::PeerRegistry;
use super::signaling::{Command, PeerId, SessionEvent, Signal, SignalingChannel};
use crate::error::Result;
use crate::notify::Notifier;
use crate::provider::{self, VideoProvider};
use crate::queue::SharedQueue;
use mxt_common::events::{EventBus, MxtEvent, QueueChangeTrigger};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

pub struct SharedQueueServer {
    channel: Arc<dyn SignalingChannel>,
    queue: SharedQueue,
    provider: Arc<dyn VideoProvider>,
    notifier: Arc<dyn Notifier>,
    event_bus: Arc<EventBus>,
    notification_duration: Duration,
    /// Held across session creation so concurrent callers share one session
    session: AsyncMutex<Option<String>>,
    peers: Mutex<PeerRegistry>,
}

impl SharedQueueServer {
    pub fn new(
        channel: Arc<dyn SignalingChannel>,
        queue: SharedQueue,
        provider: Arc<dyn VideoProvider>,
        notifier: Arc<dyn Notifier>,
        event_bus: Arc<EventBus>,
        notification_duration: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            channel,
            queue,
            provider,
            notifier,
            event_bus,
            notification_duration,
            session: AsyncMutex::new(None),
            peers: Mutex::new(PeerRegistry::new()),
        })
    }

    /// Id of the sharing session, created on first call
    pub async fn get_or_create_session(self: &Arc<Self>) -> Result<String> {
        let mut session = self.session.lock().await;
        if let Some(session_id) = session.as_ref() {
            return Ok(session_id.clone());
        }

        // subscribe first so nothing sent right after creation is missed
        let events = self.channel.subscribe();
        let session_id = match self.channel.initiate_session().await {
            Ok(id) => id,
            Err(e) => {
                warn!("Could not start sharing the queue: {}", e);
                self.notifier.error(
                    "The queue could not be shared, please try again later",
                    self.notification_duration,
                );
                return Err(e);
            }
        };

        info!("Queue shared in session {}", session_id);
        *session = Some(session_id.clone());
        self.event_bus.emit_lossy(MxtEvent::SharingStarted {
            session_id: session_id.clone(),
            timestamp: chrono::Utc::now(),
        });

        tokio::spawn(Arc::clone(self).run_session(events));
        Ok(session_id)
    }

    pub async fn session_id(&self) -> Option<String> {
        self.session.lock().await.clone()
    }

    /// Display name of a peer that said hello
    pub fn peer_name(&self, peer: &str) -> Option<String> {
        self.peers().name(peer).map(str::to_string)
    }

    pub fn peer_count(&self) -> usize {
        self.peers().len()
    }

    fn peers(&self) -> MutexGuard<'_, PeerRegistry> {
        self.peers.lock().unwrap_or_else(|e| e.into_inner())
    }

    async fn run_session(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Signal { signal, from } => self.handle_signal(signal, from).await,
                SessionEvent::PeersLeft(peer_ids) => self.handle_peers_left(&peer_ids),
                SessionEvent::NetworkDisconnected => {
                    self.handle_network_disconnected().await;
                    break;
                }
            }
        }
        debug!("Shared queue session loop exited");
    }

    async fn handle_signal(&self, signal: Signal, from: PeerId) {
        match signal {
            Signal::Hello(name) => self.handle_hello(&from, &name),
            Signal::Command(command) => {
                let Some(name) = self.peer_name(&from) else {
                    debug!("Ignoring command from peer {} that never said hello", from);
                    return;
                };
                match command {
                    Command::AppendVideo { video_id } => {
                        self.handle_append_video(&name, &video_id).await
                    }
                }
            }
        }
    }

    fn handle_hello(&self, peer: &str, name: &str) {
        if !self.peers().register(peer, name) {
            debug!("Ignoring repeated hello from peer {}", peer);
            return;
        }
        self.notifier.info(
            &format!("\"{}\" entered the shared queue", name),
            self.notification_duration,
        );
    }

    async fn handle_append_video(&self, peer_name: &str, video_id: &str) {
        let video = match provider::find_confirmed(self.provider.as_ref(), video_id).await {
            Ok(Some(video)) => video,
            Ok(None) => {
                warn!("Peer {} asked for unknown video {}", peer_name, video_id);
                return;
            }
            Err(e) => {
                warn!("Could not check video {} for peer {}: {}", video_id, peer_name, e);
                return;
            }
        };

        let entry = self.queue.append_video(video, QueueChangeTrigger::PeerAppend).await;
        self.notifier.info(
            &format!(
                "\"{}\" appended \"{}\" to the queue",
                peer_name, entry.video.title
            ),
            self.notification_duration,
        );
    }

    fn handle_peers_left(&self, peer_ids: &[PeerId]) {
        for peer in peer_ids {
            let removed = self.peers().remove(peer);
            if let Some(name) = removed {
                self.notifier.info(
                    &format!("\"{}\" left the shared queue", name),
                    self.notification_duration,
                );
            }
        }
    }

    async fn handle_network_disconnected(&self) {
        self.notifier.warning(
            "The queue is not shared anymore because of a network disconnection",
            self.notification_duration,
        );
        self.session.lock().await.take();
        self.peers().clear();
        self.event_bus.emit_lossy(MxtEvent::SharingEnded {
            timestamp: chrono::Utc::now(),
        });
    }
}
