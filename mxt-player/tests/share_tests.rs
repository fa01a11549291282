//! Shared queue protocol tests
//!
//! Host and peers talk through an in-process `LocalHub`. Commands from one
//! peer and from different peers reach the host in broadcast order, so a
//! registered peer's append is used as a barrier before asserting that
//! something did not happen.

mod helpers;

use async_trait::async_trait;
use helpers::{catalog, wait_until, RecordingNotifier};
use mxt_common::events::{EventBus, MxtEvent, NotificationLevel};
use mxt_player::error::{Error, Result};
use mxt_player::queue::{codec, SharedQueue};
use mxt_player::share::{
    LocalEndpoint, LocalHub, SessionEvent, Signal, SharedQueueClient, SharedQueueServer,
    SignalingChannel,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

struct Host {
    hub: Arc<LocalHub>,
    queue: SharedQueue,
    notifier: Arc<RecordingNotifier>,
    event_bus: Arc<EventBus>,
    server: Arc<SharedQueueServer>,
}

impl Host {
    fn new(videos: &[&str]) -> Self {
        let hub = LocalHub::new();
        let event_bus = Arc::new(EventBus::new(64));
        let queue = SharedQueue::new(Arc::clone(&event_bus));
        let notifier = RecordingNotifier::new();
        let server = SharedQueueServer::new(
            Arc::new(hub.connect()),
            queue.clone(),
            catalog(videos),
            notifier.clone(),
            Arc::clone(&event_bus),
            Duration::from_secs(5),
        );
        Self {
            hub,
            queue,
            notifier,
            event_bus,
            server,
        }
    }

    /// Connect a peer to the shared queue, optionally saying hello
    async fn peer(&self, session_id: &str, name: Option<&str>) -> (Arc<LocalEndpoint>, SharedQueueClient) {
        let endpoint = Arc::new(self.hub.connect());
        let client = SharedQueueClient::new(endpoint.clone());
        client.join_shared_queue(session_id).await.unwrap();
        if let Some(name) = name {
            client.say_hello(name).await.unwrap();
        }
        (endpoint, client)
    }

    async fn video_ids(&self) -> Vec<String> {
        self.queue
            .snapshot()
            .await
            .entries()
            .iter()
            .map(|e| e.video.id.clone())
            .collect()
    }

    async fn wait_for_videos(&self, expected: &[&str]) {
        wait_until(|| async move { self.video_ids().await == expected }).await;
    }

    async fn wait_for_messages(&self, count: usize) -> Vec<(NotificationLevel, String)> {
        wait_until(|| async move { self.notifier.messages().len() >= count }).await;
        self.notifier.messages()
    }
}

#[tokio::test(start_paused = true)]
async fn test_hello_then_append() {
    let host = Host::new(&["a"]);
    let session_id = host.server.get_or_create_session().await.unwrap();

    let (_endpoint, alice) = host.peer(&session_id, Some("Alice")).await;
    alice.append_video("a").await.unwrap();

    host.wait_for_videos(&["a"]).await;
    let messages = host.wait_for_messages(2).await;
    assert_eq!(
        messages,
        vec![
            (NotificationLevel::Info, "\"Alice\" entered the shared queue".to_string()),
            (NotificationLevel::Info, "\"Alice\" appended \"Title a\" to the queue".to_string()),
        ]
    );
    assert_eq!(host.server.peer_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_commands_from_unknown_peer_are_ignored() {
    let host = Host::new(&["a", "b"]);
    let session_id = host.server.get_or_create_session().await.unwrap();

    let (_stranger_endpoint, stranger) = host.peer(&session_id, None).await;
    stranger.append_video("a").await.unwrap();

    let (_bob_endpoint, bob) = host.peer(&session_id, Some("Bob")).await;
    bob.append_video("b").await.unwrap();

    host.wait_for_videos(&["b"]).await;
    let messages = host.notifier.messages();
    assert!(messages.iter().all(|(_, m)| !m.contains("\"Title a\"")));
    assert_eq!(host.server.peer_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_repeated_hello_keeps_first_name() {
    let host = Host::new(&["a"]);
    let session_id = host.server.get_or_create_session().await.unwrap();

    let (endpoint, alice) = host.peer(&session_id, Some("Alice")).await;
    alice.say_hello("Mallory").await.unwrap();
    alice.append_video("a").await.unwrap();

    host.wait_for_videos(&["a"]).await;
    let messages = host.wait_for_messages(2).await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].1, "\"Alice\" appended \"Title a\" to the queue");
    assert_eq!(host.server.peer_name(endpoint.peer_id()).as_deref(), Some("Alice"));
}

#[tokio::test(start_paused = true)]
async fn test_unknown_video_is_not_appended() {
    let host = Host::new(&["a"]);
    let session_id = host.server.get_or_create_session().await.unwrap();

    let (_endpoint, alice) = host.peer(&session_id, Some("Alice")).await;
    alice.append_video("nope").await.unwrap();
    alice.append_video("a").await.unwrap();

    host.wait_for_videos(&["a"]).await;
    let messages = host.wait_for_messages(2).await;
    assert_eq!(messages.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_peer_cannot_append_id_outside_url_alphabet() {
    let host = Host::new(&["a.b", "c"]);
    let session_id = host.server.get_or_create_session().await.unwrap();

    let (_endpoint, alice) = host.peer(&session_id, Some("Alice")).await;
    alice.append_video("a.b").await.unwrap();
    alice.append_video("c").await.unwrap();

    host.wait_for_videos(&["c"]).await;
    let messages = host.wait_for_messages(2).await;
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].1, "\"Alice\" appended \"Title c\" to the queue");

    let serialized = host.queue.serialize().await;
    assert_eq!(serialized, "yc");
    assert!(codec::decode(&serialized).is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_appends_keep_receipt_order() {
    let host = Host::new(&["a", "b", "c"]);
    let session_id = host.server.get_or_create_session().await.unwrap();

    let (_alice_endpoint, alice) = host.peer(&session_id, Some("Alice")).await;
    let (_bob_endpoint, bob) = host.peer(&session_id, Some("Bob")).await;
    alice.append_video("c").await.unwrap();
    bob.append_video("a").await.unwrap();
    alice.append_video("b").await.unwrap();

    host.wait_for_videos(&["c", "a", "b"]).await;
}

#[tokio::test(start_paused = true)]
async fn test_peer_leaving_is_announced_and_forgotten() {
    let host = Host::new(&["a", "b"]);
    let session_id = host.server.get_or_create_session().await.unwrap();

    let (alice_endpoint, alice) = host.peer(&session_id, Some("Alice")).await;
    host.wait_for_messages(1).await;

    alice_endpoint.leave();
    let messages = host.wait_for_messages(2).await;
    assert_eq!(messages[1].1, "\"Alice\" left the shared queue");
    assert_eq!(host.server.peer_count(), 0);

    // back in the session, but without a new hello
    alice.join_shared_queue(&session_id).await.unwrap();
    alice.append_video("a").await.unwrap();

    let (_bob_endpoint, bob) = host.peer(&session_id, Some("Bob")).await;
    bob.append_video("b").await.unwrap();

    host.wait_for_videos(&["b"]).await;
}

#[tokio::test(start_paused = true)]
async fn test_dropped_endpoint_leaves_session() {
    let host = Host::new(&[]);
    let session_id = host.server.get_or_create_session().await.unwrap();

    let (endpoint, client) = host.peer(&session_id, Some("Alice")).await;
    host.wait_for_messages(1).await;
    assert_eq!(host.hub.session_members(&session_id).len(), 2);

    drop(client);
    drop(endpoint);

    let messages = host.wait_for_messages(2).await;
    assert_eq!(messages[1].1, "\"Alice\" left the shared queue");
    assert_eq!(host.hub.session_members(&session_id).len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_session_is_created_once() {
    let host = Host::new(&[]);
    let mut events = host.event_bus.subscribe();

    let (first, second) = tokio::join!(
        host.server.get_or_create_session(),
        host.server.get_or_create_session()
    );
    let first = first.unwrap();
    assert_eq!(first, second.unwrap());
    assert_eq!(host.server.get_or_create_session().await.unwrap(), first);
    assert_eq!(host.server.session_id().await, Some(first.clone()));

    let mut started = 0;
    while let Ok(event) = events.try_recv() {
        if let MxtEvent::SharingStarted { session_id, .. } = event {
            assert_eq!(session_id, first);
            started += 1;
        }
    }
    assert_eq!(started, 1);
}

#[tokio::test(start_paused = true)]
async fn test_network_disconnection_ends_sharing() {
    let host = Host::new(&["a"]);
    let session_id = host.server.get_or_create_session().await.unwrap();
    let (_endpoint, _alice) = host.peer(&session_id, Some("Alice")).await;
    host.wait_for_messages(1).await;
    let mut events = host.event_bus.subscribe();

    assert!(host.hub.disconnect_network(&session_id));

    let messages = host.wait_for_messages(2).await;
    assert_eq!(
        messages[1],
        (
            NotificationLevel::Warning,
            "The queue is not shared anymore because of a network disconnection".to_string()
        )
    );
    let server = &host.server;
    wait_until(|| async move { server.session_id().await.is_none() }).await;
    assert_eq!(host.server.peer_count(), 0);

    let mut ended = false;
    while let Ok(event) = events.try_recv() {
        ended |= matches!(event, MxtEvent::SharingEnded { .. });
    }
    assert!(ended);

    // sharing again opens a fresh session
    let new_session = host.server.get_or_create_session().await.unwrap();
    assert_ne!(new_session, session_id);
    let (_endpoint, bob) = host.peer(&new_session, Some("Bob")).await;
    bob.append_video("a").await.unwrap();
    host.wait_for_videos(&["a"]).await;
}

struct UnreachableSignaling;

#[async_trait]
impl SignalingChannel for UnreachableSignaling {
    async fn initiate_session(&self) -> Result<String> {
        Err(Error::Signaling("signaling service unreachable".to_string()))
    }

    async fn join_session(&self, _session_id: &str) -> Result<()> {
        Err(Error::Signaling("signaling service unreachable".to_string()))
    }

    async fn broadcast(&self, _signal: Signal) -> Result<()> {
        Err(Error::Signaling("signaling service unreachable".to_string()))
    }

    fn subscribe(&self) -> mpsc::UnboundedReceiver<SessionEvent> {
        mpsc::unbounded_channel().1
    }
}

#[tokio::test]
async fn test_session_creation_failure_notifies() {
    let event_bus = Arc::new(EventBus::new(16));
    let notifier = RecordingNotifier::new();
    let server = SharedQueueServer::new(
        Arc::new(UnreachableSignaling),
        SharedQueue::new(Arc::clone(&event_bus)),
        catalog(&[]),
        notifier.clone(),
        event_bus,
        Duration::from_secs(5),
    );

    assert!(matches!(
        server.get_or_create_session().await,
        Err(Error::Signaling(_))
    ));
    assert_eq!(
        notifier.messages(),
        vec![(
            NotificationLevel::Error,
            "The queue could not be shared, please try again later".to_string()
        )]
    );
    assert!(server.session_id().await.is_none());
}
