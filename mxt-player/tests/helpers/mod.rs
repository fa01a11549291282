//! Test helpers for mxt-player integration tests
//!
//! - Video and catalogue builders
//! - `RecordingNotifier`: captures notifications instead of publishing them
//! - `PlaybackHarness`: queue + clocked media backend + orchestrator

#![allow(dead_code)]

use mxt_common::events::{EventBus, NotificationLevel, QueueChangeTrigger};
use mxt_common::{Provider, Video};
use mxt_player::media::ClockedBackend;
use mxt_player::notify::Notifier;
use mxt_player::playback::{
    Orchestrator, SlotContext, SlotEvent, SlotEventKind, SlotTiming,
};
use mxt_player::provider::CatalogProvider;
use mxt_player::queue::{QueueEntry, SharedQueue};
use mxt_player::state::{PlaybackView, SharedState};
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Upper bound for anything a test waits on (virtual time in paused tests)
pub const WAIT_LIMIT: Duration = Duration::from_secs(600);

pub fn video(id: &str, duration_ms: u64) -> Video {
    Video {
        id: id.to_string(),
        provider: Provider::Youtube,
        title: format!("Title {}", id),
        thumbnail_url: format!("http://img/{}.jpg", id),
        duration_ms,
        publisher_name: Some("Publisher".to_string()),
    }
}

pub fn catalog(ids: &[&str]) -> Arc<CatalogProvider> {
    Arc::new(CatalogProvider::new(
        ids.iter().map(|id| video(id, 60_000)).collect(),
    ))
}

pub fn timing() -> SlotTiming {
    SlotTiming {
        fade_duration: Duration::from_secs(3),
        auto_end_lead: Duration::from_secs(15),
        ..SlotTiming::default()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(NotificationLevel, String)>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn messages(&self) -> Vec<(NotificationLevel, String)> {
        self.messages.lock().unwrap().clone()
    }

    fn push(&self, level: NotificationLevel, message: &str) {
        self.messages.lock().unwrap().push((level, message.to_string()));
    }
}

impl Notifier for RecordingNotifier {
    fn info(&self, message: &str, _duration: Duration) {
        self.push(NotificationLevel::Info, message);
    }

    fn warning(&self, message: &str, _duration: Duration) {
        self.push(NotificationLevel::Warning, message);
    }

    fn error(&self, message: &str, _duration: Duration) {
        self.push(NotificationLevel::Error, message);
    }
}

/// Poll `condition` until it holds
pub async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let poll = async {
        while !condition().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(WAIT_LIMIT, poll)
        .await
        .expect("timed out waiting for condition");
}

/// Build a slot context on a fresh channel
pub fn slot_context(
    queue: &SharedQueue,
    backend: &Arc<ClockedBackend>,
) -> (SlotContext, mpsc::UnboundedReceiver<SlotEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let ctx = SlotContext {
        queue: queue.clone(),
        backend: backend.clone(),
        timing: timing(),
        events: tx,
    };
    (ctx, rx)
}

/// Wait for the next slot event
pub async fn next_slot_event(rx: &mut mpsc::UnboundedReceiver<SlotEvent>) -> SlotEventKind {
    tokio::time::timeout(WAIT_LIMIT, rx.recv())
        .await
        .expect("timed out waiting for a slot event")
        .expect("slot event channel closed")
        .kind
}

/// Orchestrator wired to a clocked backend
pub struct PlaybackHarness {
    pub event_bus: Arc<EventBus>,
    pub state: Arc<SharedState>,
    pub queue: SharedQueue,
    pub backend: Arc<ClockedBackend>,
    pub orchestrator: Orchestrator,
}

impl PlaybackHarness {
    pub fn new(load_latency: Duration) -> Self {
        let event_bus = Arc::new(EventBus::new(1024));
        let state = Arc::new(SharedState::new(Arc::clone(&event_bus)));
        let queue = SharedQueue::new(Arc::clone(&event_bus));
        let backend = Arc::new(ClockedBackend::new(load_latency).with_recording());
        let orchestrator = Orchestrator::start(
            queue.clone(),
            backend.clone(),
            timing(),
            Arc::clone(&state),
        );

        Self {
            event_bus,
            state,
            queue,
            backend,
            orchestrator,
        }
    }

    pub async fn append(&self, id: &str, duration_ms: u64) -> QueueEntry {
        self.queue
            .append_video(video(id, duration_ms), QueueChangeTrigger::UserAppend)
            .await
    }

    /// Wait until the playback view satisfies `predicate`
    pub async fn wait_view(&self, predicate: impl FnMut(&PlaybackView) -> bool) -> PlaybackView {
        let mut rx = self.state.subscribe_playback();
        let view = tokio::time::timeout(WAIT_LIMIT, rx.wait_for(predicate))
            .await
            .expect("timed out waiting for the playback view")
            .expect("playback view sender dropped")
            .clone();
        view
    }

    pub async fn wait_running(&self, entry: &QueueEntry) {
        let id = entry.id;
        self.wait_view(|v| v.running_entry == Some(id)).await;
    }
}
