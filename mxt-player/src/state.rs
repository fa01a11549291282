//! Shared host state
//!
//! Event fan-out plus a read-only snapshot of the orchestrator's observable
//! state. Only the orchestrator writes the snapshot.

use mxt_common::events::{EventBus, MxtEvent, PlaybackState};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

/// Observable playback state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PlaybackView {
    pub state: PlaybackState,
    /// Entry actually playing, None when stopped
    pub running_entry: Option<Uuid>,
    /// Entry being loaded because of a user action (skip, toggle); internal
    /// look-ahead loads never show up here
    pub loading_entry: Option<Uuid>,
}

impl PlaybackView {
    pub fn playing(&self) -> bool {
        self.state == PlaybackState::Playing
    }
}

/// Shared state accessible by all components
pub struct SharedState {
    event_bus: Arc<EventBus>,
    playback: watch::Sender<PlaybackView>,
}

impl SharedState {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        let (playback, _) = watch::channel(PlaybackView::default());
        Self { event_bus, playback }
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Broadcast an event to all SSE listeners
    pub fn broadcast_event(&self, event: MxtEvent) {
        // no receivers is fine
        self.event_bus.emit_lossy(event);
    }

    /// Subscribe to event stream for SSE
    pub fn subscribe_events(&self) -> broadcast::Receiver<MxtEvent> {
        self.event_bus.subscribe()
    }

    pub fn playback_view(&self) -> PlaybackView {
        self.playback.borrow().clone()
    }

    /// Watch the playback snapshot
    pub fn subscribe_playback(&self) -> watch::Receiver<PlaybackView> {
        self.playback.subscribe()
    }

    /// Update the snapshot in place; watchers are woken once
    pub(crate) fn update_playback(&self, update: impl FnOnce(&mut PlaybackView)) {
        self.playback.send_modify(update);
    }
}
