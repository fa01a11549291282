//! Playback orchestrator
//!
//! Keeps at most one current slot (on air) and one next slot (pre-buffering
//! or cross-fading in). A single event loop consumes slot events and queue
//! changes in arrival order; public operations take the same core lock, so
//! every decision is made against a consistent view.
//!
//! Playback state: `Pristine -> Playing <-> Paused`, `Playing/Paused -> Stopped`
//! when a skip resolves to nothing, `Stopped -> Playing` on toggle with a
//! non-empty queue.

use crate::media::MediaBackend;
use crate::playback::slot::{PlaybackSlot, SlotContext, SlotEvent, SlotEventKind, SlotId, SlotTiming};
use crate::queue::{QueueChange, QueueEntry, SharedQueue};
use crate::state::{PlaybackView, SharedState};
use mxt_common::events::{MxtEvent, PlaybackState};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Default)]
struct Core {
    state: PlaybackState,
    current: Option<PlaybackSlot>,
    next: Option<PlaybackSlot>,
    /// Entry the look-ahead slot was created for
    next_for: Option<Uuid>,
    /// Slot started by skip/toggle, the only one reported as loading
    user_slot: Option<SlotId>,
    running: Option<QueueEntry>,
    loading: Option<Uuid>,
    /// Entry whose auto-end cue fired with nothing queued after it
    handoff_from: Option<Uuid>,
}

struct Inner {
    queue: SharedQueue,
    state: Arc<SharedState>,
    slot_ctx: SlotContext,
    core: Mutex<Core>,
    /// Playing gate followed by every engaged slot
    gate: watch::Sender<bool>,
    shutdown: CancellationToken,
}

/// Handle to the orchestrator; clones drive the same playback
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Create the orchestrator and spawn its event loop
    pub fn start(
        queue: SharedQueue,
        backend: Arc<dyn MediaBackend>,
        timing: SlotTiming,
        state: Arc<SharedState>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let queue_rx = queue.subscribe();
        let (gate, _) = watch::channel(false);

        let inner = Arc::new(Inner {
            slot_ctx: SlotContext {
                queue: queue.clone(),
                backend,
                timing,
                events: events_tx,
            },
            queue,
            state,
            core: Mutex::new(Core::default()),
            gate,
            shutdown: CancellationToken::new(),
        });

        tokio::spawn(Arc::clone(&inner).event_loop(events_rx, queue_rx));
        info!("Playback orchestrator started");

        Self { inner }
    }

    /// Play from the closest valid entry at or after `index`
    ///
    /// Stops playback if there is none.
    pub async fn skip_to(&self, index: usize) {
        let mut core = self.inner.core.lock().await;
        self.inner.skip_to(&mut core, index).await;
    }

    /// Pause, resume, or start from the first entry
    pub async fn toggle_playback(&self) {
        let mut core = self.inner.core.lock().await;
        match core.state {
            PlaybackState::Playing => self.inner.pause(&mut core),
            PlaybackState::Paused => self.inner.play(&mut core),
            PlaybackState::Pristine | PlaybackState::Stopped => match self.inner.queue.get(0).await {
                Some(first) => {
                    self.inner.skip(&mut core, first.id);
                    self.inner.play(&mut core);
                }
                None => debug!("Toggle ignored, the queue is empty"),
            },
        }
    }

    pub fn view(&self) -> PlaybackView {
        self.inner.state.playback_view()
    }

    pub fn is_playing(&self) -> bool {
        self.view().playing()
    }

    pub async fn current_slot(&self) -> Option<PlaybackSlot> {
        self.inner.core.lock().await.current.clone()
    }

    pub async fn next_slot(&self) -> Option<PlaybackSlot> {
        self.inner.core.lock().await.next.clone()
    }

    /// Stop the event loop and release every slot
    pub async fn shutdown(&self) {
        self.inner.shutdown.cancel();

        let slots: Vec<PlaybackSlot> = {
            let mut core = self.inner.core.lock().await;
            self.inner.gate.send_replace(false);
            core.current.take().into_iter().chain(core.next.take()).collect()
        };
        for slot in &slots {
            slot.finish();
        }
        for slot in &slots {
            slot.finished().await;
        }
        info!("Playback orchestrator stopped");
    }
}

impl Inner {
    async fn event_loop(
        self: Arc<Self>,
        mut slot_events: mpsc::UnboundedReceiver<SlotEvent>,
        mut queue_changes: mpsc::UnboundedReceiver<QueueChange>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Some(event) = slot_events.recv() => self.on_slot_event(event).await,
                Some(change) = queue_changes.recv() => self.on_queue_change(change).await,
                else => break,
            }
        }
        debug!("Orchestrator event loop exited");
    }

    async fn on_slot_event(&self, event: SlotEvent) {
        let mut core = self.core.lock().await;
        let is_current = core.current.as_ref().map(|s| s.id()) == Some(event.slot);
        let is_next = core.next.as_ref().map(|s| s.id()) == Some(event.slot);
        let is_user = core.user_slot == Some(event.slot);

        match event.kind {
            SlotEventKind::Trying(entry) => {
                if is_user {
                    self.set_loading(&mut core, entry);
                }
            }
            SlotEventKind::LoadFailed { entry_id, error } => {
                warn!("Error while loading entry {}: {}", entry_id, error);
            }
            SlotEventKind::Prepared { entry_id } => {
                debug!("{} ready with entry {}", event.slot, entry_id);
            }
            SlotEventKind::NoPlayableEntry => {
                if !is_next {
                    return;
                }
                core.next = None;
                core.next_for = None;
                if is_user {
                    info!("No playable entry left, stopping playback");
                    self.stop(&mut core);
                } else if core.current.is_none() {
                    // the previous slot is gone and nothing follows it
                    self.stop(&mut core);
                }
            }
            SlotEventKind::AboutToStart { entry_id } => {
                if is_next {
                    self.promote_next(&mut core, entry_id).await;
                }
            }
            SlotEventKind::AboutToEnd { entry_id } => {
                if !is_current {
                    return;
                }
                match core.next.as_ref() {
                    Some(next) => {
                        debug!("Cross-fading into {}", next.id());
                        next.engage(self.gate.subscribe());
                    }
                    None => {
                        core.handoff_from = Some(entry_id);
                        if let Some(running) = &core.running {
                            self.state.broadcast_event(MxtEvent::ComingNext {
                                current_title: running.video.title.clone(),
                                next_title: None,
                                thumbnail_url: None,
                                timestamp: chrono::Utc::now(),
                            });
                        }
                    }
                }
            }
            SlotEventKind::Finished => {
                if !is_current {
                    return;
                }
                core.current = None;
                let mut next_pending = core.next.as_ref().is_some_and(|s| s.is_engage_requested());
                if !next_pending && core.next.is_none() {
                    if let Some(from) = core.handoff_from {
                        next_pending = self.start_handoff(&mut core, from).await;
                    }
                }
                if next_pending {
                    self.set_running(&mut core, None);
                } else {
                    info!("Reached the end of the queue");
                    self.stop(&mut core);
                }
            }
        }
    }

    async fn on_queue_change(&self, change: QueueChange) {
        let mut core = self.core.lock().await;
        let running = core.running.as_ref().map(|e| e.id);
        let loading = core.loading;

        let affected_index = match &change {
            QueueChange::EntryAdded { .. } => None,
            QueueChange::EntryRemoved { index, entry_id } => {
                (Some(*entry_id) == running || Some(*entry_id) == loading).then_some(*index)
            }
            QueueChange::Replaced { previous } => {
                let index_of = |id: Option<Uuid>| id.and_then(|id| previous.iter().position(|p| *p == id));
                index_of(running).or_else(|| index_of(loading))
            }
        };

        match affected_index {
            Some(index) => {
                debug!("Playing or loading entry removed, skipping to index {}", index);
                if let Some(id) = running {
                    if self.queue.index_of(id).await.is_none() {
                        // the removed entry keeps fading out but is no longer on air
                        self.set_running(&mut core, None);
                    }
                }
                self.skip_to(&mut core, index).await;
            }
            None => self.check_next_entry(&mut core).await,
        }
    }

    async fn skip_to(&self, core: &mut Core, index: usize) {
        match self.queue.closest_valid_entry_by_index(index).await {
            None => self.stop(core),
            Some(entry) => {
                self.skip(core, entry.id);
                if core.state != PlaybackState::Playing {
                    self.play(core);
                }
            }
        }
    }

    /// Replace whatever is playing or loading with a user-triggered slot
    fn skip(&self, core: &mut Core, entry_id: Uuid) {
        if let Some(slot) = core.current.take() {
            slot.finish();
        }
        if let Some(slot) = core.next.take() {
            slot.finish();
        }
        core.handoff_from = None;

        let slot = PlaybackSlot::prepare(self.slot_ctx.clone(), entry_id);
        slot.engage(self.gate.subscribe());
        debug!("Skipping to entry {} with {}", entry_id, slot.id());

        core.user_slot = Some(slot.id());
        core.next_for = Some(entry_id);
        core.next = Some(slot);
        self.set_loading(core, Some(entry_id));
    }

    async fn promote_next(&self, core: &mut Core, entry_id: Uuid) {
        let Some(slot) = core.next.take() else {
            return;
        };
        core.next_for = None;
        core.handoff_from = None;
        if core.user_slot == Some(slot.id()) {
            core.user_slot = None;
            self.set_loading(core, None);
        }
        if let Some(previous) = core.current.replace(slot.clone()) {
            previous.finish();
        }

        let entry = slot.actual_entry();
        if let (Some(previous), Some(starting)) = (&core.running, &entry) {
            self.state.broadcast_event(MxtEvent::ComingNext {
                current_title: previous.video.title.clone(),
                next_title: Some(starting.video.title.clone()),
                thumbnail_url: Some(starting.video.thumbnail_url.clone()),
                timestamp: chrono::Utc::now(),
            });
        }
        debug!("Entry {} is now on air", entry_id);
        self.set_running(core, entry);

        self.check_next_entry(core).await;
    }

    /// (Re)start the look-ahead for the entry following the current one
    async fn check_next_entry(&self, core: &mut Core) {
        let Some(current) = core.current.as_ref() else {
            return;
        };
        if current.is_finish_called() {
            // the cue already fired; an entry appended since takes over directly
            if core.next.is_none() {
                if let Some(from) = core.handoff_from {
                    self.start_handoff(core, from).await;
                }
            }
            return;
        }
        let Some(current_entry) = current.actual_entry() else {
            return;
        };

        let expected = self
            .queue
            .closest_valid_entry(current_entry.id, false)
            .await
            .map(|e| e.id);

        if let Some(next) = core.next.as_ref() {
            if next.is_engage_requested() {
                return;
            }
            let target = next.target_entry().or(core.next_for);
            if expected.is_some() && target == expected && !next.is_finished() {
                return;
            }
            debug!("Dropping look-ahead {}", next.id());
            next.finish();
            core.next = None;
            core.next_for = None;
        }

        if let Some(entry_id) = expected {
            let slot = PlaybackSlot::prepare(self.slot_ctx.clone(), entry_id);
            debug!("Pre-buffering entry {} with {}", entry_id, slot.id());
            core.next = Some(slot);
            core.next_for = Some(entry_id);
        }
    }

    /// Engage a slot for the entry after `from` once its predecessor is ending
    async fn start_handoff(&self, core: &mut Core, from: Uuid) -> bool {
        let Some(entry) = self.queue.closest_valid_entry(from, false).await else {
            return false;
        };
        let slot = PlaybackSlot::prepare(self.slot_ctx.clone(), entry.id);
        slot.engage(self.gate.subscribe());
        debug!("Handing over to entry {} with {}", entry.id, slot.id());

        core.handoff_from = None;
        core.next_for = Some(entry.id);
        core.next = Some(slot);
        true
    }

    fn play(&self, core: &mut Core) {
        self.gate.send_replace(true);
        self.set_state(core, PlaybackState::Playing);
    }

    fn pause(&self, core: &mut Core) {
        self.gate.send_replace(false);
        self.set_state(core, PlaybackState::Paused);
    }

    fn stop(&self, core: &mut Core) {
        if let Some(slot) = core.current.take() {
            slot.finish();
        }
        if let Some(slot) = core.next.take() {
            slot.finish();
        }
        core.next_for = None;
        core.user_slot = None;
        core.handoff_from = None;
        self.gate.send_replace(false);

        self.set_running(core, None);
        self.set_loading(core, None);
        self.set_state(core, PlaybackState::Stopped);
    }

    fn set_state(&self, core: &mut Core, new_state: PlaybackState) {
        let old_state = core.state;
        if old_state == new_state {
            return;
        }
        core.state = new_state;
        self.state.update_playback(|view| view.state = new_state);
        info!("Playback state: {} -> {}", old_state, new_state);
        self.state.broadcast_event(MxtEvent::PlaybackStateChanged {
            old_state,
            new_state,
            timestamp: chrono::Utc::now(),
        });
    }

    fn set_running(&self, core: &mut Core, entry: Option<QueueEntry>) {
        let entry_id = entry.as_ref().map(|e| e.id);
        if core.running.as_ref().map(|e| e.id) == entry_id {
            return;
        }
        core.running = entry;
        self.state.update_playback(|view| view.running_entry = entry_id);
        self.state.broadcast_event(MxtEvent::RunningEntryChanged {
            entry_id,
            timestamp: chrono::Utc::now(),
        });
    }

    fn set_loading(&self, core: &mut Core, entry_id: Option<Uuid>) {
        if core.loading == entry_id {
            return;
        }
        core.loading = entry_id;
        self.state.update_playback(|view| view.loading_entry = entry_id);
        self.state.broadcast_event(MxtEvent::LoadingEntryChanged {
            entry_id,
            timestamp: chrono::Utc::now(),
        });
    }
}
