//! Playback slot
//!
//! A slot owns one attempt at getting a queue entry on air. Its lifecycle is
//! `Preparing -> Prepared -> Engaged -> Finishing -> Finished`:
//!
//! - **prepare** opens the closest valid entry at or after the expected one.
//!   Entries that fail to load are flagged skipped in the queue and the next
//!   closest valid entry is tried, until one loads or none is left.
//! - **engage** waits for the slot to be prepared, arms the auto-end cue,
//!   then starts playback with a fade-in as soon as the playing gate opens.
//! - **finish** ends the slot from any state. Media that never started is
//!   released on the spot; started media fades out first.
//!
//! Progress is reported to the owner as [`SlotEvent`]s on an unbounded channel,
//! in the order things happen for that slot.

use crate::media::{MediaBackend, MediaElement};
use crate::playback::fader::{Fade, FadeDirection};
use crate::queue::{QueueEntry, SharedQueue};
use mxt_common::FadeCurve;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

static NEXT_SLOT_ID: AtomicU64 = AtomicU64::new(1);

/// Fade and cue timing shared by every slot
#[derive(Debug, Clone, Copy)]
pub struct SlotTiming {
    pub fade_duration: Duration,
    /// Time before the end of the media at which the auto-end cue fires
    pub auto_end_lead: Duration,
    pub fade_curve: FadeCurve,
    pub fade_step: Duration,
}

impl Default for SlotTiming {
    fn default() -> Self {
        Self {
            fade_duration: Duration::from_secs(3),
            auto_end_lead: Duration::from_secs(15),
            fade_curve: FadeCurve::default(),
            fade_step: Duration::from_millis(50),
        }
    }
}

impl SlotTiming {
    fn fade(&self, direction: FadeDirection) -> Fade {
        Fade {
            direction,
            duration: self.fade_duration,
            curve: self.fade_curve,
            step: self.fade_step,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(u64);

impl SlotId {
    fn next() -> Self {
        SlotId(NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Preparing,
    Prepared,
    Engaged,
    Finishing,
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SlotEventKind {
    /// Entry now being loaded; None once preparation stopped trying
    Trying(Option<Uuid>),
    /// Entry failed to load and was flagged skipped
    LoadFailed { entry_id: Uuid, error: String },
    Prepared { entry_id: Uuid },
    /// Retry chain exhausted; the slot is finished
    NoPlayableEntry,
    /// Engaged slot is about to start playing
    AboutToStart { entry_id: Uuid },
    /// Auto-end cue reached; the slot finishes right after
    AboutToEnd { entry_id: Uuid },
    /// Resources released
    Finished,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SlotEvent {
    pub slot: SlotId,
    pub kind: SlotEventKind,
}

/// Collaborators handed to every slot
#[derive(Clone)]
pub struct SlotContext {
    pub queue: SharedQueue,
    pub backend: Arc<dyn MediaBackend>,
    pub timing: SlotTiming,
    pub events: mpsc::UnboundedSender<SlotEvent>,
}

struct SlotCore {
    state: SlotState,
    trying: Option<Uuid>,
    actual: Option<QueueEntry>,
    media: Option<Arc<dyn MediaElement>>,
    /// Playing gate received by engage, kept until the slot is prepared
    gate: Option<watch::Receiver<bool>>,
    engage_requested: bool,
    started: bool,
    finish_called: bool,
    stop_out_called: bool,
}

struct SlotInner {
    id: SlotId,
    ctx: SlotContext,
    core: Mutex<SlotCore>,
    /// Abandons the retry chain
    prepare_cancel: CancellationToken,
    /// Stops the cue, the gate wait and the fade-in
    engage_cancel: CancellationToken,
    /// Stops mirroring the playing gate onto the media
    follow_cancel: CancellationToken,
    finished: watch::Sender<bool>,
}

/// Handle to a playback slot; clones refer to the same slot
#[derive(Clone)]
pub struct PlaybackSlot {
    inner: Arc<SlotInner>,
}

enum FinishAction {
    Settle,
    Dispose(Arc<dyn MediaElement>),
    StopOut(Arc<dyn MediaElement>),
}

impl PlaybackSlot {
    /// Create a slot and start preparing `expected_entry`
    ///
    /// Must be called from within a tokio runtime.
    pub fn prepare(ctx: SlotContext, expected_entry: Uuid) -> Self {
        let (finished, _) = watch::channel(false);
        let slot = Self {
            inner: Arc::new(SlotInner {
                id: SlotId::next(),
                ctx,
                core: Mutex::new(SlotCore {
                    state: SlotState::Preparing,
                    trying: None,
                    actual: None,
                    media: None,
                    gate: None,
                    engage_requested: false,
                    started: false,
                    finish_called: false,
                    stop_out_called: false,
                }),
                prepare_cancel: CancellationToken::new(),
                engage_cancel: CancellationToken::new(),
                follow_cancel: CancellationToken::new(),
                finished,
            }),
        };

        debug!("{} preparing from entry {}", slot.id(), expected_entry);
        let task = slot.clone();
        tokio::spawn(async move { task.run_prepare(expected_entry).await });
        slot
    }

    pub fn id(&self) -> SlotId {
        self.inner.id
    }

    pub fn state(&self) -> SlotState {
        self.lock().state
    }

    /// Entry currently being loaded
    pub fn trying_entry(&self) -> Option<Uuid> {
        self.lock().trying
    }

    /// Entry that loaded successfully, possibly not the expected one
    pub fn actual_entry(&self) -> Option<QueueEntry> {
        self.lock().actual.clone()
    }

    /// Entry this slot is about: the loaded one, else the one being tried
    pub fn target_entry(&self) -> Option<Uuid> {
        let core = self.lock();
        core.actual.as_ref().map(|e| e.id).or(core.trying)
    }

    pub fn is_engage_requested(&self) -> bool {
        self.lock().engage_requested
    }

    /// True once media playback actually started
    pub fn is_started(&self) -> bool {
        self.lock().started
    }

    pub fn is_finish_called(&self) -> bool {
        self.lock().finish_called
    }

    /// Loaded media, while the slot holds it
    pub fn media(&self) -> Option<Arc<dyn MediaElement>> {
        self.lock().media.clone()
    }

    /// Resolve once the slot released its resources
    pub async fn finished(&self) {
        let mut rx = self.inner.finished.subscribe();
        // the sender lives as long as this slot handle
        let _ = rx.wait_for(|done| *done).await;
    }

    pub fn is_finished(&self) -> bool {
        *self.inner.finished.borrow()
    }

    /// Start playback once prepared, gated by `playing`
    ///
    /// Playback starts (with a fade-in) when the gate is true, and follows
    /// later gate changes as pause/resume. Has no effect after `finish` or a
    /// previous `engage`.
    pub fn engage(&self, playing: watch::Receiver<bool>) {
        let start_now = {
            let mut core = self.lock();
            if core.finish_called || core.engage_requested {
                return;
            }
            core.engage_requested = true;
            core.gate = Some(playing);
            core.media.is_some()
        };

        if start_now {
            self.spawn_run();
        }
    }

    /// Terminate the slot; idempotent
    pub fn finish(&self) {
        let action = {
            let mut core = self.lock();
            if core.finish_called {
                return;
            }
            core.finish_called = true;

            match core.media.clone() {
                None => {
                    core.state = SlotState::Finished;
                    FinishAction::Settle
                }
                Some(media) if !core.started => {
                    core.media = None;
                    core.state = SlotState::Finished;
                    FinishAction::Dispose(media)
                }
                Some(media) => {
                    core.stop_out_called = true;
                    core.state = SlotState::Finishing;
                    FinishAction::StopOut(media)
                }
            }
        };

        debug!("{} finishing", self.id());
        self.inner.prepare_cancel.cancel();
        self.inner.engage_cancel.cancel();

        match action {
            FinishAction::Settle => self.settle(),
            FinishAction::Dispose(media) => {
                media.dispose();
                self.inner.follow_cancel.cancel();
                self.settle();
            }
            FinishAction::StopOut(media) => {
                let slot = self.clone();
                tokio::spawn(async move { slot.stop_out(media).await });
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotCore> {
        self.inner.core.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn emit(&self, kind: SlotEventKind) {
        let _ = self.inner.ctx.events.send(SlotEvent {
            slot: self.id(),
            kind,
        });
    }

    fn settle(&self) {
        self.inner.finished.send_replace(true);
        self.emit(SlotEventKind::Finished);
    }

    async fn run_prepare(&self, expected_entry: Uuid) {
        let queue = &self.inner.ctx.queue;
        let mut candidate = queue.closest_valid_entry(expected_entry, true).await;

        loop {
            if self.inner.prepare_cancel.is_cancelled() {
                return;
            }

            let trying = candidate.as_ref().map(|e| e.id);
            self.lock().trying = trying;
            self.emit(SlotEventKind::Trying(trying));

            let Some(entry) = candidate else {
                debug!("{} found no playable entry", self.id());
                let settled = {
                    let mut core = self.lock();
                    if core.finish_called {
                        false
                    } else {
                        core.finish_called = true;
                        core.state = SlotState::Finished;
                        true
                    }
                };
                if settled {
                    self.inner.finished.send_replace(true);
                    self.emit(SlotEventKind::NoPlayableEntry);
                }
                return;
            };

            // not raced against cancellation: a late success must still be disposed
            match self.inner.ctx.backend.open(&entry.video).await {
                Ok(media) => {
                    self.on_loaded(entry, media);
                    return;
                }
                Err(e) => {
                    warn!(
                        "{} skipped entry {} ({}) because it failed to load: {}",
                        self.id(),
                        entry.id,
                        entry.video.id,
                        e
                    );
                    let error = e.to_string();
                    queue.mark_skipped(entry.id, &error).await;
                    self.emit(SlotEventKind::LoadFailed {
                        entry_id: entry.id,
                        error,
                    });
                    candidate = queue.closest_valid_entry(entry.id, false).await;
                }
            }
        }
    }

    fn on_loaded(&self, entry: QueueEntry, media: Arc<dyn MediaElement>) {
        let entry_id = entry.id;
        let start_now = {
            let mut core = self.lock();
            if core.finish_called {
                drop(core);
                debug!("{} finished during preparation, releasing media", self.id());
                media.dispose();
                return;
            }
            core.trying = None;
            core.actual = Some(entry);
            core.media = Some(media);
            core.state = SlotState::Prepared;
            core.engage_requested
        };

        self.emit(SlotEventKind::Trying(None));
        self.emit(SlotEventKind::Prepared { entry_id });
        debug!("{} prepared entry {}", self.id(), entry_id);

        if start_now {
            self.spawn_run();
        }
    }

    fn spawn_run(&self) {
        let slot = self.clone();
        tokio::spawn(async move { slot.run_engaged().await });
    }

    async fn run_engaged(&self) {
        let (media, entry_id, gate) = {
            let mut core = self.lock();
            match (core.media.clone(), core.actual.as_ref().map(|e| e.id), core.gate.take()) {
                (Some(media), Some(entry_id), Some(gate)) => (media, entry_id, gate),
                _ => return,
            }
        };
        let cancel = self.inner.engage_cancel.clone();

        self.emit(SlotEventKind::AboutToStart { entry_id });

        let mut gate = gate;
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            opened = async { gate.wait_for(|playing| *playing).await.is_ok() } => {
                if !opened {
                    return;
                }
            }
        }

        {
            let mut core = self.lock();
            if core.finish_called {
                return;
            }
            core.started = true;
            core.state = SlotState::Engaged;
            media.set_volume(0.0);
            media.play();
        }
        debug!("{} started entry {}", self.id(), entry_id);

        self.spawn_cue(Arc::clone(&media), entry_id);
        self.spawn_follower(Arc::clone(&media), gate);

        self.inner
            .ctx
            .timing
            .fade(FadeDirection::In)
            .run(media.as_ref(), &cancel)
            .await;
    }

    fn spawn_cue(&self, media: Arc<dyn MediaElement>, entry_id: Uuid) {
        let slot = self.clone();
        let cancel = self.inner.engage_cancel.clone();
        let cue_at = media
            .duration()
            .saturating_sub(self.inner.ctx.timing.auto_end_lead);

        tokio::spawn(async move {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {}
                reached = media.reached(cue_at) => {
                    if reached && !slot.is_finish_called() {
                        debug!("{} auto-ending entry {}", slot.id(), entry_id);
                        slot.emit(SlotEventKind::AboutToEnd { entry_id });
                        slot.finish();
                    }
                }
            }
        });
    }

    fn spawn_follower(&self, media: Arc<dyn MediaElement>, mut gate: watch::Receiver<bool>) {
        let cancel = self.inner.follow_cancel.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    changed = gate.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        if *gate.borrow_and_update() {
                            media.play();
                        } else {
                            media.pause();
                        }
                    }
                }
            }
        });
    }

    async fn stop_out(&self, media: Arc<dyn MediaElement>) {
        self.inner
            .ctx
            .timing
            .fade(FadeDirection::Out)
            .run(media.as_ref(), &CancellationToken::new())
            .await;

        self.inner.follow_cancel.cancel();
        media.dispose();
        {
            let mut core = self.lock();
            core.media = None;
            core.state = SlotState::Finished;
        }
        debug!("{} finished", self.id());
        self.settle();
    }
}

impl fmt::Debug for PlaybackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let core = self.lock();
        f.debug_struct("PlaybackSlot")
            .field("id", &self.inner.id)
            .field("state", &core.state)
            .field("trying", &core.trying)
            .field("actual", &core.actual.as_ref().map(|e| e.id))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_ids_are_unique() {
        let a = SlotId::next();
        let b = SlotId::next();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("slot#"));
    }

    #[test]
    fn test_default_timing() {
        let timing = SlotTiming::default();
        assert_eq!(timing.fade_duration, Duration::from_secs(3));
        assert_eq!(timing.auto_end_lead, Duration::from_secs(15));
        assert_eq!(timing.fade(FadeDirection::Out).direction, FadeDirection::Out);
    }
}
