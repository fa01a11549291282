//! Headless media backend driven by the tokio clock
//!
//! Elements have no audio or video output: they only keep a playback clock
//! that advances while playing, plus a volume. Loading takes `load_latency`
//! and fails for the configured video ids. Every opened element stays counted
//! as live until it is disposed, which makes resource leaks observable.
//! A backend built with [`ClockedBackend::with_recording`] also keeps every
//! element it opened for inspection; the default one keeps none.

use super::{MediaBackend, MediaElement};
use crate::error::{Error, Result};
use async_trait::async_trait;
use mxt_common::Video;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::debug;

pub struct ClockedBackend {
    load_latency: Duration,
    failing_ids: RwLock<HashSet<String>>,
    live: Arc<AtomicUsize>,
    /// Only set when recording
    opened: Option<Mutex<Vec<Arc<ClockedElement>>>>,
}

impl ClockedBackend {
    pub fn new(load_latency: Duration) -> Self {
        Self {
            load_latency,
            failing_ids: RwLock::new(HashSet::new()),
            live: Arc::new(AtomicUsize::new(0)),
            opened: None,
        }
    }

    /// Keep every opened element, disposed ones included
    pub fn with_recording(mut self) -> Self {
        self.opened = Some(Mutex::new(Vec::new()));
        self
    }

    /// Make every future load of `video_id` fail
    pub fn fail_video(&self, video_id: impl Into<String>) {
        self.failing_ids
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(video_id.into());
    }

    pub fn with_failing_ids<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for id in ids {
            self.fail_video(id);
        }
        self
    }

    /// Number of elements opened and not yet disposed
    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Every element opened so far, in open order; empty unless recording
    pub fn opened(&self) -> Vec<Arc<ClockedElement>> {
        self.opened
            .as_ref()
            .map(|opened| opened.lock().unwrap_or_else(|e| e.into_inner()).clone())
            .unwrap_or_default()
    }

    fn is_failing(&self, video_id: &str) -> bool {
        self.failing_ids
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(video_id)
    }
}

#[async_trait]
impl MediaBackend for ClockedBackend {
    async fn open(&self, video: &Video) -> Result<Arc<dyn MediaElement>> {
        tokio::time::sleep(self.load_latency).await;

        if self.is_failing(&video.id) {
            return Err(Error::Load {
                video_id: video.id.clone(),
                reason: "media not playable".to_string(),
            });
        }

        let element = Arc::new(ClockedElement::new(
            video.id.clone(),
            Duration::from_millis(video.duration_ms),
            Arc::clone(&self.live),
        ));
        self.live.fetch_add(1, Ordering::SeqCst);
        if let Some(opened) = &self.opened {
            opened
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(Arc::clone(&element));
        }
        debug!("Opened media for video {}", video.id);

        Ok(element)
    }
}

#[derive(Debug)]
struct ClockState {
    /// Position accumulated up to the last pause
    base: Duration,
    /// Set while playing
    playing_since: Option<Instant>,
    volume: f32,
    disposed: bool,
}

/// Media element of [`ClockedBackend`]
pub struct ClockedElement {
    video_id: String,
    duration: Duration,
    state: Mutex<ClockState>,
    changed: Notify,
    live: Arc<AtomicUsize>,
}

impl ClockedElement {
    fn new(video_id: String, duration: Duration, live: Arc<AtomicUsize>) -> Self {
        Self {
            video_id,
            duration,
            state: Mutex::new(ClockState {
                base: Duration::ZERO,
                playing_since: None,
                volume: 1.0,
                disposed: false,
            }),
            changed: Notify::new(),
            live,
        }
    }

    pub fn video_id(&self) -> &str {
        &self.video_id
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ClockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn position_of(&self, state: &ClockState) -> Duration {
        let elapsed = state
            .playing_since
            .map(|since| since.elapsed())
            .unwrap_or_default();
        (state.base + elapsed).min(self.duration)
    }
}

#[async_trait]
impl MediaElement for ClockedElement {
    fn duration(&self) -> Duration {
        self.duration
    }

    fn position(&self) -> Duration {
        let state = self.lock();
        self.position_of(&state)
    }

    fn is_playing(&self) -> bool {
        self.lock().playing_since.is_some()
    }

    fn play(&self) {
        {
            let mut state = self.lock();
            if state.disposed || state.playing_since.is_some() {
                return;
            }
            state.playing_since = Some(Instant::now());
        }
        self.changed.notify_waiters();
    }

    fn pause(&self) {
        {
            let mut state = self.lock();
            let Some(since) = state.playing_since.take() else {
                return;
            };
            state.base = (state.base + since.elapsed()).min(self.duration);
        }
        self.changed.notify_waiters();
    }

    fn volume(&self) -> f32 {
        self.lock().volume
    }

    fn set_volume(&self, volume: f32) {
        self.lock().volume = volume.clamp(0.0, 1.0);
    }

    async fn reached(&self, position: Duration) -> bool {
        let target = position.min(self.duration);
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // register before reading the state so a concurrent play/pause is not missed
            notified.as_mut().enable();

            let (disposed, current, playing) = {
                let state = self.lock();
                (
                    state.disposed,
                    self.position_of(&state),
                    state.playing_since.is_some(),
                )
            };

            if disposed {
                return false;
            }
            if current >= target {
                return true;
            }

            if playing {
                tokio::select! {
                    _ = tokio::time::sleep(target - current) => {}
                    _ = &mut notified => {}
                }
            } else {
                notified.await;
            }
        }
    }

    fn dispose(&self) {
        {
            let mut state = self.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            if let Some(since) = state.playing_since.take() {
                state.base = (state.base + since.elapsed()).min(self.duration);
            }
        }
        self.live.fetch_sub(1, Ordering::SeqCst);
        self.changed.notify_waiters();
        debug!("Disposed media for video {}", self.video_id);
    }

    fn is_disposed(&self) -> bool {
        self.lock().disposed
    }
}
