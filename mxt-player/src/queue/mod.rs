//! Queue model
//!
//! Ordered list of queue entries: insertion order is playback order and entries
//! are identified by their generated id, not by video (the same video may be
//! queued twice). Structural changes are published as [`QueueChange`] events to
//! every subscriber, in mutation order, while the write lock is held.

pub mod codec;

use crate::error::{Error, Result};
use crate::provider::VideoProvider;
use mxt_common::events::{EventBus, MxtEvent, QueueChangeTrigger, QueueEntryInfo};
use mxt_common::{Video, VideoRef};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One slot of the queue
#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    /// Generated id, stable while the entry stays in the queue
    pub id: Uuid,
    pub video: Video,
    /// Set once playback failed for this entry; reset when the queue is reloaded
    pub skipped_at_runtime: bool,
}

impl QueueEntry {
    fn new(video: Video) -> Self {
        Self {
            id: Uuid::new_v4(),
            video,
            skipped_at_runtime: false,
        }
    }

    pub fn info(&self) -> QueueEntryInfo {
        QueueEntryInfo {
            entry_id: self.id,
            video_id: self.video.id.clone(),
            title: self.video.title.clone(),
            skipped_at_runtime: self.skipped_at_runtime,
        }
    }
}

/// Structural queue change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueueChange {
    EntryAdded { index: usize, entry_id: Uuid },
    /// `index` is the position the entry had before removal
    EntryRemoved { index: usize, entry_id: Uuid },
    /// Whole queue replaced; `previous` lists the old entries in their old order
    Replaced { previous: Vec<Uuid> },
}

/// Plain queue data, see [`SharedQueue`] for the shared handle
#[derive(Debug, Default, Clone)]
pub struct Queue {
    entries: Vec<QueueEntry>,
}

impl Queue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&QueueEntry> {
        self.entries.get(index)
    }

    pub fn index_of(&self, entry_id: Uuid) -> Option<usize> {
        self.entries.iter().position(|e| e.id == entry_id)
    }

    pub fn entry(&self, entry_id: Uuid) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.id == entry_id)
    }

    /// Append a new entry for `video` and return it
    pub fn append_video(&mut self, video: Video) -> QueueEntry {
        let entry = QueueEntry::new(video);
        self.entries.push(entry.clone());
        entry
    }

    /// Remove by identity, returning the former index and the entry
    pub fn remove_entry(&mut self, entry_id: Uuid) -> Option<(usize, QueueEntry)> {
        let index = self.index_of(entry_id)?;
        Some((index, self.entries.remove(index)))
    }

    /// Flag an entry as failed; returns false if it is not in the queue
    pub fn mark_skipped(&mut self, entry_id: Uuid) -> bool {
        match self.entries.iter_mut().find(|e| e.id == entry_id) {
            Some(entry) => {
                entry.skipped_at_runtime = true;
                true
            }
            None => false,
        }
    }

    /// First entry at or after `start_index` that is not skipped
    ///
    /// Never wraps around to the start of the queue.
    pub fn closest_valid_entry_by_index(&self, start_index: usize) -> Option<&QueueEntry> {
        self.entries
            .iter()
            .skip(start_index)
            .find(|e| !e.skipped_at_runtime)
    }

    /// Closest valid entry relative to an entry already in the queue
    ///
    /// With `include_self` the scan starts at the entry itself, otherwise just
    /// after it. Returns None if the entry is no longer queued.
    pub fn closest_valid_entry(&self, entry_id: Uuid, include_self: bool) -> Option<&QueueEntry> {
        let index = self.index_of(entry_id)?;
        let start = if include_self { index } else { index + 1 };
        self.closest_valid_entry_by_index(start)
    }

    pub fn video_refs(&self) -> Vec<VideoRef> {
        self.entries.iter().map(|e| e.video.video_ref()).collect()
    }

    /// Compact URL-safe form; runtime flags are not part of it
    pub fn serialize(&self) -> String {
        codec::encode(&self.video_refs())
    }

    /// Replace all entries with fresh ones, returning the old entry ids in order
    pub fn replace_videos(&mut self, videos: Vec<Video>) -> Vec<Uuid> {
        let previous = self.entries.iter().map(|e| e.id).collect();
        self.entries = videos.into_iter().map(QueueEntry::new).collect();
        previous
    }

    pub fn infos(&self) -> Vec<QueueEntryInfo> {
        self.entries.iter().map(QueueEntry::info).collect()
    }
}

/// Shared, observable queue handle
///
/// Cloning is cheap; all clones see the same queue. Mutations are serialized by
/// the inner write lock, and change subscribers receive events in mutation order.
#[derive(Clone)]
pub struct SharedQueue {
    inner: Arc<RwLock<Queue>>,
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<QueueChange>>>>,
    event_bus: Arc<EventBus>,
}

impl SharedQueue {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Queue::new())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            event_bus,
        }
    }

    /// Receive every structural change from now on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<QueueChange> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock_subscribers().push(tx);
        rx
    }

    /// Copy of the current queue
    pub async fn snapshot(&self) -> Queue {
        self.inner.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.is_empty()
    }

    pub async fn entry(&self, entry_id: Uuid) -> Option<QueueEntry> {
        self.inner.read().await.entry(entry_id).cloned()
    }

    pub async fn index_of(&self, entry_id: Uuid) -> Option<usize> {
        self.inner.read().await.index_of(entry_id)
    }

    pub async fn get(&self, index: usize) -> Option<QueueEntry> {
        self.inner.read().await.get(index).cloned()
    }

    pub async fn closest_valid_entry_by_index(&self, start_index: usize) -> Option<QueueEntry> {
        self.inner
            .read()
            .await
            .closest_valid_entry_by_index(start_index)
            .cloned()
    }

    pub async fn closest_valid_entry(&self, entry_id: Uuid, include_self: bool) -> Option<QueueEntry> {
        self.inner
            .read()
            .await
            .closest_valid_entry(entry_id, include_self)
            .cloned()
    }

    pub async fn serialize(&self) -> String {
        self.inner.read().await.serialize()
    }

    /// Append a video at the end of the queue
    pub async fn append_video(&self, video: Video, trigger: QueueChangeTrigger) -> QueueEntry {
        let mut queue = self.inner.write().await;
        let entry = queue.append_video(video);
        let index = queue.len() - 1;
        debug!("Appended entry {} ({}) at index {}", entry.id, entry.video.id, index);

        self.publish(&queue, QueueChange::EntryAdded { index, entry_id: entry.id }, trigger);
        entry
    }

    /// Remove an entry by identity
    pub async fn remove_entry(&self, entry_id: Uuid) -> Result<QueueEntry> {
        let mut queue = self.inner.write().await;
        let (index, entry) = queue
            .remove_entry(entry_id)
            .ok_or(Error::EntryNotFound(entry_id))?;
        debug!("Removed entry {} from index {}", entry_id, index);

        self.publish(
            &queue,
            QueueChange::EntryRemoved { index, entry_id },
            QueueChangeTrigger::UserRemove,
        );
        Ok(entry)
    }

    /// Flag an entry that failed to load
    pub async fn mark_skipped(&self, entry_id: Uuid, reason: &str) -> bool {
        let marked = self.inner.write().await.mark_skipped(entry_id);
        if marked {
            self.event_bus.emit_lossy(MxtEvent::EntrySkipped {
                entry_id,
                reason: reason.to_string(),
                timestamp: chrono::Utc::now(),
            });
        }
        marked
    }

    /// Rebuild the queue from its serialized form
    ///
    /// Every reference is resolved against the provider before anything is
    /// touched: on any failure the current queue is left as it was.
    pub async fn load_serialized(&self, serialized: &str, provider: &dyn VideoProvider) -> Result<()> {
        let refs = codec::decode(serialized)?;
        let videos = resolve_refs(&refs, provider).await?;

        let mut queue = self.inner.write().await;
        let previous = queue.replace_videos(videos);
        info!("Queue replaced from serialized form ({} entries)", queue.len());

        self.publish(
            &queue,
            QueueChange::Replaced { previous },
            QueueChangeTrigger::Navigation,
        );
        Ok(())
    }

    fn publish(&self, queue: &Queue, change: QueueChange, trigger: QueueChangeTrigger) {
        self.lock_subscribers()
            .retain(|tx| tx.send(change.clone()).is_ok());

        self.event_bus.emit_lossy(MxtEvent::QueueChanged {
            entries: queue.infos(),
            trigger,
            timestamp: chrono::Utc::now(),
        });
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, Vec<mpsc::UnboundedSender<QueueChange>>> {
        // a panic while holding this lock leaves the Vec intact
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Look up every reference and keep only confirmed videos, in reference order
async fn resolve_refs(refs: &[VideoRef], provider: &dyn VideoProvider) -> Result<Vec<Video>> {
    if refs.is_empty() {
        return Ok(Vec::new());
    }

    let mut ids: Vec<String> = refs.iter().map(|r| r.id.clone()).collect();
    ids.sort();
    ids.dedup();

    let found: HashMap<String, Video> = provider
        .list_videos_by_ids(&ids)
        .await
        .map_err(|e| {
            warn!("Video lookup failed while loading queue: {}", e);
            Error::Deserialize(format!("video lookup failed: {}", e))
        })?
        .into_iter()
        .map(|v| (v.id.clone(), v))
        .collect();

    refs.iter()
        .map(|r| match found.get(&r.id) {
            Some(video) if video.is_confirmed() && video.provider == r.provider => Ok(video.clone()),
            _ => Err(Error::Deserialize(format!("video {} not found", r.id))),
        })
        .collect()
}
