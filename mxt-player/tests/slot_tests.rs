//! Playback slot lifecycle tests
//!
//! Run on a paused tokio clock: loads, fades and cues advance in virtual time.

mod helpers;

use helpers::{next_slot_event, slot_context, video};
use mxt_common::events::{EventBus, QueueChangeTrigger};
use mxt_player::media::{ClockedBackend, MediaElement};
use mxt_player::playback::{PlaybackSlot, SlotEventKind, SlotState};
use mxt_player::queue::{QueueEntry, SharedQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

async fn setup(ids: &[(&str, u64)], latency_ms: u64) -> (SharedQueue, Arc<ClockedBackend>, Vec<QueueEntry>) {
    let queue = SharedQueue::new(Arc::new(EventBus::new(64)));
    let backend = Arc::new(ClockedBackend::new(Duration::from_millis(latency_ms)).with_recording());
    let mut entries = Vec::new();
    for (id, duration_ms) in ids {
        entries.push(
            queue
                .append_video(video(id, *duration_ms), QueueChangeTrigger::UserAppend)
                .await,
        );
    }
    (queue, backend, entries)
}

#[tokio::test(start_paused = true)]
async fn test_prepare_walks_past_failing_entry() {
    let (queue, backend, entries) =
        setup(&[("a", 60_000), ("b", 60_000), ("c", 60_000)], 100).await;
    backend.fail_video("b");
    let (ctx, mut rx) = slot_context(&queue, &backend);

    let slot = PlaybackSlot::prepare(ctx, entries[1].id);

    assert_eq!(next_slot_event(&mut rx).await, SlotEventKind::Trying(Some(entries[1].id)));
    assert!(matches!(
        next_slot_event(&mut rx).await,
        SlotEventKind::LoadFailed { entry_id, .. } if entry_id == entries[1].id
    ));
    assert_eq!(next_slot_event(&mut rx).await, SlotEventKind::Trying(Some(entries[2].id)));
    assert_eq!(next_slot_event(&mut rx).await, SlotEventKind::Trying(None));
    assert_eq!(
        next_slot_event(&mut rx).await,
        SlotEventKind::Prepared { entry_id: entries[2].id }
    );

    assert_eq!(slot.state(), SlotState::Prepared);
    assert_eq!(slot.actual_entry().unwrap().id, entries[2].id);
    assert!(slot.trying_entry().is_none());
    assert!(queue.entry(entries[1].id).await.unwrap().skipped_at_runtime);
    assert!(!queue.entry(entries[2].id).await.unwrap().skipped_at_runtime);
}

#[tokio::test(start_paused = true)]
async fn test_prepare_starts_at_closest_valid_entry() {
    let (queue, backend, entries) = setup(&[("a", 60_000), ("b", 60_000)], 0).await;
    queue.mark_skipped(entries[0].id, "earlier failure").await;
    let (ctx, mut rx) = slot_context(&queue, &backend);

    let slot = PlaybackSlot::prepare(ctx, entries[0].id);

    assert_eq!(next_slot_event(&mut rx).await, SlotEventKind::Trying(Some(entries[1].id)));
    assert_eq!(next_slot_event(&mut rx).await, SlotEventKind::Trying(None));
    assert_eq!(
        next_slot_event(&mut rx).await,
        SlotEventKind::Prepared { entry_id: entries[1].id }
    );
    assert_eq!(backend.opened().len(), 1);
    assert_eq!(slot.actual_entry().unwrap().id, entries[1].id);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retry_chain_reports_no_playable_entry() {
    let (queue, backend, entries) = setup(&[("a", 60_000), ("b", 60_000)], 10).await;
    backend.fail_video("a");
    backend.fail_video("b");
    let (ctx, mut rx) = slot_context(&queue, &backend);

    let slot = PlaybackSlot::prepare(ctx, entries[0].id);

    let mut kinds = Vec::new();
    loop {
        let kind = next_slot_event(&mut rx).await;
        let done = kind == SlotEventKind::NoPlayableEntry;
        kinds.push(kind);
        if done {
            break;
        }
    }

    assert_eq!(kinds.len(), 6);
    assert_eq!(kinds[4], SlotEventKind::Trying(None));
    assert!(slot.is_finished());
    assert_eq!(slot.state(), SlotState::Finished);
    for entry in &entries {
        assert!(queue.entry(entry.id).await.unwrap().skipped_at_runtime);
    }
    assert_eq!(backend.live_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_finish_while_preparing_disposes_late_load() {
    let (queue, backend, entries) = setup(&[("a", 60_000)], 500).await;
    let (ctx, mut rx) = slot_context(&queue, &backend);

    let slot = PlaybackSlot::prepare(ctx, entries[0].id);
    assert_eq!(next_slot_event(&mut rx).await, SlotEventKind::Trying(Some(entries[0].id)));

    slot.finish();
    assert_eq!(slot.state(), SlotState::Finished);
    slot.finished().await;
    assert_eq!(next_slot_event(&mut rx).await, SlotEventKind::Finished);

    // the load completes after finish
    tokio::time::sleep(Duration::from_secs(1)).await;

    let opened = backend.opened();
    assert_eq!(opened.len(), 1);
    assert!(opened[0].is_disposed());
    assert_eq!(backend.live_count(), 0);
    assert!(slot.media().is_none());
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_finish_before_start_releases_immediately() {
    let (queue, backend, entries) = setup(&[("a", 60_000)], 0).await;
    let (ctx, mut rx) = slot_context(&queue, &backend);

    let slot = PlaybackSlot::prepare(ctx, entries[0].id);
    loop {
        if let SlotEventKind::Prepared { .. } = next_slot_event(&mut rx).await {
            break;
        }
    }

    let media = slot.media().unwrap();
    slot.finish();

    assert!(media.is_disposed());
    assert!(!media.is_playing());
    assert_eq!(backend.live_count(), 0);
    assert!(slot.is_finished());
    assert_eq!(next_slot_event(&mut rx).await, SlotEventKind::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_engage_waits_for_playing_gate_and_fades_in() {
    let (queue, backend, entries) = setup(&[("a", 60_000)], 0).await;
    let (ctx, mut rx) = slot_context(&queue, &backend);
    let (gate_tx, gate_rx) = watch::channel(false);

    let slot = PlaybackSlot::prepare(ctx, entries[0].id);
    slot.engage(gate_rx);

    loop {
        if let SlotEventKind::AboutToStart { entry_id } = next_slot_event(&mut rx).await {
            assert_eq!(entry_id, entries[0].id);
            break;
        }
    }
    tokio::time::sleep(Duration::from_secs(1)).await;
    let media = slot.media().unwrap();
    assert!(!media.is_playing());
    assert!(!slot.is_started());

    gate_tx.send_replace(true);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(media.is_playing());
    assert_eq!(slot.state(), SlotState::Engaged);
    assert!(media.volume() < 0.5);

    tokio::time::sleep(Duration::from_secs(4)).await;
    assert!(media.volume() > 0.999);

    // pause and resume follow the gate
    gate_tx.send_replace(false);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!media.is_playing());
    gate_tx.send_replace(true);
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(media.is_playing());
}

#[tokio::test(start_paused = true)]
async fn test_auto_end_cue_fires_before_media_end() {
    let (queue, backend, entries) = setup(&[("a", 20_000)], 0).await;
    let (ctx, mut rx) = slot_context(&queue, &backend);
    let (_gate_tx, gate_rx) = watch::channel(true);

    let slot = PlaybackSlot::prepare(ctx, entries[0].id);
    slot.engage(gate_rx);

    loop {
        if let SlotEventKind::AboutToStart { .. } = next_slot_event(&mut rx).await {
            break;
        }
    }
    let started = Instant::now();

    assert_eq!(
        next_slot_event(&mut rx).await,
        SlotEventKind::AboutToEnd { entry_id: entries[0].id }
    );
    let cue_after = started.elapsed();
    assert!(cue_after >= Duration::from_secs(5) && cue_after < Duration::from_millis(5100));
    assert_eq!(slot.state(), SlotState::Finishing);

    assert_eq!(next_slot_event(&mut rx).await, SlotEventKind::Finished);
    let finished_after = started.elapsed();
    assert!(finished_after >= Duration::from_secs(8) && finished_after < Duration::from_millis(8200));
    assert_eq!(backend.live_count(), 0);
    assert_eq!(slot.state(), SlotState::Finished);
}

#[tokio::test(start_paused = true)]
async fn test_auto_end_cue_follows_media_clock() {
    let (queue, backend, entries) = setup(&[("a", 20_000)], 0).await;
    let (ctx, mut rx) = slot_context(&queue, &backend);
    let (gate_tx, gate_rx) = watch::channel(true);

    let slot = PlaybackSlot::prepare(ctx, entries[0].id);
    slot.engage(gate_rx);
    loop {
        if let SlotEventKind::AboutToStart { .. } = next_slot_event(&mut rx).await {
            break;
        }
    }

    tokio::time::sleep(Duration::from_secs(2)).await;
    gate_tx.send_replace(false);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(rx.try_recv().is_err());
    assert!(!slot.is_finish_called());

    gate_tx.send_replace(true);
    let resumed = Instant::now();
    assert_eq!(
        next_slot_event(&mut rx).await,
        SlotEventKind::AboutToEnd { entry_id: entries[0].id }
    );
    let waited = resumed.elapsed();
    assert!(waited >= Duration::from_millis(2900) && waited < Duration::from_millis(3200));
}

#[tokio::test(start_paused = true)]
async fn test_finish_is_idempotent_and_fades_out() {
    let (queue, backend, entries) = setup(&[("a", 60_000)], 0).await;
    let (ctx, mut rx) = slot_context(&queue, &backend);
    let (_gate_tx, gate_rx) = watch::channel(true);

    let slot = PlaybackSlot::prepare(ctx, entries[0].id);
    slot.engage(gate_rx);
    loop {
        if let SlotEventKind::AboutToStart { .. } = next_slot_event(&mut rx).await {
            break;
        }
    }
    tokio::time::sleep(Duration::from_secs(5)).await;
    let media = slot.media().unwrap();

    slot.finish();
    slot.finish();
    assert_eq!(slot.state(), SlotState::Finishing);

    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert!(media.volume() < 0.99 && media.volume() > 0.0);
    assert!(!media.is_disposed());

    slot.finished().await;
    assert!(media.is_disposed());
    assert_eq!(media.volume(), 0.0);
    assert_eq!(next_slot_event(&mut rx).await, SlotEventKind::Finished);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(rx.try_recv().is_err());
    assert_eq!(backend.live_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_engage_after_finish_is_ignored() {
    let (queue, backend, entries) = setup(&[("a", 60_000)], 0).await;
    let (ctx, mut rx) = slot_context(&queue, &backend);
    let (_gate_tx, gate_rx) = watch::channel(true);

    let slot = PlaybackSlot::prepare(ctx, entries[0].id);
    slot.finish();
    slot.engage(gate_rx);

    assert_eq!(next_slot_event(&mut rx).await, SlotEventKind::Finished);
    tokio::time::sleep(Duration::from_secs(1)).await;

    assert!(!slot.is_engage_requested());
    assert_eq!(backend.live_count(), 0);
}
