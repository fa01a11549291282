//! Playback: slots, fades and the orchestrator driving them

pub mod fader;
pub mod orchestrator;
pub mod slot;

pub use orchestrator::Orchestrator;
pub use slot::{PlaybackSlot, SlotContext, SlotEvent, SlotEventKind, SlotId, SlotState, SlotTiming};
