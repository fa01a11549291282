//! Media element abstraction
//!
//! A [`MediaBackend`] turns a [`Video`] into a playable [`MediaElement`]. The
//! playback slots never look past these traits, so the host can drive a real
//! player, or the headless [`ClockedBackend`] used by default and in tests.

pub mod clocked;

use crate::error::Result;
use async_trait::async_trait;
use mxt_common::Video;
use std::sync::Arc;
use std::time::Duration;

pub use clocked::{ClockedBackend, ClockedElement};

#[async_trait]
pub trait MediaBackend: Send + Sync {
    /// Load `video` and resolve once it can start playing instantly
    ///
    /// Fails with `Error::Load` if the media cannot become playable.
    async fn open(&self, video: &Video) -> Result<Arc<dyn MediaElement>>;
}

/// A loaded, paused-or-playing media resource
#[async_trait]
pub trait MediaElement: Send + Sync {
    fn duration(&self) -> Duration;

    /// Current playback position, never past `duration`
    fn position(&self) -> Duration;

    fn is_playing(&self) -> bool;

    fn play(&self);

    fn pause(&self);

    /// Volume multiplier in 0.0..=1.0
    fn volume(&self) -> f32;

    fn set_volume(&self, volume: f32);

    /// Resolve once the playback position reaches `position`
    ///
    /// Follows the media clock: time spent paused does not count. Returns false
    /// if the element gets disposed first.
    async fn reached(&self, position: Duration) -> bool;

    /// Release the underlying resource; idempotent
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}
