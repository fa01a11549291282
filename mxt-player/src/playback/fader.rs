//! Volume ramps for slot fade-in and fade-out
//!
//! A fade drives a media element's volume along a [`FadeCurve`] in fixed
//! steps on the tokio clock. Fades run on wall time, not media time: pausing
//! during a fade-out does not stop it.

use crate::media::MediaElement;
use mxt_common::FadeCurve;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeDirection {
    In,
    Out,
}

/// One volume ramp
#[derive(Debug, Clone, Copy)]
pub struct Fade {
    pub direction: FadeDirection,
    pub duration: Duration,
    pub curve: FadeCurve,
    pub step: Duration,
}

impl Fade {
    /// Volume at `elapsed` into the fade, scaled so a fade-out starts at `from`
    pub fn volume_at(&self, elapsed: Duration, from: f32) -> f32 {
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
        };

        match self.direction {
            FadeDirection::In if progress >= 1.0 => 1.0,
            FadeDirection::Out if progress >= 1.0 => 0.0,
            FadeDirection::In => self.curve.calculate_fade_in(progress),
            FadeDirection::Out => from * self.curve.calculate_fade_out(progress),
        }
    }

    /// Ramp the element's volume until the fade completes or `cancel` fires
    ///
    /// Returns true if the fade ran to completion; the final volume is then
    /// exactly 1.0 (in) or 0.0 (out).
    pub async fn run(&self, element: &dyn MediaElement, cancel: &CancellationToken) -> bool {
        if cancel.is_cancelled() {
            return false;
        }
        let from = match self.direction {
            FadeDirection::In => 0.0,
            FadeDirection::Out => element.volume(),
        };
        element.set_volume(self.volume_at(Duration::ZERO, from));

        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.step.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    trace!("Fade {:?} cancelled at volume {}", self.direction, element.volume());
                    return false;
                }
                _ = ticker.tick() => {}
            }

            let elapsed = started.elapsed();
            element.set_volume(self.volume_at(elapsed, from));
            if elapsed >= self.duration {
                return true;
            }
        }
    }
}
