//! mxt-player specific configuration
//!
//! Every key is optional in the TOML file; missing keys take the defaults below.

use crate::error::Error;
use crate::playback::slot::SlotTiming;
use mxt_common::model::is_valid_video_id;
use mxt_common::{FadeCurve, Video};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Host configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// HTTP port
    pub port: u16,
    /// Buffered events per SSE subscriber before the oldest are dropped
    pub event_capacity: usize,
    pub playback: PlaybackConfig,
    pub notifications: NotificationConfig,
    pub provider: ProviderConfig,
    pub media: MediaConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            port: 5750,
            event_capacity: 256,
            playback: PlaybackConfig::default(),
            notifications: NotificationConfig::default(),
            provider: ProviderConfig::default(),
            media: MediaConfig::default(),
        }
    }
}

impl PlayerConfig {
    /// Load from an optional TOML file (defaults when `path` is None)
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        let config: Self = mxt_common::config::load_toml_config(path)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::Result<()> {
        if let Some(video) = self
            .provider
            .catalog
            .iter()
            .find(|v| !is_valid_video_id(&v.id))
        {
            return Err(Error::Config(format!(
                "catalog video id {:?} must only use [A-Za-z0-9_-]",
                video.id
            )));
        }
        Ok(())
    }

    pub fn slot_timing(&self) -> SlotTiming {
        SlotTiming {
            fade_duration: Duration::from_millis(self.playback.fade_duration_ms),
            auto_end_lead: Duration::from_millis(self.playback.auto_end_lead_ms),
            fade_curve: self.playback.fade_curve,
            fade_step: Duration::from_millis(self.playback.fade_step_ms.max(1)),
        }
    }
}

/// Slot timing settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Fade-in and fade-out duration
    pub fade_duration_ms: u64,
    /// How long before the end of a video the hand-off to the next one starts
    pub auto_end_lead_ms: u64,
    pub fade_curve: FadeCurve,
    /// Volume update period while fading
    pub fade_step_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            fade_duration_ms: 3_000,
            auto_end_lead_ms: 15_000,
            fade_curve: FadeCurve::default(),
            fade_step_ms: 50,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
    /// How long info/warning notifications stay on screen
    pub duration_ms: u64,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self { duration_ms: 5_000 }
    }
}

/// Video provider settings
///
/// With a YouTube API key the host talks to the YouTube Data API, otherwise
/// it serves the videos listed in `catalog`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub youtube_api_key: Option<String>,
    pub catalog: Vec<Video>,
}

/// Headless media backend settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Simulated time for a video to become playable
    pub load_latency_ms: u64,
    /// Video ids that always fail to load
    pub failing_ids: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            load_latency_ms: 500,
            failing_ids: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PlayerConfig::default();
        let timing = config.slot_timing();
        assert_eq!(timing.fade_duration, Duration::from_secs(3));
        assert_eq!(timing.auto_end_lead, Duration::from_secs(15));
        assert_eq!(config.notifications.duration_ms, 5_000);
        assert!(config.provider.youtube_api_key.is_none());
    }

    #[test]
    fn test_parse_partial_toml() {
        let config: PlayerConfig = toml::from_str(
            r#"
            port = 6000

            [playback]
            fade_duration_ms = 1000
            fade_curve = "s_curve"

            [[provider.catalog]]
            id = "abc"
            provider = "youtube"
            title = "A video"
            thumbnail_url = "http://img/abc.jpg"
            duration_ms = 60000
            publisher_name = "Someone"
            "#,
        )
        .unwrap();

        assert_eq!(config.port, 6000);
        assert_eq!(config.playback.fade_duration_ms, 1000);
        assert_eq!(config.playback.auto_end_lead_ms, 15_000);
        assert_eq!(config.playback.fade_curve, FadeCurve::SCurve);
        assert_eq!(config.provider.catalog.len(), 1);
        assert!(config.provider.catalog[0].is_confirmed());
    }
}
