//! # MixTube Common Library
//!
//! Shared code for the MixTube host and its tools:
//! - Video records and provider tags
//! - Event types (MxtEvent enum) and the EventBus
//! - Configuration file resolution
//! - Fade curve definitions used by slot fade-in/fade-out

pub mod config;
pub mod error;
pub mod events;
pub mod fade_curves;
pub mod model;

pub use error::{Error, Result};
pub use fade_curves::FadeCurve;
pub use model::{Provider, Video, VideoRef};
