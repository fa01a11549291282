//! # MixTube Player Library (mxt-player)
//!
//! Host side of MixTube: owns the video queue, sequences playback slots with
//! pre-buffering and cross-fades, and lets peers append videos to the queue
//! through a shared signaling session.
//!
//! **Architecture:** queue model -> orchestrator -> playback slots -> media
//! backend, with an HTTP/SSE control surface on top.

pub mod api;
pub mod config;
pub mod error;
pub mod media;
pub mod notify;
pub mod playback;
pub mod provider;
pub mod queue;
pub mod share;
pub mod state;
pub mod url_sync;

pub use error::{Error, Result};
pub use state::SharedState;
