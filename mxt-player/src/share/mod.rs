//! Shared queue: peers append videos to the host's queue over a signaling channel

pub mod client;
pub mod hub;
mod registry;
pub mod server;
pub mod signaling;

pub use client::SharedQueueClient;
pub use hub::{LocalEndpoint, LocalHub};
pub use server::SharedQueueServer;
pub use signaling::{Command, PeerId, SessionEvent, Signal, SignalingChannel};
