//! Two-way sync between the queue and the `queue` URL parameter
//!
//! Queue edits rewrite the parameter; navigation (a new parameter value)
//! reloads the queue. The last value written or loaded is remembered, so the
//! parameter write that follows a reload, or a navigation back to the value we
//! just wrote, never triggers another round-trip.

use crate::error::Result;
use crate::notify::Notifier;
use crate::provider::VideoProvider;
use crate::queue::SharedQueue;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub struct QueueUrlSync {
    queue: SharedQueue,
    provider: Arc<dyn VideoProvider>,
    notifier: Arc<dyn Notifier>,
    notification_duration: Duration,
    /// Current value of the parameter
    param: Mutex<String>,
}

impl QueueUrlSync {
    pub fn new(
        queue: SharedQueue,
        provider: Arc<dyn VideoProvider>,
        notifier: Arc<dyn Notifier>,
        notification_duration: Duration,
    ) -> Arc<Self> {
        Arc::new(Self {
            queue,
            provider,
            notifier,
            notification_duration,
            param: Mutex::new(String::new()),
        })
    }

    /// Keep the parameter up to date with the queue until `cancel` fires
    pub fn spawn_writer(self: &Arc<Self>, cancel: CancellationToken) {
        let mut changes = self.queue.subscribe();
        let sync = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    change = changes.recv() => {
                        if change.is_none() {
                            break;
                        }
                        sync.on_queue_changed().await;
                    }
                }
            }
        });
    }

    pub fn param(&self) -> String {
        self.lock().clone()
    }

    /// Rewrite the parameter from the queue; returns true if it changed
    pub async fn on_queue_changed(&self) -> bool {
        let serialized = self.queue.serialize().await;
        let mut param = self.lock();
        if *param == serialized {
            return false;
        }
        debug!("Queue URL parameter updated to {:?}", serialized);
        *param = serialized;
        true
    }

    /// Handle navigation to a new parameter value; returns true if the queue was reloaded
    ///
    /// On failure the user is notified and both the queue and the parameter
    /// keep their previous value.
    pub async fn on_navigation(&self, value: &str) -> Result<bool> {
        if *self.lock() == value {
            return Ok(false);
        }

        match self.queue.load_serialized(value, self.provider.as_ref()).await {
            Ok(()) => {
                *self.lock() = value.to_string();
                Ok(true)
            }
            Err(e) => {
                warn!("Could not load queue from URL: {}", e);
                self.notifier.error(
                    "The queue could not be loaded from this link",
                    self.notification_duration,
                );
                Err(e)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, String> {
        self.param.lock().unwrap_or_else(|e| e.into_inner())
    }
}
