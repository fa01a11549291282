//! User notifications
//!
//! Fire-and-forget info/warning/error messages. The host turns them into
//! `Notification` events for whatever UI listens on the event stream.

use mxt_common::events::{EventBus, MxtEvent, NotificationLevel};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub trait Notifier: Send + Sync {
    fn info(&self, message: &str, duration: Duration);
    fn warning(&self, message: &str, duration: Duration);
    fn error(&self, message: &str, duration: Duration);
}

/// Publishes notifications on the event bus
pub struct EventNotifier {
    event_bus: Arc<EventBus>,
}

impl EventNotifier {
    pub fn new(event_bus: Arc<EventBus>) -> Self {
        Self { event_bus }
    }

    fn publish(&self, level: NotificationLevel, message: &str, duration: Duration) {
        self.event_bus.emit_lossy(MxtEvent::Notification {
            level,
            message: message.to_string(),
            duration_ms: duration.as_millis() as u64,
            timestamp: chrono::Utc::now(),
        });
    }
}

impl Notifier for EventNotifier {
    fn info(&self, message: &str, duration: Duration) {
        info!("Notification: {}", message);
        self.publish(NotificationLevel::Info, message, duration);
    }

    fn warning(&self, message: &str, duration: Duration) {
        warn!("Notification: {}", message);
        self.publish(NotificationLevel::Warning, message, duration);
    }

    fn error(&self, message: &str, duration: Duration) {
        error!("Notification: {}", message);
        self.publish(NotificationLevel::Error, message, duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_notifications_reach_the_bus() {
        let bus = Arc::new(EventBus::new(8));
        let mut rx = bus.subscribe();
        let notifier = EventNotifier::new(Arc::clone(&bus));

        notifier.warning("careful", Duration::from_secs(5));

        match rx.recv().await.unwrap() {
            MxtEvent::Notification {
                level,
                message,
                duration_ms,
                ..
            } => {
                assert_eq!(level, NotificationLevel::Warning);
                assert_eq!(message, "careful");
                assert_eq!(duration_ms, 5000);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }
}
