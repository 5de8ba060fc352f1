use tokio::sync::broadcast;
use tracing::debug;

use conductor_core::events::{EventBus, SystemEvent};

/// Broadcast-channel event bus. Publishing never blocks; subscribers that
/// fall behind drop the oldest events, which is acceptable because every
/// consumer must already tolerate at-least-once delivery and reconcile from
/// the store.
pub struct InMemoryEventBus {
    sender: broadcast::Sender<SystemEvent>,
}

impl InMemoryEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}

impl EventBus for InMemoryEventBus {
    fn publish(&self, event: SystemEvent) {
        debug!(?event, "publishing system event");
        // send only fails when there are no subscribers, which is fine.
        let _ = self.sender.send(event);
    }

    fn subscribe(&self) -> broadcast::Receiver<SystemEvent> {
        self.sender.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_core::models::TenantStatus;

    #[tokio::test]
    async fn test_publish_reaches_subscriber() {
        let bus = InMemoryEventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(SystemEvent::TenantLifecycle {
            slug: "acme".to_string(),
            status: TenantStatus::Active,
        });

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            SystemEvent::TenantLifecycle {
                slug: "acme".to_string(),
                status: TenantStatus::Active,
            }
        );
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_fine() {
        let bus = InMemoryEventBus::new(16);
        bus.publish(SystemEvent::JobCompleted {
            name: "noop".to_string(),
            duration_ms: 1,
        });
    }
}
