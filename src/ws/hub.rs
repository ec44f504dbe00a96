use tokio::sync::broadcast;

use super::events::{Event, envelope};

/// Fan-out of serialized events to every open socket
#[derive(Clone)]
pub struct EventHub {
    tx: broadcast::Sender<String>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Fire-and-forget; a no-op when nobody is connected
    pub fn publish(&self, event: Event) {
        if self.tx.receiver_count() == 0 {
            return;
        }

        match envelope(&event) {
            Ok(json) => {
                let delivered = self.tx.send(json).unwrap_or(0);
                tracing::debug!(event = event.name(), delivered, "Published event");
            }
            Err(e) => tracing::warn!(error = %e, event = event.name(), "Failed to serialize event"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{Duration, timeout};

    #[actix_web::test]
    async fn broadcasts_to_all_subscribers() {
        let hub = EventHub::default();
        let mut a = hub.subscribe();
        let mut b = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        hub.publish(Event::HolidayUpdated { year: 2026 });

        for rx in [&mut a, &mut b] {
            let msg = timeout(Duration::from_millis(50), rx.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(msg.contains("\"holidayUpdated\""));
        }
    }

    #[actix_web::test]
    async fn publish_without_subscribers_is_silent() {
        let hub = EventHub::new(4);
        hub.publish(Event::AnnouncementDeleted { id: 3 });
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[actix_web::test]
    async fn dropped_subscriber_is_not_counted() {
        let hub = EventHub::new(4);
        {
            let _rx = hub.subscribe();
            assert_eq!(hub.subscriber_count(), 1);
        }
        assert_eq!(hub.subscriber_count(), 0);
    }
}
