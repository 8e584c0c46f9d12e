use async_trait::async_trait;
use tokio::sync::broadcast;

use consult_core::events::DomainEvent;
use consult_ports::error::PortError;
use consult_ports::outbound::EventPublisher;

/// In-process fan-out of committed events. Subscribers that fall behind by
/// more than `capacity` events miss the oldest ones; the audit trail in the
/// store stays complete.
#[derive(Clone)]
pub struct BroadcastPublisher {
    sender: broadcast::Sender<DomainEvent>,
}

impl BroadcastPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventPublisher for BroadcastPublisher {
    async fn publish(&self, events: Vec<DomainEvent>) -> Result<(), PortError> {
        for event in events {
            let event_type = event.event_type();
            if self.sender.send(event).is_err() {
                tracing::debug!(event_type, "no subscribers for event");
            }
        }
        Ok(())
    }
}
