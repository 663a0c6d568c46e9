use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Sending half of the in-process event channel, cloned into every service.
#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event, logging a warning instead of failing the caller when
    /// the channel is closed or full. Event delivery is best-effort.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("Event delivery failed: {}", e);
        }
    }
}

// Define the various events that can occur in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    // Order events
    OrderCreated(Uuid),
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    OrderDelivered(Uuid),
    OrderPartiallyDelivered {
        order_id: Uuid,
        outstanding_lines: u64,
    },
    OrderDeleted(Uuid),

    // Catalog events
    MaterialCreated(Uuid),
    MaterialUpdated(Uuid),
    MaterialDeleted(Uuid),

    // Serialized inventory events
    SerialRegistered {
        serial_id: Uuid,
        material_id: Uuid,
    },
    SerialStatusChanged {
        serial_id: Uuid,
        old_status: String,
        new_status: String,
    },
}

/// Consumes events from the channel and logs them. Kept as a dedicated task
/// so future consumers (webhooks, notifications) can hook in without
/// touching the services that emit.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated(order_id) => {
                info!(order_id = %order_id, "Order created");
            }
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => {
                info!(
                    order_id = %order_id,
                    old_status = %old_status,
                    new_status = %new_status,
                    "Order status changed"
                );
            }
            Event::OrderDelivered(order_id) => {
                info!(order_id = %order_id, "Order fully delivered");
            }
            Event::OrderPartiallyDelivered {
                order_id,
                outstanding_lines,
            } => {
                info!(
                    order_id = %order_id,
                    outstanding_lines = outstanding_lines,
                    "Partial delivery recorded"
                );
            }
            Event::OrderDeleted(order_id) => {
                info!(order_id = %order_id, "Order deleted");
            }
            Event::MaterialCreated(material_id) => {
                info!(material_id = %material_id, "Material created");
            }
            Event::MaterialUpdated(material_id) => {
                info!(material_id = %material_id, "Material updated");
            }
            Event::MaterialDeleted(material_id) => {
                info!(material_id = %material_id, "Material deleted");
            }
            Event::SerialRegistered {
                serial_id,
                material_id,
            } => {
                info!(serial_id = %serial_id, material_id = %material_id, "Serial registered");
            }
            Event::SerialStatusChanged {
                serial_id,
                old_status,
                new_status,
            } => {
                info!(
                    serial_id = %serial_id,
                    old_status = %old_status,
                    new_status = %new_status,
                    "Serial status changed"
                );
            }
        }
    }

    info!("Event processing loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);

        let order_id = Uuid::new_v4();
        sender.send(Event::OrderCreated(order_id)).await.unwrap();

        match rx.recv().await {
            Some(Event::OrderCreated(id)) => assert_eq!(id, order_id),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_or_log_swallows_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        // Must not panic or error out
        sender.send_or_log(Event::OrderDeleted(Uuid::new_v4())).await;
    }
}
