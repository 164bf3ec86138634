use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::entities::order::OrderStatus;

/// Domain events emitted by the services. Consumed by a logging task today;
/// the channel is the seam where fulfilment notifications would attach.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    CheckoutCompleted {
        order_id: i64,
        checkout_session_id: String,
    },
    OrderCreated(i64),
    OrderStatusChanged {
        order_id: i64,
        old_status: OrderStatus,
        new_status: OrderStatus,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Publishing is best-effort: a closed or full channel must never fail
    /// the request that produced the event.
    pub async fn send(&self, event: Event) {
        if let Err(err) = self.sender.send(event).await {
            warn!("event channel closed, dropping event: {}", err);
        }
    }
}

/// Drains the event channel for the lifetime of the process.
pub async fn process_events(mut receiver: mpsc::Receiver<Event>) {
    while let Some(event) = receiver.recv().await {
        info!(?event, "domain event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        sender.send(Event::OrderCreated(42)).await;

        match rx.recv().await {
            Some(Event::OrderCreated(id)) => assert_eq!(id, 42),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn send_survives_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);
        // Must not panic or error out.
        sender.send(Event::OrderCreated(1)).await;
    }
}
