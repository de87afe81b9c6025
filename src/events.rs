//! Lightweight in-process domain events.
//!
//! Services publish events over a tokio mpsc channel after their database
//! work commits; a background task consumes and logs them. Delivery is
//! best-effort: a full or closed channel is logged and dropped, never
//! surfaced to the caller.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    CartUpdated {
        cart_id: Uuid,
        user_id: Uuid,
        total_cents: i64,
    },
    CartCleared {
        cart_id: Uuid,
        user_id: Uuid,
    },
    OrderCreated {
        order_id: Uuid,
        user_id: Uuid,
        external_order_id: String,
        total_cents: i64,
    },
    OrderPaid {
        order_id: Uuid,
        external_order_id: String,
    },
    StockDecremented {
        product_id: Uuid,
        quantity: i32,
    },
    ProductCreated {
        product_id: Uuid,
        seller_id: Uuid,
    },
    ProductUpdated {
        product_id: Uuid,
    },
}

#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(tx: mpsc::Sender<Event>) -> Self {
        Self { tx }
    }

    /// Publish an event without blocking the caller. Failures are logged
    /// because event delivery must never fail a request that has already
    /// committed.
    pub fn send_or_log(&self, event: Event) {
        if let Err(e) = self.tx.try_send(event) {
            warn!(error = %e, "failed to publish domain event");
        }
    }
}

/// Consume events from the channel until all senders are dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(json) => info!(event = %json, "domain event"),
            Err(e) => error!(error = %e, "failed to serialize domain event"),
        }
    }
    info!("event channel closed, event processor shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_or_log_delivers_event() {
        let (tx, mut rx) = mpsc::channel(8);
        let sender = EventSender::new(tx);
        sender.send_or_log(Event::OrderPaid {
            order_id: Uuid::new_v4(),
            external_order_id: "order_abc".to_string(),
        });
        let event = rx.recv().await.unwrap();
        assert!(matches!(event, Event::OrderPaid { .. }));
    }

    #[test]
    fn send_or_log_does_not_panic_when_channel_full() {
        let (tx, _rx) = mpsc::channel(1);
        let sender = EventSender::new(tx);
        let cart_id = Uuid::new_v4();
        let user_id = Uuid::new_v4();
        for _ in 0..3 {
            sender.send_or_log(Event::CartCleared { cart_id, user_id });
        }
    }
}
