use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

/// Domain events emitted by the services after a successful write
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    OrderCreated {
        order_id: Uuid,
        order_number: String,
    },
    OrderStatusChanged {
        order_id: Uuid,
        old_status: String,
        new_status: String,
    },
    StockMovementRecorded {
        movement_id: Uuid,
        product_id: Uuid,
        movement_type: String,
        previous_stock: i32,
        new_stock: i32,
        order_id: Option<Uuid>,
    },
    StockAlertRaised {
        alert_id: Uuid,
        product_id: Uuid,
        stock: i32,
        min_stock: i32,
    },
    StockAlertResolved {
        alert_id: Uuid,
        product_id: Uuid,
    },
    ProductsImported {
        count: usize,
    },
}

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

    /// Sends an event, logging instead of failing when the channel is closed.
    ///
    /// Events are notifications about writes that already committed, so a closed
    /// channel must not turn a successful operation into an error.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(e) = self.send(event).await {
            warn!("{}", e);
        }
    }
}

/// Drains the event channel, logging each event
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match &event {
            Event::OrderCreated {
                order_id,
                order_number,
            } => info!(%order_id, %order_number, "order created"),
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            } => info!(%order_id, %old_status, %new_status, "order status changed"),
            Event::StockMovementRecorded {
                product_id,
                movement_type,
                previous_stock,
                new_stock,
                ..
            } => info!(
                %product_id,
                %movement_type,
                previous_stock,
                new_stock,
                "stock movement recorded"
            ),
            Event::StockAlertRaised {
                product_id,
                stock,
                min_stock,
                ..
            } => warn!(%product_id, stock, min_stock, "stock alert raised"),
            Event::StockAlertResolved { product_id, .. } => {
                info!(%product_id, "stock alert resolved")
            }
            Event::ProductsImported { count } => info!(count, "products imported"),
        }
    }

    info!("Event channel closed; event processing loop stopped");
}
