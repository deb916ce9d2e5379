//! Notification sink
//!
//! Consumes [`StoreEvent`]s from the broadcast bus and records
//! notifications for the back office to display. The order engine and the
//! catalog publish events; neither ever references this module.

use parking_lot::RwLock;
use serde::Serialize;
use shared::order::event::StoreEvent;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::utils::time::now_millis;

/// A recorded notification
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notification {
    pub id: u64,
    pub title: String,
    pub message: String,
    pub created_at: i64,
    pub read: bool,
}

/// In-memory notification log
#[derive(Default)]
pub struct NotificationService {
    entries: Arc<RwLock<Vec<Notification>>>,
    next_id: AtomicU64,
}

impl NotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, title: String, message: String, now: i64) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.entries.write().push(Notification {
            id,
            title,
            message,
            created_at: now,
            read: false,
        });
    }

    /// Translate a lifecycle event into a notification entry
    pub fn apply_event(&self, event: &StoreEvent, now: i64) {
        match event {
            StoreEvent::OrderCreated {
                order_number,
                customer,
                total,
                ..
            } => self.record(
                format!("New Order from {customer}"),
                format!("Order #{order_number} for ৳{total} has been placed."),
                now,
            ),
            StoreEvent::LowStock { name, stock, .. } => self.record(
                format!("Low Stock Alert: {name}"),
                format!("Only {stock} units left in stock! Please restock soon."),
                now,
            ),
            StoreEvent::StockDepleted { name, .. } => self.record(
                format!("Out of Stock: {name}"),
                format!("{name} is out of stock."),
                now,
            ),
            StoreEvent::StockReplenished { name, stock, .. } => self.record(
                format!("Back in Stock: {name}"),
                format!("{name} is back in stock ({stock} units)."),
                now,
            ),
        }
    }

    /// Notifications, newest first
    pub fn list(&self) -> Vec<Notification> {
        let mut entries = self.entries.read().clone();
        entries.reverse();
        entries
    }

    pub fn unread_count(&self) -> usize {
        self.entries.read().iter().filter(|n| !n.read).count()
    }

    pub fn mark_all_read(&self) {
        for entry in self.entries.write().iter_mut() {
            entry.read = true;
        }
    }

    /// Consume the event bus until cancelled
    pub async fn run(
        &self,
        mut events: broadcast::Receiver<StoreEvent>,
        cancel: CancellationToken,
    ) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = events.recv() => match received {
                    Ok(event) => self.apply_event(&event, now_millis()),
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "Notification listener lagged behind event bus");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    }
}
