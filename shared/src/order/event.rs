//! Outbound lifecycle events
//!
//! Emitted from the order/stock mutation boundary and consumed by the
//! notification service. The state machine never talks to a notification
//! medium directly; it only publishes these.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Store lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreEvent {
    /// A new order was persisted
    OrderCreated {
        order_id: u64,
        order_number: String,
        /// Customer display name snapshot
        customer: String,
        total: Decimal,
    },
    /// Stock dropped below the configured warning threshold
    LowStock {
        product_id: u64,
        name: String,
        stock: i64,
    },
    /// Stock reached zero
    StockDepleted { product_id: u64, name: String },
    /// Stock came back after being depleted
    StockReplenished {
        product_id: u64,
        name: String,
        stock: i64,
    },
}
