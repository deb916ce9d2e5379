//! Order Model
//!
//! The order entity is a self-contained snapshot: address fields and line
//! prices are captured at checkout time and never re-derived from the
//! catalog or a user profile afterward.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order payment/lifecycle status
///
/// `Completed` and `Cancelled` are terminal. `Failed` is recoverable —
/// the customer may retry payment until the payment timeout expires.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl OrderStatus {
    /// Terminal states admit no further transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

/// Delivery progress — an independent axis, not gated by [`OrderStatus`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryStatus {
    #[default]
    Pending,
    Processing,
    Shipped,
    OutForDelivery,
    Delivered,
    /// Set only by expiry or cancellation transitions
    Cancelled,
}

/// Payment method chosen at checkout
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// Hosted online payment gateway
    #[default]
    Gateway,
    /// Cash on delivery — completes immediately, no timeout
    CashOnDelivery,
}

/// Shipping address snapshot captured at checkout
///
/// Blank fields stay blank here; fallback defaults are applied only when
/// building a gateway session request.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub email: String,
    pub address_line_1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_line_2: Option<String>,
    /// District
    pub city: String,
    /// Division
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

/// Order line item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderItem {
    pub product_id: u64,
    /// Product name snapshot
    pub name: String,
    pub quantity: i32,
    /// Unit price snapshot from the cart, not the catalog
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn line_total(&self) -> Decimal {
        (self.unit_price * Decimal::from(self.quantity)).round_dp(2)
    }
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    /// Surrogate id (store-assigned counter)
    pub id: u64,
    /// Owner
    pub user_id: u64,
    /// Human-facing number: `YYYYMMDD` + 2-digit daily sequence.
    /// Assigned exactly once at first persistence, immutable afterward.
    pub order_number: String,
    /// Grand total, 2 decimal places; invariant `total >= shipping_charge`
    pub total: Decimal,
    pub shipping_charge: Decimal,
    pub status: OrderStatus,
    pub delivery_status: DeliveryStatus,
    pub payment_method: PaymentMethod,
    pub address: ShippingAddress,
    pub items: Vec<OrderItem>,
    /// Unique store-wide; session key at initiation, adapter-confirmed
    /// reference once a callback validates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Unix millis; set iff `payment_method = Gateway`, never overwritten
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_timeout: Option<i64>,
    /// Unix millis, immutable
    pub created_at: i64,
    /// Unix millis, refreshed on every mutation
    pub updated_at: i64,
}

impl Order {
    /// Subtotal before shipping
    pub fn subtotal(&self) -> Decimal {
        self.total - self.shipping_charge
    }

    pub fn total_items(&self) -> usize {
        self.items.len()
    }

    /// Whole minutes left in the payment window, if one is still open
    pub fn payment_minutes_remaining(&self, now: i64) -> Option<i64> {
        match self.payment_timeout {
            Some(timeout) if timeout > now => Some((timeout - now) / 60_000),
            _ => None,
        }
    }
}
