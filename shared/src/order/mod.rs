//! Order domain types
//!
//! - **types**: order entity, line items, address snapshot, status enums
//! - **event**: outbound lifecycle events (order created, stock changes)
//! - **txn_ref**: structured gateway transaction reference

pub mod event;
pub mod txn_ref;
pub mod types;

pub use event::StoreEvent;
pub use txn_ref::{TxnRef, TxnRefParseError};
pub use types::{DeliveryStatus, Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress};
