//! Shared domain types for the storefront stack
//!
//! # 模块结构
//!
//! - **订单模型** (`order::types`): 订单、订单行、地址快照、状态枚举
//! - **生命周期事件** (`order::event`): 订单/库存变更的出站事件
//! - **交易引用** (`order::txn_ref`): 网关交易引用的结构化编解码
//!
//! All money amounts are [`rust_decimal::Decimal`] at 2 decimal places.
//! All timestamps are `i64` Unix millis; date formatting happens in the
//! server's business timezone, never here.

pub mod order;

// Re-export common types
pub use order::event::StoreEvent;
pub use order::txn_ref::{TxnRef, TxnRefParseError};
pub use order::types::{
    DeliveryStatus, Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress,
};
