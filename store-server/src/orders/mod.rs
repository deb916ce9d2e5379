//! Order Lifecycle Engine
//!
//! This module owns the order/payment state machine:
//!
//! - **manager**: checkout orchestration, gateway initiation, callback
//!   reconciliation, manual cancellation, tracking, expiry sweep
//! - **number**: human-facing order number generation (daily sequence)
//! - **expiry**: pure payment-window predicate + transition
//! - **shipping**: literal shipping rate table
//! - **money**: decimal rounding helpers
//!
//! # State Machine
//!
//! ```text
//! Pending ──success/ipn──► Completed   (terminal)
//!    │ ╲──fail──► Failed ──success/ipn──► Completed
//!    │              │
//!    └──cancel──────┴──expiry──► Cancelled (terminal)
//! ```
//!
//! Expiry is lazy: every read path applies the same predicate/transition
//! pair as the periodic sweep, so the two can never disagree.

pub mod expiry;
pub mod manager;
pub mod money;
pub mod number;
pub mod shipping;

pub use manager::{CallbackOutcome, CheckoutOutcome, ManagerError, ManagerResult, OrdersManager};
