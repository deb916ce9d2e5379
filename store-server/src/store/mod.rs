//! redb-based order store
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` (JSON) | Order snapshots |
//! | `order_number_index` | `order_number` | `order_id` | Unique number index, daily sequence scan |
//! | `transaction_index` | `transaction_id` | `order_id` | Store-wide transaction uniqueness |
//! | `counters` | `name` | `u64` | Surrogate id counter |
//!
//! # Concurrency
//!
//! redb is single-writer: every mutation runs inside one write transaction,
//! which serializes order-number assignment and state transitions. Two
//! simultaneous checkouts can never read the same "last number for today".
//!
//! # Durability
//!
//! redb commits with `Durability::Immediate`; the database file is always
//! in a consistent state across power loss.

pub mod catalog;

pub use catalog::{Campaign, CatalogError, CatalogService, Product};

use redb::{
    Database, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use rust_decimal::Decimal;
use shared::order::types::{
    DeliveryStatus, Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress,
};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

use crate::orders::number::{self, NumberError};

/// Table for order snapshots: key = order id, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("orders");

/// Unique order-number index: key = order number, value = order id
///
/// Keys sort lexicographically, so the daily sequence scan is a bounded
/// range query over today's `YYYYMMDD` prefix.
const ORDER_NUMBER_TABLE: TableDefinition<&str, u64> =
    TableDefinition::new("order_number_index");

/// Unique transaction index: key = transaction id, value = order id
const TXN_INDEX_TABLE: TableDefinition<&str, u64> = TableDefinition::new("transaction_index");

/// Counters table: key = counter name, value = u64
const COUNTERS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("counters");

const ORDER_ID_KEY: &str = "order_id";

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Order not found: {0}")]
    OrderNotFound(u64),

    #[error("Duplicate order number: {0}")]
    DuplicateOrderNumber(String),

    #[error("Duplicate transaction id: {0}")]
    DuplicateTransaction(String),

    #[error("Daily order number sequence exhausted for {0}")]
    DailySequenceExhausted(String),

    #[error("Corrupt order number index entry: {0}")]
    CorruptIndex(String),
}

impl From<NumberError> for StoreError {
    fn from(err: NumberError) -> Self {
        match err {
            NumberError::SequenceExhausted(prefix) => StoreError::DailySequenceExhausted(prefix),
            NumberError::Malformed(raw) => StoreError::CorruptIndex(raw),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Order creation payload
///
/// The store assigns what the caller must not: surrogate id, order number
/// and (for gateway orders) the payment timeout.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: u64,
    pub payment_method: PaymentMethod,
    /// Initial status — `Completed` for cash-on-delivery, `Pending` otherwise
    pub status: OrderStatus,
    pub address: ShippingAddress,
    pub items: Vec<OrderItem>,
    pub total: Decimal,
    pub shipping_charge: Decimal,
}

/// Order store backed by redb
#[derive(Clone)]
pub struct OrderStore {
    db: Arc<Database>,
    payment_timeout_ms: i64,
}

impl OrderStore {
    /// Open or create the database at the given path
    pub fn open(path: impl AsRef<Path>, payment_timeout_ms: i64) -> StoreResult<Self> {
        let db = Database::create(path)?;
        Self::init(db, payment_timeout_ms)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory(payment_timeout_ms: i64) -> StoreResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db, payment_timeout_ms)
    }

    fn init(db: Database, payment_timeout_ms: i64) -> StoreResult<Self> {
        // Create all tables if they don't exist
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(ORDER_NUMBER_TABLE)?;
            let _ = write_txn.open_table(TXN_INDEX_TABLE)?;
            let _ = write_txn.open_table(COUNTERS_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self {
            db: Arc::new(db),
            payment_timeout_ms,
        })
    }

    // ========== Creation ==========

    /// Persist a new order, assigning id, order number and payment timeout
    ///
    /// Runs in a single write transaction: the daily-sequence scan, the
    /// unique-index insert and the snapshot insert are atomic, so a
    /// concurrent checkout observes either all of it or none of it.
    pub fn create_order(
        &self,
        new: NewOrder,
        now: i64,
        date_prefix: &str,
    ) -> StoreResult<Order> {
        let txn = self.db.begin_write()?;
        let order = {
            let mut counters = txn.open_table(COUNTERS_TABLE)?;
            let id = counters
                .get(ORDER_ID_KEY)?
                .map(|guard| guard.value())
                .unwrap_or(0)
                + 1;
            counters.insert(ORDER_ID_KEY, id)?;
            drop(counters);

            let mut numbers = txn.open_table(ORDER_NUMBER_TABLE)?;
            let last = Self::last_number_with_prefix(&numbers, date_prefix)?;
            let order_number = number::next_order_number(last.as_deref(), date_prefix)?;
            if numbers.get(order_number.as_str())?.is_some() {
                return Err(StoreError::DuplicateOrderNumber(order_number));
            }
            numbers.insert(order_number.as_str(), id)?;
            drop(numbers);

            let payment_timeout = match new.payment_method {
                PaymentMethod::Gateway => Some(now + self.payment_timeout_ms),
                PaymentMethod::CashOnDelivery => None,
            };

            let order = Order {
                id,
                user_id: new.user_id,
                order_number,
                total: new.total,
                shipping_charge: new.shipping_charge,
                status: new.status,
                delivery_status: DeliveryStatus::Pending,
                payment_method: new.payment_method,
                address: new.address,
                items: new.items,
                transaction_id: None,
                payment_timeout,
                created_at: now,
                updated_at: now,
            };

            let mut orders = txn.open_table(ORDERS_TABLE)?;
            orders.insert(id, serde_json::to_vec(&order)?.as_slice())?;
            order
        };
        txn.commit()?;
        Ok(order)
    }

    /// Greatest existing order number sharing the date prefix, if any
    fn last_number_with_prefix(
        table: &impl ReadableTable<&'static str, u64>,
        prefix: &str,
    ) -> StoreResult<Option<String>> {
        // '~' (0x7E) sorts after every digit, bounding the prefix range
        let upper = format!("{prefix}~");
        let mut range = table.range(prefix..upper.as_str())?;
        Ok(range
            .next_back()
            .transpose()?
            .map(|(key, _)| key.value().to_string()))
    }

    // ========== Reads ==========

    /// Get an order by surrogate id
    pub fn get(&self, id: u64) -> StoreResult<Option<Order>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ORDERS_TABLE)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Get an order by its human-facing number
    pub fn get_by_number(&self, order_number: &str) -> StoreResult<Option<Order>> {
        let txn = self.db.begin_read()?;
        let index = txn.open_table(ORDER_NUMBER_TABLE)?;
        let Some(id_guard) = index.get(order_number)? else {
            return Ok(None);
        };
        let id = id_guard.value();
        drop(id_guard);
        let table = txn.open_table(ORDERS_TABLE)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Get an order by gateway transaction id
    pub fn get_by_transaction(&self, transaction_id: &str) -> StoreResult<Option<Order>> {
        let txn = self.db.begin_read()?;
        let index = txn.open_table(TXN_INDEX_TABLE)?;
        let Some(id_guard) = index.get(transaction_id)? else {
            return Ok(None);
        };
        let id = id_guard.value();
        drop(id_guard);
        let table = txn.open_table(ORDERS_TABLE)?;
        match table.get(id)? {
            Some(guard) => Ok(Some(serde_json::from_slice(guard.value())?)),
            None => Ok(None),
        }
    }

    /// Collect all orders matching a predicate
    ///
    /// Full scan; both the per-user listing and the expiry sweep run
    /// through here so they share one access path.
    pub fn scan<F>(&self, mut pred: F) -> StoreResult<Vec<Order>>
    where
        F: FnMut(&Order) -> bool,
    {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(ORDERS_TABLE)?;
        let mut matches = Vec::new();
        for entry in table.iter()? {
            let (_, value) = entry?;
            let order: Order = serde_json::from_slice(value.value())?;
            if pred(&order) {
                matches.push(order);
            }
        }
        Ok(matches)
    }

    // ========== Mutation ==========

    /// Apply a closure to an order inside one write transaction
    ///
    /// `updated_at` is refreshed only when the closure actually changed the
    /// order, so idempotent replays leave the record byte-identical. The
    /// transaction index is maintained here; assigning a transaction id
    /// already held by another order fails the whole transaction.
    pub fn update_with<F>(&self, id: u64, now: i64, f: F) -> StoreResult<Order>
    where
        F: FnOnce(&mut Order),
    {
        let txn = self.db.begin_write()?;
        let updated = {
            let mut orders = txn.open_table(ORDERS_TABLE)?;
            let previous: Order = {
                let guard = orders.get(id)?.ok_or(StoreError::OrderNotFound(id))?;
                serde_json::from_slice(guard.value())?
            };

            let mut order = previous.clone();
            f(&mut order);

            if order == previous {
                return Ok(previous);
            }
            order.updated_at = now;

            if order.transaction_id != previous.transaction_id {
                Self::reindex_transaction(&txn, id, &previous, &order)?;
            }

            orders.insert(id, serde_json::to_vec(&order)?.as_slice())?;
            order
        };
        txn.commit()?;
        Ok(updated)
    }

    fn reindex_transaction(
        txn: &WriteTransaction,
        id: u64,
        previous: &Order,
        order: &Order,
    ) -> StoreResult<()> {
        let mut index = txn.open_table(TXN_INDEX_TABLE)?;
        if let Some(old) = &previous.transaction_id {
            index.remove(old.as_str())?;
        }
        if let Some(new) = &order.transaction_id {
            let taken = index
                .get(new.as_str())?
                .map(|guard| guard.value() != id)
                .unwrap_or(false);
            if taken {
                return Err(StoreError::DuplicateTransaction(new.clone()));
            }
            index.insert(new.as_str(), id)?;
        }
        Ok(())
    }
}
