//! OrdersManager — order lifecycle orchestration
//!
//! # Checkout Flow
//!
//! ```text
//! checkout(user, address, method)
//!     ├─ 1. Repair cart against catalog (drop vanished products)
//!     ├─ 2. Price: subtotal from cart snapshots + shipping table
//!     ├─ 3. Persist order (store assigns number + timeout, one txn)
//!     ├─ 4. Decrement stock, exactly once per line
//!     ├─ 5. Commit-and-clear cart, emit OrderCreated
//!     └─ 6. Branch: cash → Completed now, gateway → await payment
//! ```
//!
//! # Reconciliation
//!
//! Four callback entry points (success, fail, cancel, IPN) keyed by the
//! transaction reference. All of them fail closed: an unparseable or
//! unknown reference is answered generically, never with an error. All
//! transitions are conditional updates inside a single store transaction,
//! so concurrent callbacks for the same order converge without
//! double-firing side effects.

use chrono_tz::Tz;
use serde::Serialize;
use shared::order::event::StoreEvent;
use shared::order::txn_ref::TxnRef;
use shared::order::types::{
    DeliveryStatus, Order, OrderItem, OrderStatus, PaymentMethod, ShippingAddress,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::cart::CartService;
use crate::gateway::{
    CustomerInfo, GatewayError, IPN_VALID_STATUS, PaymentGateway, SessionRequest,
};
use crate::orders::expiry::{apply_expiry, is_expired};
use crate::orders::{money, shipping};
use crate::store::{CatalogService, NewOrder, OrderStore, StoreError};
use crate::utils::time::business_date_str;

/// Attempts at order creation when the unique number index reports a
/// conflict
const ORDER_CREATE_RETRIES: u32 = 3;

/// Manager errors
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Order not found: {0}")]
    OrderNotFound(u64),

    #[error("Order {0} has been cancelled")]
    OrderCancelled(String),

    #[error("Order {0} is already completed")]
    OrderAlreadyCompleted(String),

    #[error("Order {0} cannot be cancelled")]
    CannotCancel(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
}

pub type ManagerResult<T> = Result<T, ManagerError>;

/// Checkout input: validated address snapshot + chosen payment method
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub address: ShippingAddress,
    pub payment_method: PaymentMethod,
}

/// Where the actor goes after checkout
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NextStep {
    /// Cash-on-delivery confirmation view
    Confirmed,
    /// Gateway payment initiation
    Payment,
}

/// Checkout result
#[derive(Debug, Clone, Serialize)]
pub struct CheckoutOutcome {
    pub order: Order,
    /// Products dropped by cart repair before pricing
    pub dropped_products: Vec<u64>,
    pub next: NextStep,
}

/// Order plus pay-now presentation info for list/tracking views
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub show_pay_now: bool,
    pub minutes_remaining: i64,
}

/// Reconciliation outcome for a gateway callback
///
/// Callbacks never surface errors to the caller; anything the engine
/// cannot act on is [`CallbackOutcome::Ignored`] and answered generically.
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    /// Order is (now) completed; idempotent replays land here too
    Completed(Order),
    /// Fail callback recorded a retryable failure
    Failed(Order),
    /// The payment window had already lapsed; order is cancelled
    Expired(Order),
    /// Cancel recorded, or the order was already cancelled
    Cancelled(Order),
    /// Unknown/unparseable reference or stale state
    Ignored,
}

/// Order lifecycle engine
pub struct OrdersManager {
    store: OrderStore,
    catalog: Arc<CatalogService>,
    carts: Arc<CartService>,
    gateway: Arc<dyn PaymentGateway>,
    events: broadcast::Sender<StoreEvent>,
    /// 业务时区 — 订单号日期前缀按此时区取日历日
    tz: Tz,
    currency: String,
    callback_base_url: String,
}

impl OrdersManager {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: OrderStore,
        catalog: Arc<CatalogService>,
        carts: Arc<CartService>,
        gateway: Arc<dyn PaymentGateway>,
        events: broadcast::Sender<StoreEvent>,
        tz: Tz,
        currency: impl Into<String>,
        callback_base_url: impl Into<String>,
    ) -> Self {
        Self {
            store,
            catalog,
            carts,
            gateway,
            events,
            tz,
            currency: currency.into(),
            callback_base_url: callback_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn carts(&self) -> &CartService {
        &self.carts
    }

    pub fn catalog(&self) -> &CatalogService {
        &self.catalog
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    // ========== Checkout ==========

    /// Create an order from the user's cart
    pub fn checkout(
        &self,
        user_id: u64,
        request: CheckoutRequest,
        now: i64,
    ) -> ManagerResult<CheckoutOutcome> {
        // 1. Repair first: a vanished product shrinks the cart, never
        //    aborts the checkout
        let (cart, dropped_products) = self.carts.repair(user_id);
        if !dropped_products.is_empty() {
            tracing::warn!(
                user_id,
                dropped = ?dropped_products,
                "Dropped vanished products from cart during checkout"
            );
        }
        if cart.is_empty() {
            return Err(ManagerError::EmptyCart);
        }

        // 2. Price from the cart's captured snapshots, not the catalog
        let shipping_charge = shipping::shipping_charge(&request.address.state, &request.address.city);
        let total = money::round_money(cart.subtotal() + shipping_charge);
        let items: Vec<OrderItem> = cart
            .lines
            .iter()
            .map(|line| OrderItem {
                product_id: line.product_id,
                name: line.name.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();

        let status = match request.payment_method {
            // Cash finalizes immediately; delivery tracking stays Pending
            PaymentMethod::CashOnDelivery => OrderStatus::Completed,
            PaymentMethod::Gateway => OrderStatus::Pending,
        };
        let new_order = NewOrder {
            user_id,
            payment_method: request.payment_method,
            status,
            address: request.address,
            items,
            total,
            shipping_charge,
        };

        // 3. Persist; a number-index conflict is retryable
        let date_prefix = business_date_str(now, self.tz);
        let order = self.create_with_retry(new_order, now, &date_prefix)?;

        // 4. Stock: exactly once per line, never again on any replay path
        for item in &order.items {
            if let Err(e) = self
                .catalog
                .adjust_stock(item.product_id, -i64::from(item.quantity))
            {
                tracing::warn!(
                    order_id = order.id,
                    product_id = item.product_id,
                    error = %e,
                    "Stock adjustment skipped"
                );
            }
        }

        // 5. Commit-and-clear the cart, then announce
        self.carts.take(user_id);
        let customer = if order.address.full_name.trim().is_empty() {
            format!("user {user_id}")
        } else {
            order.address.full_name.clone()
        };
        let _ = self.events.send(StoreEvent::OrderCreated {
            order_id: order.id,
            order_number: order.order_number.clone(),
            customer,
            total: order.total,
        });
        tracing::info!(
            order_number = %order.order_number,
            user_id,
            total = %order.total,
            "Order created"
        );

        let next = match order.payment_method {
            PaymentMethod::CashOnDelivery => NextStep::Confirmed,
            PaymentMethod::Gateway => NextStep::Payment,
        };
        Ok(CheckoutOutcome {
            order,
            dropped_products,
            next,
        })
    }

    fn create_with_retry(
        &self,
        new_order: NewOrder,
        now: i64,
        date_prefix: &str,
    ) -> ManagerResult<Order> {
        let mut attempt = 0;
        loop {
            match self.store.create_order(new_order.clone(), now, date_prefix) {
                Ok(order) => return Ok(order),
                Err(StoreError::DuplicateOrderNumber(number))
                    if attempt + 1 < ORDER_CREATE_RETRIES =>
                {
                    attempt += 1;
                    tracing::warn!(number = %number, attempt, "Order number conflict, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    // ========== Gateway Initiation ==========

    /// Start a hosted payment session for a pending (or failed) order
    ///
    /// The transaction id is persisted only after the adapter confirmed
    /// the session; an adapter failure leaves the order untouched.
    pub async fn initiate_payment(
        &self,
        user_id: u64,
        order_id: u64,
        now: i64,
    ) -> ManagerResult<String> {
        let order = self
            .store
            .get(order_id)?
            .filter(|o| o.user_id == user_id)
            .ok_or(ManagerError::OrderNotFound(order_id))?;

        // Pre-payment guard: lazy expiry runs before anything else
        let order = self.expire_if_needed(order, now)?;
        match order.status {
            OrderStatus::Cancelled => {
                return Err(ManagerError::OrderCancelled(order.order_number));
            }
            OrderStatus::Completed => {
                return Err(ManagerError::OrderAlreadyCompleted(order.order_number));
            }
            OrderStatus::Pending | OrderStatus::Failed => {}
        }

        let tran_ref = TxnRef::new(order.id, order.user_id);
        let request = self.session_request(&order, tran_ref);
        let session = self.gateway.create_session(&request).await?;

        self.store.update_with(order.id, now, |o| {
            o.transaction_id = Some(session.session_key.clone());
        })?;
        tracing::info!(
            order_number = %order.order_number,
            tran_ref = %tran_ref,
            "Gateway session created"
        );
        Ok(session.gateway_url)
    }

    fn session_request(&self, order: &Order, tran_ref: TxnRef) -> SessionRequest {
        // Fallback chain: order snapshot, then literal defaults
        fn or_default(value: &str, default: &str) -> String {
            if value.trim().is_empty() {
                default.to_string()
            } else {
                value.to_string()
            }
        }

        let address = &order.address;
        SessionRequest {
            amount: order.total,
            currency: self.currency.clone(),
            tran_ref: tran_ref.to_string(),
            success_url: format!("{}/api/payment/success", self.callback_base_url),
            fail_url: format!("{}/api/payment/fail", self.callback_base_url),
            cancel_url: format!("{}/api/payment/cancel", self.callback_base_url),
            product_name: format!("Order #{}", order.order_number),
            customer: CustomerInfo {
                name: or_default(&address.full_name, "Customer"),
                email: or_default(&address.email, "customer@example.com"),
                phone: or_default(&address.phone, "01700000000"),
                address: or_default(&address.address_line_1, "Customer Address"),
                city: or_default(&address.city, "Dhaka"),
                country: or_default(&address.country, "Bangladesh"),
            },
        }
    }

    // ========== Callback Reconciliation ==========

    /// Success callback: validate the token server-to-server, then complete
    ///
    /// The redirect alone is never trusted. A validation outcome other
    /// than VALID/VALIDATED leaves the order untouched — it stays payable
    /// until the window expires.
    pub async fn payment_success(&self, val_id: Option<&str>, now: i64) -> CallbackOutcome {
        let Some(val_id) = val_id.map(str::trim).filter(|v| !v.is_empty()) else {
            return CallbackOutcome::Ignored;
        };
        let validation = match self.gateway.validate_transaction(val_id).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "Transaction validation failed");
                return CallbackOutcome::Ignored;
            }
        };
        if !validation.is_valid() {
            tracing::warn!(status = %validation.status, "Validation reported non-valid status");
            return CallbackOutcome::Ignored;
        }
        let Some(tran_id) = validation.tran_id else {
            return CallbackOutcome::Ignored;
        };
        let Some(order) = self.lookup_by_ref(&tran_id) else {
            return CallbackOutcome::Ignored;
        };
        self.complete_order(order, &tran_id, now)
    }

    /// Fail callback: expiry first, then a retryable `Failed`
    pub fn payment_fail(&self, tran_id: Option<&str>, now: i64) -> CallbackOutcome {
        let Some(order) = tran_id.and_then(|t| self.lookup_by_ref(t)) else {
            return CallbackOutcome::Ignored;
        };
        if is_expired(&order, now) {
            return match self.expire_if_needed(order, now) {
                Ok(order) => CallbackOutcome::Expired(order),
                Err(e) => {
                    tracing::error!(error = %e, "Failed to expire order on fail callback");
                    CallbackOutcome::Ignored
                }
            };
        }
        match order.status {
            OrderStatus::Pending => {
                match self.store.update_with(order.id, now, |o| {
                    if o.status == OrderStatus::Pending {
                        o.status = OrderStatus::Failed;
                    }
                }) {
                    Ok(updated) if updated.status == OrderStatus::Failed => {
                        tracing::info!(order_number = %updated.order_number, "Payment failed");
                        CallbackOutcome::Failed(updated)
                    }
                    Ok(_) => CallbackOutcome::Ignored,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to record payment failure");
                        CallbackOutcome::Ignored
                    }
                }
            }
            // Already failed: still render the failure page, still retryable
            OrderStatus::Failed => CallbackOutcome::Failed(order),
            OrderStatus::Completed | OrderStatus::Cancelled => CallbackOutcome::Ignored,
        }
    }

    /// Cancel callback: cancel wins over expiry, but never over completion
    pub fn payment_cancel(&self, tran_id: Option<&str>, now: i64) -> CallbackOutcome {
        let Some(order) = tran_id.and_then(|t| self.lookup_by_ref(t)) else {
            return CallbackOutcome::Ignored;
        };
        match order.status {
            OrderStatus::Pending | OrderStatus::Failed => {
                match self.store.update_with(order.id, now, |o| {
                    if !o.status.is_terminal() {
                        o.status = OrderStatus::Cancelled;
                        o.delivery_status = DeliveryStatus::Cancelled;
                    }
                }) {
                    Ok(updated) if updated.status == OrderStatus::Cancelled => {
                        tracing::info!(order_number = %updated.order_number, "Payment cancelled");
                        CallbackOutcome::Cancelled(updated)
                    }
                    Ok(_) => CallbackOutcome::Ignored,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to record payment cancellation");
                        CallbackOutcome::Ignored
                    }
                }
            }
            // Replay on an already-cancelled order is a quiet no-op
            OrderStatus::Cancelled => CallbackOutcome::Cancelled(order),
            OrderStatus::Completed => CallbackOutcome::Ignored,
        }
    }

    /// IPN: asynchronous server notification, must always be acknowledged
    ///
    /// Gateways retry on non-2xx, so the API layer acks every outcome;
    /// this method only decides whether state moves.
    pub fn payment_ipn(
        &self,
        tran_id: Option<&str>,
        status: Option<&str>,
        now: i64,
    ) -> CallbackOutcome {
        if status != Some(IPN_VALID_STATUS) {
            return CallbackOutcome::Ignored;
        }
        let Some(raw) = tran_id.map(str::trim).filter(|t| !t.is_empty()) else {
            return CallbackOutcome::Ignored;
        };
        let Some(order) = self.lookup_by_ref(raw) else {
            return CallbackOutcome::Ignored;
        };
        self.complete_order(order, raw, now)
    }

    /// Shared completion path for success callback and IPN
    fn complete_order(&self, order: Order, tran_id: &str, now: i64) -> CallbackOutcome {
        match order.status {
            // Idempotent replay: no mutation, same outcome as first call
            OrderStatus::Completed => CallbackOutcome::Completed(order),
            // Expiry already won; a settled payment cannot resurrect it
            OrderStatus::Cancelled => CallbackOutcome::Ignored,
            OrderStatus::Pending | OrderStatus::Failed => {
                match self.store.update_with(order.id, now, |o| {
                    if matches!(o.status, OrderStatus::Pending | OrderStatus::Failed) {
                        o.status = OrderStatus::Completed;
                        o.transaction_id = Some(tran_id.to_string());
                    }
                }) {
                    Ok(updated) if updated.status == OrderStatus::Completed => {
                        tracing::info!(
                            order_number = %updated.order_number,
                            transaction_id = tran_id,
                            "Payment completed"
                        );
                        CallbackOutcome::Completed(updated)
                    }
                    Ok(_) => CallbackOutcome::Ignored,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to complete order");
                        CallbackOutcome::Ignored
                    }
                }
            }
        }
    }

    /// Resolve a raw transaction reference to an order, failing closed
    fn lookup_by_ref(&self, raw: &str) -> Option<Order> {
        let txn_ref = match TxnRef::parse(raw.trim()) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(raw, error = %e, "Unparseable transaction reference");
                return None;
            }
        };
        let order = match self.store.get(txn_ref.order_id) {
            Ok(Some(order)) => order,
            Ok(None) => {
                tracing::warn!(order_id = txn_ref.order_id, "Callback for unknown order");
                return None;
            }
            Err(e) => {
                tracing::error!(error = %e, "Store error resolving callback");
                return None;
            }
        };
        if order.user_id != txn_ref.user_id {
            tracing::warn!(
                order_id = order.id,
                "Transaction reference user mismatch"
            );
            return None;
        }
        Some(order)
    }

    // ========== Manual Cancellation ==========

    /// Owner-initiated cancellation; only `Pending` orders qualify
    pub fn cancel_order(&self, user_id: u64, order_id: u64, now: i64) -> ManagerResult<Order> {
        let order = self
            .store
            .get(order_id)?
            .filter(|o| o.user_id == user_id)
            .ok_or(ManagerError::OrderNotFound(order_id))?;
        if order.status != OrderStatus::Pending {
            return Err(ManagerError::CannotCancel(order.order_number));
        }
        let updated = self.store.update_with(order.id, now, |o| {
            if o.status == OrderStatus::Pending {
                o.status = OrderStatus::Cancelled;
                o.delivery_status = DeliveryStatus::Cancelled;
            }
        })?;
        if updated.status != OrderStatus::Cancelled {
            // Lost a race against a concurrent transition
            return Err(ManagerError::CannotCancel(updated.order_number));
        }
        tracing::info!(order_number = %updated.order_number, "Order cancelled by owner");
        Ok(updated)
    }

    // ========== Reads ==========

    /// The user's orders, newest first, lazily expired
    pub fn list_orders(&self, user_id: u64, now: i64) -> ManagerResult<Vec<OrderView>> {
        let mut orders = self.store.scan(|o| o.user_id == user_id)?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        let mut views = Vec::with_capacity(orders.len());
        for order in orders {
            let order = self.expire_if_needed(order, now)?;
            views.push(self.view(order, now));
        }
        Ok(views)
    }

    /// Pending gateway orders still inside their payment window,
    /// soonest-expiring first
    pub fn payable_orders(&self, user_id: u64, now: i64) -> ManagerResult<Vec<OrderView>> {
        let mut orders = self.store.scan(|o| {
            o.user_id == user_id
                && o.status == OrderStatus::Pending
                && o.payment_method == PaymentMethod::Gateway
                && matches!(o.payment_timeout, Some(t) if t > now)
        })?;
        orders.sort_by_key(|o| o.payment_timeout);
        Ok(orders.into_iter().map(|o| self.view(o, now)).collect())
    }

    /// Tracking lookup: order number + caller identity
    ///
    /// Owner match is enforced; a foreign or unknown number is the same
    /// `None` so the endpoint leaks nothing.
    pub fn track(
        &self,
        user_id: u64,
        order_number: &str,
        now: i64,
    ) -> ManagerResult<Option<OrderView>> {
        let Some(order) = self.store.get_by_number(order_number)? else {
            return Ok(None);
        };
        if order.user_id != user_id {
            return Ok(None);
        }
        let order = self.expire_if_needed(order, now)?;
        Ok(Some(self.view(order, now)))
    }

    fn view(&self, order: Order, now: i64) -> OrderView {
        let minutes_remaining = order.payment_minutes_remaining(now);
        let show_pay_now = order.status == OrderStatus::Pending
            && order.payment_method == PaymentMethod::Gateway
            && minutes_remaining.is_some();
        OrderView {
            show_pay_now,
            minutes_remaining: minutes_remaining.unwrap_or(0),
            order,
        }
    }

    // ========== Expiry ==========

    /// Lazy expiry: persist the transition when the predicate fires
    ///
    /// The closure re-checks under the write transaction, so a concurrent
    /// completion wins over a stale read.
    fn expire_if_needed(&self, order: Order, now: i64) -> ManagerResult<Order> {
        if !is_expired(&order, now) {
            return Ok(order);
        }
        let updated = self.store.update_with(order.id, now, |o| {
            if is_expired(o, now) {
                apply_expiry(o);
            }
        })?;
        if updated.status == OrderStatus::Cancelled {
            tracing::info!(
                order_number = %updated.order_number,
                "Cancelled expired order"
            );
        }
        Ok(updated)
    }

    /// Batch sweep for orders nobody looks at; same predicate/transition
    /// as the lazy path
    pub fn sweep_expired(&self, now: i64) -> ManagerResult<usize> {
        let expired = self.store.scan(|o| is_expired(o, now))?;
        let mut cancelled = 0;
        for order in expired {
            let updated = self.expire_if_needed(order, now)?;
            if updated.status == OrderStatus::Cancelled {
                cancelled += 1;
            }
        }
        if cancelled > 0 {
            tracing::info!(cancelled, "Expiry sweep cancelled orders");
        }
        Ok(cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use crate::store::Product;
    use rust_decimal::Decimal;

    const THIRTY_MIN: i64 = 30 * 60_000;
    const T0: i64 = 1_717_200_000_000; // 2024-06-01 00:00 UTC

    struct Fixture {
        manager: OrdersManager,
        gateway: Arc<MockGateway>,
        events: broadcast::Receiver<StoreEvent>,
    }

    fn fixture() -> Fixture {
        let (tx, events) = broadcast::channel(64);
        let catalog = Arc::new(CatalogService::new(tx.clone(), 5));
        catalog.upsert_product(Product {
            id: 1,
            name: "Widget".into(),
            price: Decimal::new(50000, 2),
            stock: 10,
            is_active: true,
        });
        catalog.upsert_product(Product {
            id: 2,
            name: "Gadget".into(),
            price: Decimal::new(19900, 2),
            stock: 6,
            is_active: true,
        });
        let carts = Arc::new(CartService::new(catalog.clone()));
        let gateway = Arc::new(MockGateway::new());
        let store = OrderStore::open_in_memory(THIRTY_MIN).unwrap();
        let manager = OrdersManager::new(
            store,
            catalog,
            carts,
            gateway.clone(),
            tx,
            chrono_tz::Asia::Dhaka,
            "BDT",
            "http://localhost:3000/",
        );
        Fixture {
            manager,
            gateway,
            events,
        }
    }

    fn dhaka_address() -> ShippingAddress {
        ShippingAddress {
            full_name: "Rahim Uddin".into(),
            phone: "01811111111".into(),
            email: "rahim@example.com".into(),
            address_line_1: "House 7, Road 3".into(),
            address_line_2: None,
            city: "Dhaka".into(),
            state: "Dhaka".into(),
            postal_code: "1205".into(),
            country: "Bangladesh".into(),
        }
    }

    fn checkout_request(method: PaymentMethod) -> CheckoutRequest {
        CheckoutRequest {
            address: dhaka_address(),
            payment_method: method,
        }
    }

    /// Two widgets at 500.00 + Dhaka/Dhaka shipping = 1040.00
    fn place_gateway_order(fx: &Fixture, user_id: u64, now: i64) -> Order {
        fx.manager.carts().add_item(user_id, 1, 2, now).unwrap();
        fx.manager
            .checkout(user_id, checkout_request(PaymentMethod::Gateway), now)
            .unwrap()
            .order
    }

    async fn initiated_ref(fx: &Fixture, user_id: u64, order_id: u64, now: i64) -> String {
        fx.manager
            .initiate_payment(user_id, order_id, now)
            .await
            .unwrap();
        fx.gateway.sessions.lock().last().unwrap().tran_ref.clone()
    }

    // ========== Checkout ==========

    #[test]
    fn cash_checkout_completes_immediately() {
        let mut fx = fixture();
        fx.manager.carts().add_item(7, 1, 2, T0).unwrap();
        let outcome = fx
            .manager
            .checkout(7, checkout_request(PaymentMethod::CashOnDelivery), T0)
            .unwrap();

        assert_eq!(outcome.order.status, OrderStatus::Completed);
        assert_eq!(outcome.order.delivery_status, DeliveryStatus::Pending);
        assert_eq!(outcome.order.payment_timeout, None);
        assert_eq!(outcome.next, NextStep::Confirmed);
        assert!(fx.manager.carts().get(7).is_empty());

        // Stock decremented once per line
        assert_eq!(fx.manager.catalog().get(1).unwrap().stock, 8);

        let event = fx.events.try_recv().unwrap();
        assert!(matches!(event, StoreEvent::OrderCreated { order_id, .. } if order_id == outcome.order.id));
    }

    #[test]
    fn gateway_checkout_stays_pending_with_timeout() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.payment_timeout, Some(T0 + THIRTY_MIN));
        assert_eq!(order.total, Decimal::new(104000, 2));
        assert_eq!(order.shipping_charge, Decimal::new(4000, 2));
    }

    #[test]
    fn checkout_shipping_follows_rate_table() {
        let fx = fixture();
        fx.manager.carts().add_item(7, 1, 1, T0).unwrap();
        let mut request = checkout_request(PaymentMethod::Gateway);
        request.address.state = "Chittagong".into();
        request.address.city = "Comilla".into();
        let outcome = fx.manager.checkout(7, request, T0).unwrap();
        assert_eq!(outcome.order.shipping_charge, Decimal::new(12000, 2));
        assert_eq!(outcome.order.total, Decimal::new(62000, 2));
    }

    #[test]
    fn empty_cart_checkout_is_rejected() {
        let fx = fixture();
        let result = fx
            .manager
            .checkout(7, checkout_request(PaymentMethod::Gateway), T0);
        assert!(matches!(result, Err(ManagerError::EmptyCart)));
    }

    #[test]
    fn checkout_repairs_vanished_products() {
        let fx = fixture();
        fx.manager.carts().add_item(7, 1, 1, T0).unwrap();
        fx.manager.carts().add_item(7, 2, 1, T0).unwrap();
        fx.manager.catalog().remove_product(2);

        let outcome = fx
            .manager
            .checkout(7, checkout_request(PaymentMethod::Gateway), T0)
            .unwrap();
        assert_eq!(outcome.dropped_products, vec![2]);
        assert_eq!(outcome.order.items.len(), 1);
        assert_eq!(outcome.order.items[0].product_id, 1);
        // 500.00 + 40 shipping
        assert_eq!(outcome.order.total, Decimal::new(54000, 2));
    }

    #[test]
    fn checkout_with_fully_vanished_cart_is_rejected() {
        let fx = fixture();
        fx.manager.carts().add_item(7, 2, 1, T0).unwrap();
        fx.manager.catalog().remove_product(2);
        let result = fx
            .manager
            .checkout(7, checkout_request(PaymentMethod::Gateway), T0);
        assert!(matches!(result, Err(ManagerError::EmptyCart)));
    }

    #[test]
    fn daily_sequence_increments_within_a_day() {
        let fx = fixture();
        let first = place_gateway_order(&fx, 7, T0);
        let second = place_gateway_order(&fx, 8, T0 + 60_000);
        assert_eq!(&first.order_number[8..], "01");
        assert_eq!(&second.order_number[8..], "02");
        assert_eq!(first.order_number[..8], second.order_number[..8]);
    }

    // ========== Gateway Initiation ==========

    #[tokio::test]
    async fn initiation_stores_session_key_after_success() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let url = fx.manager.initiate_payment(7, order.id, T0).await.unwrap();
        assert!(url.starts_with("https://"));

        let stored = fx.manager.store.get(order.id).unwrap().unwrap();
        assert_eq!(stored.transaction_id.as_deref(), Some("MOCKSESSION0001"));

        // The session request carries a parseable reference and resolved
        // customer fields
        let sessions = fx.gateway.sessions.lock();
        let request = sessions.last().unwrap();
        let txn_ref = TxnRef::parse(&request.tran_ref).unwrap();
        assert_eq!(txn_ref.order_id, order.id);
        assert_eq!(txn_ref.user_id, 7);
        assert_eq!(request.currency, "BDT");
        assert_eq!(request.customer.phone, "01811111111");
        assert_eq!(
            request.success_url,
            "http://localhost:3000/api/payment/success"
        );
    }

    #[tokio::test]
    async fn initiation_applies_literal_fallbacks_for_blank_fields() {
        let fx = fixture();
        fx.manager.carts().add_item(7, 1, 1, T0).unwrap();
        let mut request = checkout_request(PaymentMethod::Gateway);
        request.address.phone = String::new();
        request.address.email = "  ".into();
        request.address.country = String::new();
        let order = fx.manager.checkout(7, request, T0).unwrap().order;

        fx.manager.initiate_payment(7, order.id, T0).await.unwrap();
        let sessions = fx.gateway.sessions.lock();
        let customer = &sessions.last().unwrap().customer;
        assert_eq!(customer.phone, "01700000000");
        assert_eq!(customer.email, "customer@example.com");
        assert_eq!(customer.country, "Bangladesh");
    }

    #[tokio::test]
    async fn initiation_failure_leaves_order_untouched() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        fx.gateway.fail_next_session("Store Credential Error");

        let result = fx.manager.initiate_payment(7, order.id, T0).await;
        assert!(matches!(result, Err(ManagerError::Gateway(_))));

        let stored = fx.manager.store.get(order.id).unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
        assert_eq!(stored.transaction_id, None);
        assert_eq!(stored.updated_at, order.updated_at);
    }

    #[tokio::test]
    async fn initiation_refuses_expired_order_and_persists_cancellation() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let late = T0 + THIRTY_MIN + 60_000;

        let result = fx.manager.initiate_payment(7, order.id, late).await;
        assert!(matches!(result, Err(ManagerError::OrderCancelled(_))));

        let stored = fx.manager.store.get(order.id).unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
        assert_eq!(stored.delivery_status, DeliveryStatus::Cancelled);
        assert_eq!(fx.gateway.sessions_created(), 0);
    }

    #[tokio::test]
    async fn initiation_refuses_completed_order() {
        let fx = fixture();
        fx.manager.carts().add_item(7, 1, 1, T0).unwrap();
        let order = fx
            .manager
            .checkout(7, checkout_request(PaymentMethod::CashOnDelivery), T0)
            .unwrap()
            .order;
        let result = fx.manager.initiate_payment(7, order.id, T0).await;
        assert!(matches!(result, Err(ManagerError::OrderAlreadyCompleted(_))));
    }

    #[tokio::test]
    async fn initiation_hides_foreign_orders() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let result = fx.manager.initiate_payment(8, order.id, T0).await;
        assert!(matches!(result, Err(ManagerError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn failed_order_can_retry_payment() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let tran_ref = initiated_ref(&fx, 7, order.id, T0).await;
        fx.manager.payment_fail(Some(&tran_ref), T0 + 60_000);

        // Second session within the window succeeds
        let url = fx
            .manager
            .initiate_payment(7, order.id, T0 + 120_000)
            .await;
        assert!(url.is_ok());
        assert_eq!(fx.gateway.sessions_created(), 2);
    }

    // ========== Success Callback ==========

    #[tokio::test]
    async fn validated_success_completes_order() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let tran_ref = initiated_ref(&fx, 7, order.id, T0).await;
        fx.gateway.set_validation("VALID", Some(tran_ref.clone()));

        let outcome = fx
            .manager
            .payment_success(Some("val-abc123"), T0 + 5 * 60_000)
            .await;
        let CallbackOutcome::Completed(updated) = outcome else {
            panic!("expected Completed, got {outcome:?}");
        };
        assert_eq!(updated.status, OrderStatus::Completed);
        assert_eq!(updated.transaction_id.as_deref(), Some(tran_ref.as_str()));
        assert_eq!(fx.gateway.validations.lock().as_slice(), ["val-abc123"]);

        // Tracking by the owner now shows Completed
        let view = fx
            .manager
            .track(7, &order.order_number, T0 + 6 * 60_000)
            .unwrap()
            .unwrap();
        assert_eq!(view.order.status, OrderStatus::Completed);
        assert!(!view.show_pay_now);
    }

    #[tokio::test]
    async fn non_valid_validation_leaves_order_untouched() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let tran_ref = initiated_ref(&fx, 7, order.id, T0).await;
        fx.gateway
            .set_validation("INVALID_TRANSACTION", Some(tran_ref));

        let outcome = fx.manager.payment_success(Some("val-1"), T0 + 1000).await;
        assert_eq!(outcome, CallbackOutcome::Ignored);

        let stored = fx.manager.store.get(order.id).unwrap().unwrap();
        // Still payable: not failed, not cancelled
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn success_without_token_or_with_unknown_order_is_generic() {
        let fx = fixture();
        assert_eq!(
            fx.manager.payment_success(None, T0).await,
            CallbackOutcome::Ignored
        );
        assert_eq!(
            fx.manager.payment_success(Some("  "), T0).await,
            CallbackOutcome::Ignored
        );

        fx.gateway
            .set_validation("VALID", Some("ORDER_999_7_00000001".into()));
        assert_eq!(
            fx.manager.payment_success(Some("val-1"), T0).await,
            CallbackOutcome::Ignored
        );

        fx.gateway.set_validation("VALID", Some("garbage".into()));
        assert_eq!(
            fx.manager.payment_success(Some("val-2"), T0).await,
            CallbackOutcome::Ignored
        );
    }

    #[tokio::test]
    async fn success_replay_is_idempotent() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let tran_ref = initiated_ref(&fx, 7, order.id, T0).await;
        fx.gateway.set_validation("VALID", Some(tran_ref));

        let first = fx.manager.payment_success(Some("val-1"), T0 + 1000).await;
        let CallbackOutcome::Completed(first_order) = first else {
            panic!("expected Completed");
        };
        let replay = fx.manager.payment_success(Some("val-1"), T0 + 9000).await;
        let CallbackOutcome::Completed(replayed) = replay else {
            panic!("expected Completed on replay");
        };
        assert_eq!(replayed.updated_at, first_order.updated_at);
    }

    // ========== Fail / Cancel Callbacks ==========

    #[tokio::test]
    async fn fail_callback_marks_pending_order_failed() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let tran_ref = initiated_ref(&fx, 7, order.id, T0).await;

        let outcome = fx.manager.payment_fail(Some(&tran_ref), T0 + 1000);
        let CallbackOutcome::Failed(updated) = outcome else {
            panic!("expected Failed");
        };
        assert_eq!(updated.status, OrderStatus::Failed);
        // Failed is recoverable: the window still stands
        assert_eq!(updated.payment_timeout, order.payment_timeout);
    }

    #[tokio::test]
    async fn fail_callback_after_window_cancels_instead() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let tran_ref = initiated_ref(&fx, 7, order.id, T0).await;

        let outcome = fx
            .manager
            .payment_fail(Some(&tran_ref), T0 + THIRTY_MIN + 1000);
        let CallbackOutcome::Expired(updated) = outcome else {
            panic!("expected Expired");
        };
        assert_eq!(updated.status, OrderStatus::Cancelled);
        assert_eq!(updated.delivery_status, DeliveryStatus::Cancelled);
    }

    #[tokio::test]
    async fn cancel_callback_cancels_and_replays_quietly() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let tran_ref = initiated_ref(&fx, 7, order.id, T0).await;

        let outcome = fx.manager.payment_cancel(Some(&tran_ref), T0 + 1000);
        assert!(matches!(outcome, CallbackOutcome::Cancelled(_)));

        let replay = fx.manager.payment_cancel(Some(&tran_ref), T0 + 2000);
        let CallbackOutcome::Cancelled(order) = replay else {
            panic!("expected Cancelled on replay");
        };
        assert_eq!(order.updated_at, T0 + 1000);
    }

    #[tokio::test]
    async fn cancel_callback_never_touches_completed_orders() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let tran_ref = initiated_ref(&fx, 7, order.id, T0).await;
        fx.gateway.set_validation("VALID", Some(tran_ref.clone()));
        fx.manager.payment_success(Some("val-1"), T0 + 1000).await;

        let outcome = fx.manager.payment_cancel(Some(&tran_ref), T0 + 2000);
        assert_eq!(outcome, CallbackOutcome::Ignored);
        let stored = fx.manager.store.get(order.id).unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Completed);
    }

    #[test]
    fn callbacks_with_garbage_references_are_generic() {
        let fx = fixture();
        assert_eq!(
            fx.manager.payment_fail(Some("not_a_ref"), T0),
            CallbackOutcome::Ignored
        );
        assert_eq!(
            fx.manager.payment_cancel(Some("ORDER_xx_1"), T0),
            CallbackOutcome::Ignored
        );
        assert_eq!(fx.manager.payment_fail(None, T0), CallbackOutcome::Ignored);
    }

    #[tokio::test]
    async fn reference_with_wrong_owner_is_rejected() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        // Same order id, forged user id
        let forged = format!("ORDER_{}_999_00000001", order.id);
        assert_eq!(
            fx.manager.payment_cancel(Some(&forged), T0),
            CallbackOutcome::Ignored
        );
    }

    // ========== IPN ==========

    #[tokio::test]
    async fn ipn_valid_completes_and_records_reference() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let tran_ref = initiated_ref(&fx, 7, order.id, T0).await;

        let outcome = fx
            .manager
            .payment_ipn(Some(&tran_ref), Some("VALID"), T0 + 1000);
        let CallbackOutcome::Completed(updated) = outcome else {
            panic!("expected Completed");
        };
        assert_eq!(updated.transaction_id.as_deref(), Some(tran_ref.as_str()));
    }

    #[tokio::test]
    async fn ipn_replay_is_a_noop_with_the_same_outcome() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let tran_ref = initiated_ref(&fx, 7, order.id, T0).await;

        let first = fx
            .manager
            .payment_ipn(Some(&tran_ref), Some("VALID"), T0 + 1000);
        let CallbackOutcome::Completed(first_order) = first else {
            panic!("expected Completed");
        };
        let replay = fx
            .manager
            .payment_ipn(Some(&tran_ref), Some("VALID"), T0 + 60_000);
        let CallbackOutcome::Completed(replayed) = replay else {
            panic!("expected Completed on replay");
        };
        assert_eq!(replayed.updated_at, first_order.updated_at);

        // Stock untouched by replays: decremented at creation only
        assert_eq!(fx.manager.catalog().get(1).unwrap().stock, 8);
    }

    #[tokio::test]
    async fn ipn_non_valid_status_is_ignored() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let tran_ref = initiated_ref(&fx, 7, order.id, T0).await;

        let outcome = fx
            .manager
            .payment_ipn(Some(&tran_ref), Some("FAILED"), T0 + 1000);
        assert_eq!(outcome, CallbackOutcome::Ignored);
        let outcome = fx.manager.payment_ipn(Some(&tran_ref), None, T0 + 1000);
        assert_eq!(outcome, CallbackOutcome::Ignored);

        let stored = fx.manager.store.get(order.id).unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Pending);
    }

    // ========== Expiry ==========

    #[test]
    fn tracking_after_window_lazily_cancels() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let late = T0 + THIRTY_MIN + 60_000;

        let view = fx.manager.track(7, &order.order_number, late).unwrap().unwrap();
        assert_eq!(view.order.status, OrderStatus::Cancelled);
        assert_eq!(view.order.delivery_status, DeliveryStatus::Cancelled);
        assert!(!view.show_pay_now);
    }

    #[tokio::test]
    async fn expiry_is_monotonic_against_late_callbacks() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let tran_ref = initiated_ref(&fx, 7, order.id, T0).await;
        let late = T0 + THIRTY_MIN + 60_000;

        // A read expires the order first
        fx.manager.track(7, &order.order_number, late).unwrap();

        // A late validated success cannot resurrect it
        fx.gateway.set_validation("VALID", Some(tran_ref.clone()));
        assert_eq!(
            fx.manager.payment_success(Some("val-late"), late).await,
            CallbackOutcome::Ignored
        );
        assert_eq!(
            fx.manager.payment_ipn(Some(&tran_ref), Some("VALID"), late),
            CallbackOutcome::Ignored
        );
        let stored = fx.manager.store.get(order.id).unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Cancelled);
    }

    #[test]
    fn mid_window_payment_still_possible_at_29_59() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let almost = T0 + THIRTY_MIN - 1000;
        let view = fx.manager.track(7, &order.order_number, almost).unwrap().unwrap();
        assert_eq!(view.order.status, OrderStatus::Pending);
        assert!(view.show_pay_now);
    }

    #[test]
    fn sweep_cancels_expired_orders_once() {
        let fx = fixture();
        place_gateway_order(&fx, 7, T0);
        place_gateway_order(&fx, 8, T0 + 1000);
        // Cash order never expires
        fx.manager.carts().add_item(9, 1, 1, T0).unwrap();
        fx.manager
            .checkout(9, checkout_request(PaymentMethod::CashOnDelivery), T0)
            .unwrap();

        let late = T0 + THIRTY_MIN + 60_000;
        assert_eq!(fx.manager.sweep_expired(late).unwrap(), 2);
        assert_eq!(fx.manager.sweep_expired(late).unwrap(), 0);
    }

    // ========== Manual Cancellation ==========

    #[test]
    fn owner_can_cancel_pending_order() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let cancelled = fx.manager.cancel_order(7, order.id, T0 + 1000).unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);
        assert_eq!(cancelled.delivery_status, DeliveryStatus::Cancelled);
    }

    #[test]
    fn completed_order_cannot_be_cancelled() {
        let fx = fixture();
        fx.manager.carts().add_item(7, 1, 1, T0).unwrap();
        let order = fx
            .manager
            .checkout(7, checkout_request(PaymentMethod::CashOnDelivery), T0)
            .unwrap()
            .order;

        let result = fx.manager.cancel_order(7, order.id, T0 + 1000);
        assert!(matches!(result, Err(ManagerError::CannotCancel(_))));
        let stored = fx.manager.store.get(order.id).unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Completed);
        assert_eq!(stored.updated_at, order.updated_at);
    }

    #[test]
    fn foreign_orders_cannot_be_cancelled() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        let result = fx.manager.cancel_order(8, order.id, T0);
        assert!(matches!(result, Err(ManagerError::OrderNotFound(_))));
    }

    // ========== Listing & Tracking ==========

    #[test]
    fn list_orders_carries_pay_now_info_and_lazy_expiry() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);

        let fresh = fx.manager.list_orders(7, T0 + 5 * 60_000).unwrap();
        assert_eq!(fresh.len(), 1);
        assert!(fresh[0].show_pay_now);
        assert_eq!(fresh[0].minutes_remaining, 25);

        let stale = fx.manager.list_orders(7, T0 + THIRTY_MIN + 60_000).unwrap();
        assert_eq!(stale[0].order.status, OrderStatus::Cancelled);
        assert!(!stale[0].show_pay_now);
        assert_eq!(stale[0].order.id, order.id);
    }

    #[test]
    fn payable_orders_sorted_by_soonest_timeout() {
        let fx = fixture();
        let first = place_gateway_order(&fx, 7, T0);
        let second = place_gateway_order(&fx, 7, T0 + 60_000);
        // Another user's order stays invisible
        place_gateway_order(&fx, 8, T0);

        let payable = fx.manager.payable_orders(7, T0 + 120_000).unwrap();
        assert_eq!(payable.len(), 2);
        assert_eq!(payable[0].order.id, first.id);
        assert_eq!(payable[1].order.id, second.id);
        assert!(payable.iter().all(|v| v.show_pay_now));
    }

    #[test]
    fn tracking_enforces_ownership() {
        let fx = fixture();
        let order = place_gateway_order(&fx, 7, T0);
        assert!(fx.manager.track(8, &order.order_number, T0).unwrap().is_none());
        assert!(fx.manager.track(7, "2099123199", T0).unwrap().is_none());
    }
}
