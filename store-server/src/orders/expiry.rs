//! Lazy payment-window expiry
//!
//! A pure predicate plus a pure transition. Every read path (order list,
//! tracking lookup, pre-payment guard, fail callback) and the periodic
//! background sweep call these same two functions, so lazy and batch
//! expiry can never diverge.

use shared::order::types::{DeliveryStatus, Order, OrderStatus, PaymentMethod};

/// Whether an order's payment window has lapsed
///
/// Only gateway orders still awaiting payment can expire; `Failed` counts
/// because the customer may retry payment until the window closes.
pub fn is_expired(order: &Order, now: i64) -> bool {
    matches!(order.status, OrderStatus::Pending | OrderStatus::Failed)
        && order.payment_method == PaymentMethod::Gateway
        && matches!(order.payment_timeout, Some(timeout) if timeout < now)
}

/// Transition an expired order to its terminal state
///
/// Both axes move: the payment status and the delivery status end up
/// `Cancelled`.
pub fn apply_expiry(order: &mut Order) {
    order.status = OrderStatus::Cancelled;
    order.delivery_status = DeliveryStatus::Cancelled;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use shared::order::types::ShippingAddress;

    fn gateway_order(status: OrderStatus, timeout: Option<i64>) -> Order {
        Order {
            id: 1,
            user_id: 1,
            order_number: "2024060101".into(),
            total: Decimal::new(104000, 2),
            shipping_charge: Decimal::new(4000, 2),
            status,
            delivery_status: DeliveryStatus::Pending,
            payment_method: PaymentMethod::Gateway,
            address: ShippingAddress::default(),
            items: vec![],
            transaction_id: None,
            payment_timeout: timeout,
            created_at: 0,
            updated_at: 0,
        }
    }

    #[test]
    fn pending_gateway_order_expires_after_timeout() {
        let order = gateway_order(OrderStatus::Pending, Some(1000));
        assert!(!is_expired(&order, 999));
        assert!(!is_expired(&order, 1000));
        assert!(is_expired(&order, 1001));
    }

    #[test]
    fn failed_orders_expire_too() {
        let order = gateway_order(OrderStatus::Failed, Some(1000));
        assert!(is_expired(&order, 2000));
    }

    #[test]
    fn terminal_and_cash_orders_never_expire() {
        assert!(!is_expired(
            &gateway_order(OrderStatus::Completed, Some(1000)),
            2000
        ));
        assert!(!is_expired(
            &gateway_order(OrderStatus::Cancelled, Some(1000)),
            2000
        ));

        let mut cash = gateway_order(OrderStatus::Pending, None);
        cash.payment_method = PaymentMethod::CashOnDelivery;
        assert!(!is_expired(&cash, 2000));
    }

    #[test]
    fn transition_cancels_both_axes() {
        let mut order = gateway_order(OrderStatus::Pending, Some(1000));
        apply_expiry(&mut order);
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.delivery_status, DeliveryStatus::Cancelled);
        // Idempotent from the predicate's point of view
        assert!(!is_expired(&order, 2000));
    }
}
