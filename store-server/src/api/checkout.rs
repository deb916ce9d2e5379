//! Checkout API Handler

use axum::{Json, Router, extract::State, routing::post};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::order::types::{PaymentMethod, ShippingAddress};
use validator::Validate;

use crate::api::CurrentUser;
use crate::core::ServerState;
use crate::orders::manager::{CheckoutRequest, NextStep};
use crate::utils::time::now_millis;
use crate::utils::{AppError, AppResult};

pub fn router() -> Router<ServerState> {
    Router::new().route("/api/checkout", post(checkout))
}

/// Checkout form — the address snapshot plus the payment method
#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutForm {
    #[validate(length(min = 1, max = 100))]
    pub full_name: String,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub phone: String,
    #[validate(email)]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub address_line_1: String,
    #[serde(default)]
    pub address_line_2: Option<String>,
    /// District
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    /// Division
    #[validate(length(min = 1, max = 100))]
    pub state: String,
    #[serde(default)]
    #[validate(length(max = 20))]
    pub postal_code: String,
    #[serde(default = "default_country")]
    pub country: String,
    #[serde(default)]
    pub payment_method: PaymentMethod,
}

fn default_country() -> String {
    "Bangladesh".to_string()
}

/// Checkout response
#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub order_id: u64,
    pub order_number: String,
    pub total: Decimal,
    pub shipping_charge: Decimal,
    pub next: NextStep,
    /// Products dropped by cart repair before pricing
    pub dropped_products: Vec<u64>,
}

/// Create an order from the session cart
async fn checkout(
    State(state): State<ServerState>,
    CurrentUser(user_id): CurrentUser,
    Json(form): Json<CheckoutForm>,
) -> AppResult<Json<CheckoutResponse>> {
    form.validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let address = ShippingAddress {
        full_name: form.full_name,
        phone: form.phone,
        email: form.email.unwrap_or_default(),
        address_line_1: form.address_line_1,
        address_line_2: form.address_line_2,
        city: form.city,
        state: form.state,
        postal_code: form.postal_code,
        country: form.country,
    };
    let outcome = state.manager.checkout(
        user_id,
        CheckoutRequest {
            address,
            payment_method: form.payment_method,
        },
        now_millis(),
    )?;

    Ok(Json(CheckoutResponse {
        order_id: outcome.order.id,
        order_number: outcome.order.order_number.clone(),
        total: outcome.order.total,
        shipping_charge: outcome.order.shipping_charge,
        next: outcome.next,
        dropped_products: outcome.dropped_products,
    }))
}
