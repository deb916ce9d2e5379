//! Payment API Handlers — initiation and gateway callbacks
//!
//! The browser callbacks (success/fail/cancel) always answer 200 with a
//! generic body; gateway internals and store errors never leak to the
//! customer. The IPN endpoint acknowledges every request — the gateway
//! retries on anything else.

use axum::{
    Form, Json, Router,
    extract::{Path, State},
    routing::post,
};
use serde::{Deserialize, Serialize};

use crate::api::CurrentUser;
use crate::core::ServerState;
use crate::orders::manager::CallbackOutcome;
use crate::utils::AppResult;
use crate::utils::time::now_millis;

pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/payment/success", post(success))
        .route("/api/payment/fail", post(fail))
        .route("/api/payment/cancel", post(cancel))
        .route("/api/payment/ipn", post(ipn))
}

/// Gateway redirect target
#[derive(Debug, Serialize)]
pub struct PaymentRedirect {
    pub gateway_url: String,
}

/// Start a hosted payment session for an order
///
/// Registered under the orders router (`/api/orders/{id}/pay`).
pub async fn initiate(
    State(state): State<ServerState>,
    CurrentUser(user_id): CurrentUser,
    Path(order_id): Path<u64>,
) -> AppResult<Json<PaymentRedirect>> {
    let gateway_url = state
        .manager
        .initiate_payment(user_id, order_id, now_millis())
        .await?;
    Ok(Json(PaymentRedirect { gateway_url }))
}

/// Success redirect body (form-encoded by the gateway)
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct SuccessCallback {
    pub val_id: Option<String>,
}

/// Fail/cancel redirect body
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ReferenceCallback {
    pub tran_id: Option<String>,
}

/// IPN body
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct IpnCallback {
    pub tran_id: Option<String>,
    pub status: Option<String>,
}

/// Generic customer-facing callback page payload
#[derive(Debug, Serialize)]
pub struct CallbackPage {
    pub status: &'static str,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
}

async fn success(
    State(state): State<ServerState>,
    Form(form): Form<SuccessCallback>,
) -> Json<CallbackPage> {
    let outcome = state
        .manager
        .payment_success(form.val_id.as_deref(), now_millis())
        .await;
    Json(match outcome {
        CallbackOutcome::Completed(order) => CallbackPage {
            status: "success",
            message: "Payment successful! Your order has been confirmed.",
            order_number: Some(order.order_number),
        },
        _ => CallbackPage {
            status: "failed",
            message: "Payment validation failed.",
            order_number: None,
        },
    })
}

async fn fail(
    State(state): State<ServerState>,
    Form(form): Form<ReferenceCallback>,
) -> Json<CallbackPage> {
    let outcome = state
        .manager
        .payment_fail(form.tran_id.as_deref(), now_millis());
    Json(match outcome {
        CallbackOutcome::Expired(order) => CallbackPage {
            status: "failed",
            message: "Payment failed and the payment window has expired.",
            order_number: Some(order.order_number),
        },
        CallbackOutcome::Failed(order) => CallbackPage {
            status: "failed",
            message: "Payment failed. Please try again.",
            order_number: Some(order.order_number),
        },
        _ => CallbackPage {
            status: "failed",
            message: "Payment failed.",
            order_number: None,
        },
    })
}

async fn cancel(
    State(state): State<ServerState>,
    Form(form): Form<ReferenceCallback>,
) -> Json<CallbackPage> {
    let outcome = state
        .manager
        .payment_cancel(form.tran_id.as_deref(), now_millis());
    Json(match outcome {
        CallbackOutcome::Cancelled(order) => CallbackPage {
            status: "cancelled",
            message: "Payment cancelled.",
            order_number: Some(order.order_number),
        },
        _ => CallbackPage {
            status: "cancelled",
            message: "Payment cancelled.",
            order_number: None,
        },
    })
}

/// Machine-readable IPN acknowledgment
#[derive(Debug, Serialize)]
pub struct IpnAck {
    pub status: &'static str,
}

async fn ipn(State(state): State<ServerState>, Form(form): Form<IpnCallback>) -> Json<IpnAck> {
    let outcome = state.manager.payment_ipn(
        form.tran_id.as_deref(),
        form.status.as_deref(),
        now_millis(),
    );
    if let CallbackOutcome::Completed(order) = &outcome {
        tracing::debug!(order_number = %order.order_number, "IPN acknowledged");
    }
    Json(IpnAck { status: "ok" })
}
