//! Order API Handlers
//!
//! Every read runs through the manager so lazy expiry is applied before
//! anything is shown or acted on.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::api::{CurrentUser, payment};
use crate::core::ServerState;
use crate::orders::manager::OrderView;
use crate::utils::time::now_millis;
use crate::utils::{AppError, AppResult};

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(list))
        .route("/payable", get(payable))
        .route("/track", get(track))
        .route("/{id}/pay", post(payment::initiate))
        .route("/{id}/cancel", post(cancel))
}

/// The caller's order history, newest first
async fn list(
    State(state): State<ServerState>,
    CurrentUser(user_id): CurrentUser,
) -> AppResult<Json<Vec<OrderView>>> {
    let views = state.manager.list_orders(user_id, now_millis())?;
    Ok(Json(views))
}

/// Pending gateway orders still inside their payment window
async fn payable(
    State(state): State<ServerState>,
    CurrentUser(user_id): CurrentUser,
) -> AppResult<Json<Vec<OrderView>>> {
    let views = state.manager.payable_orders(user_id, now_millis())?;
    Ok(Json(views))
}

/// Tracking query params
#[derive(Debug, Deserialize)]
pub struct TrackQuery {
    pub order_number: String,
}

/// Track an order by number; owner match enforced
async fn track(
    State(state): State<ServerState>,
    CurrentUser(user_id): CurrentUser,
    Query(query): Query<TrackQuery>,
) -> AppResult<Json<OrderView>> {
    state
        .manager
        .track(user_id, &query.order_number, now_millis())?
        .map(Json)
        .ok_or_else(|| AppError::not_found(format!("Order {} not found", query.order_number)))
}

/// Cancellation response
#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub order_number: String,
    pub message: String,
}

/// Manually cancel a pending order
async fn cancel(
    State(state): State<ServerState>,
    CurrentUser(user_id): CurrentUser,
    Path(order_id): Path<u64>,
) -> AppResult<Json<CancelResponse>> {
    let order = state.manager.cancel_order(user_id, order_id, now_millis())?;
    Ok(Json(CancelResponse {
        message: format!("Order #{} has been cancelled.", order.order_number),
        order_number: order.order_number,
    }))
}
