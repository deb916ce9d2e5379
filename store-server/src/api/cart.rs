//! Cart API Handlers

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, put},
};
use serde::Deserialize;

use crate::api::CurrentUser;
use crate::cart::{Cart, CartError};
use crate::core::ServerState;
use crate::utils::time::now_millis;
use crate::utils::{AppError, AppResult};

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/cart", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(get_cart).post(add_item))
        .route("/{product_id}", put(update_quantity).delete(remove_item))
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::UnknownProduct(id) => {
                AppError::not_found(format!("Product {id} not found"))
            }
            CartError::InvalidQuantity(q) => {
                AppError::validation(format!("Invalid quantity: {q}"))
            }
        }
    }
}

/// Current cart contents
async fn get_cart(
    State(state): State<ServerState>,
    CurrentUser(user_id): CurrentUser,
) -> Json<Cart> {
    Json(state.manager.carts().get(user_id))
}

/// Add item request
#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: u64,
    #[serde(default = "default_quantity")]
    pub quantity: i32,
}

fn default_quantity() -> i32 {
    1
}

/// Add a product to the cart, capturing its current effective price
async fn add_item(
    State(state): State<ServerState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<AddItemRequest>,
) -> AppResult<Json<Cart>> {
    let cart = state
        .manager
        .carts()
        .add_item(user_id, payload.product_id, payload.quantity, now_millis())?;
    Ok(Json(cart))
}

/// Update quantity request
#[derive(Debug, Deserialize)]
pub struct UpdateQuantityRequest {
    pub quantity: i32,
}

/// Set a line's quantity (zero removes it)
async fn update_quantity(
    State(state): State<ServerState>,
    CurrentUser(user_id): CurrentUser,
    Path(product_id): Path<u64>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Json<Cart> {
    Json(
        state
            .manager
            .carts()
            .update_quantity(user_id, product_id, payload.quantity),
    )
}

/// Remove a line
async fn remove_item(
    State(state): State<ServerState>,
    CurrentUser(user_id): CurrentUser,
    Path(product_id): Path<u64>,
) -> Json<Cart> {
    Json(state.manager.carts().remove_item(user_id, product_id))
}
