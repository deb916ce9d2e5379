//! Cart aggregate
//!
//! An explicit aggregate with an owner and a commit-and-clear operation,
//! replacing implicit session-mapping storage. Line prices are captured
//! at add-to-cart time — a running campaign discounts the snapshot then
//! and there — and survive later catalog edits. `repair` drops lines
//! whose product has vanished so checkout never aborts on a stale cart.

use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

use crate::orders::money;
use crate::store::CatalogService;

/// One cart line with its captured price snapshot
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CartLine {
    pub product_id: u64,
    /// Product name snapshot
    pub name: String,
    pub quantity: i32,
    /// Price captured at add-to-cart time, campaign discount included
    pub unit_price: Decimal,
}

impl CartLine {
    pub fn line_total(&self) -> Decimal {
        money::line_total(self.unit_price, self.quantity)
    }
}

/// Cart contents, insertion-ordered
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct Cart {
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn subtotal(&self) -> Decimal {
        money::round_money(self.lines.iter().map(CartLine::line_total).sum())
    }
}

/// Cart errors
#[derive(Debug, Error)]
pub enum CartError {
    #[error("Product not found: {0}")]
    UnknownProduct(u64),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i32),
}

/// Per-user cart storage
pub struct CartService {
    carts: DashMap<u64, Cart>,
    catalog: Arc<CatalogService>,
}

impl CartService {
    pub fn new(catalog: Arc<CatalogService>) -> Self {
        Self {
            carts: DashMap::new(),
            catalog,
        }
    }

    /// Add a quantity of a product, capturing the current effective price
    ///
    /// Adding the same product again only bumps the quantity; the snapshot
    /// price from the first add stands.
    pub fn add_item(
        &self,
        user_id: u64,
        product_id: u64,
        quantity: i32,
        now: i64,
    ) -> Result<Cart, CartError> {
        if quantity <= 0 {
            return Err(CartError::InvalidQuantity(quantity));
        }
        let product = self
            .catalog
            .get(product_id)
            .filter(|p| p.is_active)
            .ok_or(CartError::UnknownProduct(product_id))?;
        let unit_price = self
            .catalog
            .effective_price(product_id, now)
            .unwrap_or(product.price);

        let mut cart = self.carts.entry(user_id).or_default();
        match cart.lines.iter_mut().find(|l| l.product_id == product_id) {
            Some(line) => line.quantity += quantity,
            None => cart.lines.push(CartLine {
                product_id,
                name: product.name,
                quantity,
                unit_price,
            }),
        }
        Ok(cart.clone())
    }

    /// Set a line's quantity; zero or less removes the line
    pub fn update_quantity(&self, user_id: u64, product_id: u64, quantity: i32) -> Cart {
        let mut cart = self.carts.entry(user_id).or_default();
        if quantity <= 0 {
            cart.lines.retain(|l| l.product_id != product_id);
        } else if let Some(line) = cart.lines.iter_mut().find(|l| l.product_id == product_id) {
            line.quantity = quantity;
        }
        cart.clone()
    }

    pub fn remove_item(&self, user_id: u64, product_id: u64) -> Cart {
        self.update_quantity(user_id, product_id, 0)
    }

    /// Current cart contents (empty cart if none)
    pub fn get(&self, user_id: u64) -> Cart {
        self.carts
            .get(&user_id)
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Drop lines whose product no longer exists (or was deactivated)
    ///
    /// Returns the repaired cart and the ids that were dropped. Checkout
    /// runs this first so a stale cart shrinks instead of aborting.
    pub fn repair(&self, user_id: u64) -> (Cart, Vec<u64>) {
        let mut dropped = Vec::new();
        let mut cart = self.carts.entry(user_id).or_default();
        cart.lines.retain(|line| {
            let alive = self
                .catalog
                .get(line.product_id)
                .is_some_and(|p| p.is_active);
            if !alive {
                dropped.push(line.product_id);
            }
            alive
        });
        (cart.clone(), dropped)
    }

    /// Commit-and-clear: take the cart, leaving none behind
    pub fn take(&self, user_id: u64) -> Option<Cart> {
        self.carts.remove(&user_id).map(|(_, cart)| cart)
    }
}
