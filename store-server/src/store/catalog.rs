//! Catalog Service — product and campaign lookup with a stock mutation hook
//!
//! The order engine treats the catalog as a collaborator: read access for
//! pricing at add-to-cart time, and a synchronous stock hook called exactly
//! once per order line at creation. Stock transitions publish
//! [`StoreEvent`]s; the catalog never talks to the notification medium
//! directly.

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::order::event::StoreEvent;
use std::collections::HashMap;
use thiserror::Error;
use tokio::sync::broadcast;

/// Catalog product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: u64,
    pub name: String,
    /// List price, 2 decimal places
    pub price: Decimal,
    pub stock: i64,
    pub is_active: bool,
}

/// Promotional campaign
///
/// Open-ended when a bound is `None`: no start means already started, no
/// end means it runs forever.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Campaign {
    pub id: u64,
    pub title: String,
    /// Percentage off list price (0-100)
    pub discount_percent: u32,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub is_active: bool,
    pub product_ids: Vec<u64>,
}

impl Campaign {
    pub fn is_running(&self, now: i64) -> bool {
        let started = self.start_time.is_none_or(|start| now >= start);
        let not_ended = self.end_time.is_none_or(|end| now <= end);
        self.is_active && started && not_ended
    }
}

/// Catalog errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Product not found: {0}")]
    NotFound(u64),
}

/// In-memory catalog with stock event emission
pub struct CatalogService {
    products: RwLock<HashMap<u64, Product>>,
    campaigns: RwLock<Vec<Campaign>>,
    events: broadcast::Sender<StoreEvent>,
    low_stock_threshold: i64,
}

impl CatalogService {
    pub fn new(events: broadcast::Sender<StoreEvent>, low_stock_threshold: i64) -> Self {
        Self {
            products: RwLock::new(HashMap::new()),
            campaigns: RwLock::new(Vec::new()),
            events,
            low_stock_threshold,
        }
    }

    // ========== Products ==========

    pub fn upsert_product(&self, product: Product) {
        self.products.write().insert(product.id, product);
    }

    pub fn remove_product(&self, id: u64) {
        self.products.write().remove(&id);
    }

    pub fn get(&self, id: u64) -> Option<Product> {
        self.products.read().get(&id).cloned()
    }

    /// Price after the best currently-running campaign discount, 2 dp
    ///
    /// Callers capture this at add-to-cart time; a campaign ending later
    /// never re-prices an existing cart line or order.
    pub fn effective_price(&self, product_id: u64, now: i64) -> Option<Decimal> {
        let product = self.get(product_id)?;
        let best_discount = self
            .campaigns
            .read()
            .iter()
            .filter(|c| c.is_running(now) && c.product_ids.contains(&product_id))
            .map(|c| c.discount_percent.min(100))
            .max()
            .unwrap_or(0);
        let factor = Decimal::from(100 - best_discount) / Decimal::from(100);
        Some((product.price * factor).round_dp(2))
    }

    // ========== Campaigns ==========

    pub fn upsert_campaign(&self, campaign: Campaign) {
        let mut campaigns = self.campaigns.write();
        if let Some(existing) = campaigns.iter_mut().find(|c| c.id == campaign.id) {
            *existing = campaign;
        } else {
            campaigns.push(campaign);
        }
    }

    // ========== Stock ==========

    /// Adjust stock by a signed delta and return the new level
    ///
    /// Called exactly once per order line at order creation (negative
    /// delta) and by restocking (positive delta). Threshold crossings
    /// publish LowStock / StockDepleted / StockReplenished.
    pub fn adjust_stock(&self, product_id: u64, delta: i64) -> Result<i64, CatalogError> {
        let (name, old_stock, new_stock) = {
            let mut products = self.products.write();
            let product = products
                .get_mut(&product_id)
                .ok_or(CatalogError::NotFound(product_id))?;
            let old = product.stock;
            product.stock += delta;
            (product.name.clone(), old, product.stock)
        };

        if delta < 0 {
            if new_stock <= 0 {
                let _ = self.events.send(StoreEvent::StockDepleted {
                    product_id,
                    name: name.clone(),
                });
            } else if new_stock < self.low_stock_threshold {
                let _ = self.events.send(StoreEvent::LowStock {
                    product_id,
                    name: name.clone(),
                    stock: new_stock,
                });
            }
        } else if delta > 0 && old_stock <= 0 && new_stock > 0 {
            let _ = self.events.send(StoreEvent::StockReplenished {
                product_id,
                name,
                stock: new_stock,
            });
        }

        Ok(new_stock)
    }
}
