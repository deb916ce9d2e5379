//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`cart`] - 购物车接口
//! - [`checkout`] - 结算接口
//! - [`payment`] - 支付发起与网关回调
//! - [`orders`] - 订单查询/取消接口
//!
//! Actor identity comes from the [`CurrentUser`] extractor; authentication
//! itself happens upstream and is out of scope here.

pub mod auth;
pub mod cart;
pub mod checkout;
pub mod health;
pub mod orders;
pub mod payment;

pub use auth::CurrentUser;

use axum::Router;

use crate::core::ServerState;

/// Assemble the full API router
pub fn router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(cart::router())
        .merge(checkout::router())
        .merge(payment::router())
        .merge(orders::router())
}
