//! 统一错误处理
//!
//! 提供应用级错误类型和响应结构：
//! - [`AppError`] - 应用错误枚举
//! - [`AppResponse`] - API 错误响应结构
//!
//! # 错误码规范
//!
//! | 前缀 | 分类 | 示例 |
//! |------|------|------|
//! | E0xxx | 业务错误 | E0003 资源不存在 |
//! | E3xxx | 认证错误 | E3001 未登录 |
//! | E8xxx | 网关错误 | E8001 支付网关失败 |
//! | E9xxx | 系统错误 | E9002 数据库错误 |
//!
//! Customer-facing responses never carry raw internals; database and
//! internal errors are logged here and replaced by a generic message.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::gateway::GatewayError;
use crate::orders::manager::ManagerError;
use crate::store::StoreError;

/// API 统一错误响应结构
///
/// ```json
/// {
///   "code": "E0003",
///   "message": "Order 42 not found"
/// }
/// ```
#[derive(Debug, Serialize)]
pub struct AppResponse<T> {
    /// 错误码
    pub code: String,
    /// 消息
    pub message: String,
    /// 响应数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

/// 应用错误枚举
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== 认证错误 (4xx) ==========
    #[error("Authentication required")]
    /// 未登录 (401)
    Unauthorized,

    // ========== 业务逻辑错误 (4xx) ==========
    #[error("Resource not found: {0}")]
    /// 资源不存在 (404)
    NotFound(String),

    #[error("Resource conflict: {0}")]
    /// 资源冲突 (409)
    Conflict(String),

    #[error("Validation failed: {0}")]
    /// 验证失败 (400)
    Validation(String),

    #[error("Business rule violation: {0}")]
    /// 业务规则违反 (422)
    BusinessRule(String),

    // ========== 网关错误 (5xx) ==========
    #[error("Payment gateway error: {0}")]
    /// 支付网关失败 (502)
    Gateway(String),

    // ========== 系统错误 (5xx) ==========
    #[error("Database error: {0}")]
    /// 数据库错误 (500)
    Database(String),

    #[error("Internal server error: {0}")]
    /// 内部错误 (500)
    Internal(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "E3001", "Please login first"),

            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "E0003", msg.as_str()),

            AppError::Conflict(msg) => (StatusCode::CONFLICT, "E0004", msg.as_str()),

            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "E0002", msg.as_str()),

            AppError::BusinessRule(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "E0005", msg.as_str())
            }

            AppError::Gateway(msg) => (StatusCode::BAD_GATEWAY, "E8001", msg.as_str()),

            AppError::Database(msg) => {
                error!(target: "database", error = %msg, "Database error occurred");
                (StatusCode::INTERNAL_SERVER_ERROR, "E9002", "Database error")
            }

            AppError::Internal(msg) => {
                error!(target: "internal", error = %msg, "Internal error occurred");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "E9001",
                    "Internal server error",
                )
            }
        };

        let body = Json(AppResponse::<()> {
            code: code.to_string(),
            message: message.to_string(),
            data: None,
        });

        (status, body).into_response()
    }
}

// ========== Helper Constructors ==========

impl AppError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn business_rule(msg: impl Into<String>) -> Self {
        Self::BusinessRule(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

// ========== Layer Conversions ==========

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OrderNotFound(id) => AppError::NotFound(format!("Order {id} not found")),
            StoreError::DuplicateOrderNumber(n) => {
                AppError::Conflict(format!("Order number {n} already taken"))
            }
            StoreError::DuplicateTransaction(t) => {
                AppError::Conflict(format!("Transaction {t} already recorded"))
            }
            StoreError::DailySequenceExhausted(_) => AppError::BusinessRule(
                "Daily order limit reached, please try again tomorrow".to_string(),
            ),
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<GatewayError> for AppError {
    fn from(err: GatewayError) -> Self {
        AppError::Gateway(format!("Payment gateway error: {err}"))
    }
}

impl From<ManagerError> for AppError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::Store(e) => e.into(),
            ManagerError::Gateway(e) => e.into(),
            ManagerError::EmptyCart => AppError::Validation("Cart is empty".to_string()),
            ManagerError::OrderNotFound(id) => {
                AppError::NotFound(format!("Order {id} not found"))
            }
            ManagerError::OrderCancelled(_) => AppError::BusinessRule(
                "This order has been cancelled and can no longer be paid for. Please place a new order."
                    .to_string(),
            ),
            ManagerError::OrderAlreadyCompleted(_) => {
                AppError::BusinessRule("This order is already paid".to_string())
            }
            ManagerError::CannotCancel(_) => {
                AppError::BusinessRule("This order cannot be cancelled".to_string())
            }
        }
    }
}

/// Result type for API handlers
pub type AppResult<T> = Result<T, AppError>;
