//! Payment gateway boundary
//!
//! The lifecycle engine only sees the [`PaymentGateway`] trait: create a
//! hosted session, validate a completed transaction server-to-server.
//! Redirect callbacks are never trusted on their own — the validation
//! call is the source of truth.

pub mod mock;
pub mod sslcommerz;

pub use mock::MockGateway;
pub use sslcommerz::SslCommerzGateway;

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

/// Status value the gateway's asynchronous IPN reports for a settled
/// transaction
pub const IPN_VALID_STATUS: &str = "VALID";

/// Gateway errors
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("session rejected: {0}")]
    SessionRejected(String),

    #[error("malformed gateway response: missing {0}")]
    MalformedResponse(&'static str),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Customer fields sent with a session request
///
/// Already fallback-resolved by the caller; the adapter never sees blanks.
#[derive(Debug, Clone)]
pub struct CustomerInfo {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: String,
    pub city: String,
    pub country: String,
}

/// Hosted payment session request
#[derive(Debug, Clone)]
pub struct SessionRequest {
    pub amount: Decimal,
    pub currency: String,
    /// Serialized transaction reference, echoed back on every callback
    pub tran_ref: String,
    pub success_url: String,
    pub fail_url: String,
    pub cancel_url: String,
    pub product_name: String,
    pub customer: CustomerInfo,
}

/// Hosted payment session response
#[derive(Debug, Clone)]
pub struct SessionResponse {
    /// Gateway session key — recorded as the order's transaction id
    pub session_key: String,
    /// Hosted payment page the customer is redirected to
    pub gateway_url: String,
}

/// Server-to-server validation result
#[derive(Debug, Clone)]
pub struct ValidationResponse {
    pub status: String,
    /// Transaction reference the gateway confirmed, if any
    pub tran_id: Option<String>,
}

impl ValidationResponse {
    /// Whether the gateway confirmed the transaction as settled
    pub fn is_valid(&self) -> bool {
        matches!(self.status.as_str(), "VALID" | "VALIDATED")
    }
}

/// Hosted payment gateway adapter
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a hosted payment session
    async fn create_session(&self, request: &SessionRequest) -> GatewayResult<SessionResponse>;

    /// Validate a redirect token against the gateway's own endpoint
    async fn validate_transaction(&self, val_id: &str) -> GatewayResult<ValidationResponse>;
}
