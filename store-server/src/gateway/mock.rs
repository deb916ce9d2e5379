//! Programmable gateway double
//!
//! Used by the test suites to drive every reconciliation branch without
//! network access. Responses are configured up front; every call is
//! recorded for assertion.

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    GatewayError, GatewayResult, PaymentGateway, SessionRequest, SessionResponse,
    ValidationResponse,
};

/// In-memory gateway with scripted responses
#[derive(Default)]
pub struct MockGateway {
    session_counter: Mutex<u64>,
    /// When set, the next create_session call fails with this reason
    session_failure: Mutex<Option<String>>,
    validation_status: Mutex<String>,
    validation_tran_id: Mutex<Option<String>>,
    /// Recorded session requests
    pub sessions: Mutex<Vec<SessionRequest>>,
    /// Recorded validation tokens
    pub validations: Mutex<Vec<String>>,
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            validation_status: Mutex::new("VALID".to_string()),
            ..Self::default()
        }
    }

    /// Script the validation endpoint's answer
    pub fn set_validation(&self, status: impl Into<String>, tran_id: Option<String>) {
        *self.validation_status.lock() = status.into();
        *self.validation_tran_id.lock() = tran_id;
    }

    /// Make the next session creation fail
    pub fn fail_next_session(&self, reason: impl Into<String>) {
        *self.session_failure.lock() = Some(reason.into());
    }

    /// Session keys issued so far
    pub fn sessions_created(&self) -> u64 {
        *self.session_counter.lock()
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_session(&self, request: &SessionRequest) -> GatewayResult<SessionResponse> {
        self.sessions.lock().push(request.clone());
        if let Some(reason) = self.session_failure.lock().take() {
            return Err(GatewayError::SessionRejected(reason));
        }
        let mut counter = self.session_counter.lock();
        *counter += 1;
        let session_key = format!("MOCKSESSION{:04}", *counter);
        Ok(SessionResponse {
            gateway_url: format!("https://sandbox.example.test/gw/{session_key}"),
            session_key,
        })
    }

    async fn validate_transaction(&self, val_id: &str) -> GatewayResult<ValidationResponse> {
        self.validations.lock().push(val_id.to_string());
        Ok(ValidationResponse {
            status: self.validation_status.lock().clone(),
            tran_id: self.validation_tran_id.lock().clone(),
        })
    }
}
