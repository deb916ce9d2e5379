//! SSLCommerz integration via REST API (no SDK dependency)
//!
//! Two endpoints: session creation (`gwprocess/v4/api.php`, form POST) and
//! transaction validation (`validator/api/validationserverAPI.php`, GET).
//! Sandbox and live hosts differ; credentials come from configuration.

use async_trait::async_trait;

use super::{
    GatewayError, GatewayResult, PaymentGateway, SessionRequest, SessionResponse,
    ValidationResponse,
};

const SANDBOX_SESSION_URL: &str = "https://sandbox.sslcommerz.com/gwprocess/v4/api.php";
const LIVE_SESSION_URL: &str = "https://securepay.sslcommerz.com/gwprocess/v4/api.php";
const SANDBOX_VALIDATION_URL: &str =
    "https://sandbox.sslcommerz.com/validator/api/validationserverAPI.php";
const LIVE_VALIDATION_URL: &str =
    "https://securepay.sslcommerz.com/validator/api/validationserverAPI.php";

/// SSLCommerz hosted-checkout adapter
pub struct SslCommerzGateway {
    store_id: String,
    store_pass: String,
    sandbox: bool,
    client: reqwest::Client,
}

impl SslCommerzGateway {
    pub fn new(store_id: impl Into<String>, store_pass: impl Into<String>, sandbox: bool) -> Self {
        Self {
            store_id: store_id.into(),
            store_pass: store_pass.into(),
            sandbox,
            client: reqwest::Client::new(),
        }
    }

    fn session_url(&self) -> &'static str {
        if self.sandbox {
            SANDBOX_SESSION_URL
        } else {
            LIVE_SESSION_URL
        }
    }

    fn validation_url(&self) -> &'static str {
        if self.sandbox {
            SANDBOX_VALIDATION_URL
        } else {
            LIVE_VALIDATION_URL
        }
    }
}

#[async_trait]
impl PaymentGateway for SslCommerzGateway {
    async fn create_session(&self, request: &SessionRequest) -> GatewayResult<SessionResponse> {
        let amount = format!("{:.2}", request.amount);
        let response: serde_json::Value = self
            .client
            .post(self.session_url())
            .form(&[
                ("store_id", self.store_id.as_str()),
                ("store_passwd", self.store_pass.as_str()),
                ("total_amount", amount.as_str()),
                ("currency", request.currency.as_str()),
                ("tran_id", request.tran_ref.as_str()),
                ("success_url", request.success_url.as_str()),
                ("fail_url", request.fail_url.as_str()),
                ("cancel_url", request.cancel_url.as_str()),
                ("emi_option", "0"),
                ("cus_name", request.customer.name.as_str()),
                ("cus_email", request.customer.email.as_str()),
                ("cus_phone", request.customer.phone.as_str()),
                ("cus_add1", request.customer.address.as_str()),
                ("cus_city", request.customer.city.as_str()),
                ("cus_country", request.customer.country.as_str()),
                ("shipping_method", "NO"),
                ("num_of_item", "1"),
                ("product_name", request.product_name.as_str()),
                ("product_category", "Online"),
                ("product_profile", "general"),
            ])
            .send()
            .await?
            .json()
            .await?;

        if response["status"].as_str() != Some("SUCCESS") {
            let reason = response["failedreason"]
                .as_str()
                .unwrap_or("unknown")
                .to_string();
            return Err(GatewayError::SessionRejected(reason));
        }

        let session_key = response["sessionkey"]
            .as_str()
            .ok_or(GatewayError::MalformedResponse("sessionkey"))?
            .to_string();
        let gateway_url = response["GatewayPageURL"]
            .as_str()
            .ok_or(GatewayError::MalformedResponse("GatewayPageURL"))?
            .to_string();

        Ok(SessionResponse {
            session_key,
            gateway_url,
        })
    }

    async fn validate_transaction(&self, val_id: &str) -> GatewayResult<ValidationResponse> {
        let response: serde_json::Value = self
            .client
            .get(self.validation_url())
            .query(&[
                ("val_id", val_id),
                ("store_id", self.store_id.as_str()),
                ("store_passwd", self.store_pass.as_str()),
                ("format", "json"),
                ("v", "1"),
            ])
            .send()
            .await?
            .json()
            .await?;

        let status = response["status"]
            .as_str()
            .ok_or(GatewayError::MalformedResponse("status"))?
            .to_string();
        let tran_id = response["tran_id"].as_str().map(String::from);

        Ok(ValidationResponse { status, tran_id })
    }
}
