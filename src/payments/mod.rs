//! Payment gateway integration.
//!
//! Checkout creates a payment intent at the gateway before an order is
//! persisted; settlement arrives later over the webhook. The gateway is a
//! trait so tests and local development can run against an in-process fake.

pub mod signature;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::errors::ServiceError;

/// A payment intent registered with the gateway for a pending order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    /// Gateway-assigned order identifier, echoed back in webhook callbacks.
    pub external_order_id: String,
    pub amount_cents: i64,
    pub currency: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Register an intent to collect `amount_cents` in `currency`.
    /// `receipt` is an opaque merchant reference stored gateway-side.
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<PaymentIntent, ServiceError>;
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    payment_capture: u8,
}

#[derive(Deserialize)]
struct GatewayOrder {
    id: String,
    amount: i64,
    currency: String,
}

/// HTTP client for a Razorpay-style orders API, authenticated with basic
/// auth over the key pair.
pub struct HttpPaymentGateway {
    client: Client,
    base_url: String,
    key_id: String,
    key_secret: String,
}

impl HttpPaymentGateway {
    pub fn new(
        base_url: String,
        key_id: String,
        key_secret: String,
        timeout: Duration,
    ) -> Result<Self, ServiceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Internal(format!("failed to build http client: {}", e)))?;
        Ok(Self {
            client,
            base_url,
            key_id,
            key_secret,
        })
    }
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_intent(
        &self,
        amount_cents: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<PaymentIntent, ServiceError> {
        let url = format!("{}/orders", self.base_url);
        let request = CreateOrderRequest {
            amount: amount_cents,
            currency,
            receipt,
            // instruct the gateway to capture automatically on authorization
            payment_capture: 1,
        };

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&request)
            .send()
            .await
            .map_err(|e| ServiceError::PaymentGateway(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ServiceError::PaymentGateway(format!(
                "gateway returned {}: {}",
                status, body
            )));
        }

        let order: GatewayOrder = response
            .json()
            .await
            .map_err(|e| ServiceError::PaymentGateway(format!("invalid response: {}", e)))?;

        Ok(PaymentIntent {
            external_order_id: order.id,
            amount_cents: order.amount,
            currency: order.currency,
        })
    }
}

/// Webhook envelope delivered by the gateway. Fields beyond what settlement
/// needs are ignored on deserialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    pub payload: WebhookPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookPayload {
    pub payment: PaymentWrapper,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentWrapper {
    pub entity: PaymentEntity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentEntity {
    /// The gateway order this payment belongs to.
    pub order_id: String,
    pub captured: bool,
    #[serde(default)]
    pub amount: i64,
    #[serde(default)]
    pub currency: String,
}
