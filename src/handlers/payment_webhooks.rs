//! Payment gateway webhook endpoint.
//!
//! The gateway treats any non-2xx response as a delivery failure and
//! retries, so this endpoint always answers 200 once the request reaches
//! the handler. Invalid signatures, unparseable bodies, and settlement
//! errors are logged and acknowledged; settlement idempotency makes
//! redeliveries safe.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::json;
use tracing::{error, info, warn};

use crate::payments::signature;
use crate::payments::WebhookEvent;
use crate::services::checkout::SettlementOutcome;
use crate::AppState;

const SIGNATURE_HEADER: &str = "x-razorpay-signature";

pub fn routes() -> Router<AppState> {
    Router::new().route("/webhook", post(handle_webhook))
}

async fn handle_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> impl IntoResponse {
    let acknowledged = Json(json!({ "status": "ok" }));

    let Some(sig) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        warn!("webhook without signature header");
        return acknowledged;
    };

    if !signature::verify(&body, sig, &state.config.payment_webhook_secret) {
        warn!("webhook signature verification failed");
        return acknowledged;
    }

    let event: WebhookEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!(error = %e, "webhook body failed to parse");
            return acknowledged;
        }
    };

    match state.services.checkout.settle_payment(&event).await {
        Ok(SettlementOutcome::Settled { order_id }) => {
            info!(%order_id, "webhook settled order");
        }
        Ok(SettlementOutcome::AlreadySettled) => {
            info!("webhook redelivery for settled order");
        }
        Ok(SettlementOutcome::Ignored) => {
            info!(event_type = %event.event, "webhook event ignored");
        }
        Err(e) => {
            // acknowledged anyway; the gateway's retry would hit the same error
            error!(error = %e, "webhook settlement failed");
        }
    }

    acknowledged
}
