use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Serialize;

use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::common::{created, success};
use crate::services::checkout::OrderView;
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders).post(create_order))
        .route("/:external_order_id", get(get_order))
}

/// Checkout response: the order plus what the frontend needs to open the
/// gateway's payment widget.
#[derive(Debug, Serialize)]
struct CheckoutResponse {
    order: OrderView,
    amount_cents: i64,
    currency: String,
    key_id: String,
}

async fn create_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.checkout.create_order(&user).await?;
    let response = CheckoutResponse {
        amount_cents: order.total_cents,
        currency: order.currency.clone(),
        key_id: state.config.payment_key_id.clone(),
        order,
    };
    Ok(created(response))
}

async fn list_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let orders = state.services.checkout.list_orders(&user).await?;
    Ok(success(orders))
}

async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(external_order_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state
        .services
        .checkout
        .get_order(&user, &external_order_id)
        .await?;
    Ok(success(order))
}
