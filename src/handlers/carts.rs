use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::Deserialize;
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::common::{parse_product_id, success, validate_input};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(get_cart).delete(clear_cart))
        .route("/items", post(add_item).put(set_item_quantity))
        .route("/items/reduce", post(reduce_item))
        .route("/items/:product_id", delete(remove_item))
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: String,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
pub struct ReduceItemRequest {
    pub product_id: String,
}

async fn get_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.cart.get_cart(user.id).await?;
    Ok(success(cart))
}

async fn add_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let product_id = parse_product_id(&payload.product_id)?;
    let cart = state
        .services
        .cart
        .add_item(user.id, product_id, payload.quantity)
        .await?;
    Ok(success(cart))
}

async fn set_item_quantity(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let product_id = parse_product_id(&payload.product_id)?;
    let cart = state
        .services
        .cart
        .set_item_quantity(user.id, product_id, payload.quantity)
        .await?;
    Ok(success(cart))
}

async fn reduce_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<ReduceItemRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let product_id = parse_product_id(&payload.product_id)?;
    let cart = state.services.cart.reduce_item(user.id, product_id).await?;
    Ok(success(cart))
}

async fn remove_item(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let product_id = parse_product_id(&product_id)?;
    let cart = state.services.cart.remove_item(user.id, product_id).await?;
    Ok(success(cart))
}

async fn clear_cart(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ServiceError> {
    let cart = state.services.cart.clear(user.id).await?;
    Ok(success(cart))
}
