use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use validator::Validate;

use crate::auth::AuthenticatedUser;
use crate::errors::ServiceError;
use crate::handlers::common::{created, parse_product_id, success, validate_input};
use crate::services::catalog::{NewProduct, ProductUpdate};
use crate::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/:product_id", get(get_product).put(update_product))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1))]
    pub description: String,
    #[validate(range(min = 1))]
    pub price_cents: i64,
    #[validate(range(min = 0))]
    pub available_quantity: i32,
    #[validate(length(min = 1, max = 100))]
    pub brand: String,
    #[validate(length(min = 1, max = 100))]
    pub category: String,
    #[validate(url)]
    pub image_url: String,
    /// Defaults to the store currency when omitted.
    pub currency: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1))]
    pub description: Option<String>,
    #[validate(range(min = 1))]
    pub price_cents: Option<i64>,
    #[validate(range(min = 0))]
    pub available_quantity: Option<i32>,
    #[validate(length(min = 1, max = 100))]
    pub category: Option<String>,
    #[validate(url)]
    pub image_url: Option<String>,
}

async fn list_products(State(state): State<AppState>) -> Result<impl IntoResponse, ServiceError> {
    let products = state.services.catalog.list_products().await?;
    Ok(success(products))
}

async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<String>,
) -> Result<impl IntoResponse, ServiceError> {
    let id = parse_product_id(&product_id)?;
    let product = state.services.catalog.get_product(id).await?;
    Ok(success(product))
}

async fn create_product(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let input = NewProduct {
        name: payload.name,
        description: payload.description,
        price_cents: payload.price_cents,
        currency: payload
            .currency
            .unwrap_or_else(|| state.config.currency.clone()),
        available_quantity: payload.available_quantity,
        brand: payload.brand,
        category: payload.category,
        image_url: payload.image_url,
    };
    let product = state.services.catalog.create_product(user.id, input).await?;
    Ok(created(product))
}

async fn update_product(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(product_id): Path<String>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    validate_input(&payload)?;
    let id = parse_product_id(&product_id)?;
    let update = ProductUpdate {
        name: payload.name,
        description: payload.description,
        price_cents: payload.price_cents,
        available_quantity: payload.available_quantity,
        category: payload.category,
        image_url: payload.image_url,
    };
    let product = state
        .services
        .catalog
        .update_product(user.id, id, update)
        .await?;
    Ok(success(product))
}
