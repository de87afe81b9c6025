use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::entities::product;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Catalog management: product CRUD and stock movements.
pub struct CatalogService {
    db: Arc<DatabaseConnection>,
    events: EventSender,
}

/// Fields required to list a new product. Price is in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub price_cents: i64,
    pub currency: String,
    pub available_quantity: i32,
    pub brand: String,
    pub category: String,
    pub image_url: String,
}

/// Partial update; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub available_quantity: Option<i32>,
    pub category: Option<String>,
    pub image_url: Option<String>,
}

impl CatalogService {
    pub fn new(db: Arc<DatabaseConnection>, events: EventSender) -> Self {
        Self { db, events }
    }

    #[instrument(skip(self, input), fields(seller_id = %seller_id))]
    pub async fn create_product(
        &self,
        seller_id: Uuid,
        input: NewProduct,
    ) -> Result<product::Model, ServiceError> {
        if input.price_cents <= 0 {
            return Err(ServiceError::Validation("price must be positive".into()));
        }
        if input.available_quantity < 0 {
            return Err(ServiceError::Validation("quantity must not be negative".into()));
        }

        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            description: Set(input.description),
            price_cents: Set(input.price_cents),
            currency: Set(input.currency),
            available_quantity: Set(input.available_quantity),
            seller_id: Set(seller_id),
            brand: Set(input.brand),
            category: Set(input.category),
            image_url: Set(input.image_url),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&*self.db).await?;

        info!(product_id = %created.id, "product created");
        self.events.send_or_log(Event::ProductCreated {
            product_id: created.id,
            seller_id,
        });
        Ok(created)
    }

    /// Only the listing seller may edit a product.
    #[instrument(skip(self, update))]
    pub async fn update_product(
        &self,
        seller_id: Uuid,
        product_id: Uuid,
        update: ProductUpdate,
    ) -> Result<product::Model, ServiceError> {
        let existing = product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::ProductNotFound)?;

        if existing.seller_id != seller_id {
            return Err(ServiceError::Forbidden(
                "product belongs to another seller".into(),
            ));
        }
        if matches!(update.price_cents, Some(p) if p <= 0) {
            return Err(ServiceError::Validation("price must be positive".into()));
        }
        if matches!(update.available_quantity, Some(q) if q < 0) {
            return Err(ServiceError::Validation("quantity must not be negative".into()));
        }

        let mut model: product::ActiveModel = existing.into();
        if let Some(name) = update.name {
            model.name = Set(name);
        }
        if let Some(description) = update.description {
            model.description = Set(description);
        }
        if let Some(price_cents) = update.price_cents {
            model.price_cents = Set(price_cents);
        }
        if let Some(quantity) = update.available_quantity {
            model.available_quantity = Set(quantity);
        }
        if let Some(category) = update.category {
            model.category = Set(category);
        }
        if let Some(image_url) = update.image_url {
            model.image_url = Set(image_url);
        }
        model.updated_at = Set(Utc::now());
        let updated = model.update(&*self.db).await?;

        self.events
            .send_or_log(Event::ProductUpdated { product_id });
        Ok(updated)
    }

    pub async fn get_product(&self, product_id: Uuid) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(product_id)
            .one(&*self.db)
            .await?
            .ok_or(ServiceError::ProductNotFound)
    }

    /// Newest listings first.
    pub async fn list_products(&self) -> Result<Vec<product::Model>, ServiceError> {
        Ok(product::Entity::find()
            .order_by_desc(product::Column::CreatedAt)
            .all(&*self.db)
            .await?)
    }
}

/// Decrement a product's stock as part of payment settlement.
///
/// The decrement is conditional: it only applies when enough stock remains,
/// which keeps `available_quantity` non-negative under concurrent
/// settlements. When the captured quantity exceeds what is left (the stock
/// was oversold between checkout and capture), stock is clamped to zero
/// rather than failing the settlement.
pub async fn decrement_stock<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
    quantity: i32,
) -> Result<(), ServiceError> {
    let result = product::Entity::update_many()
        .col_expr(
            product::Column::AvailableQuantity,
            Expr::col(product::Column::AvailableQuantity).sub(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::AvailableQuantity.gte(quantity))
        .exec(conn)
        .await?;

    if result.rows_affected == 0 {
        warn!(%product_id, quantity, "stock undershoot during settlement, clamping to zero");
        product::Entity::update_many()
            .col_expr(product::Column::AvailableQuantity, Expr::value(0))
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(product_id))
            .exec(conn)
            .await?;
    }
    Ok(())
}
