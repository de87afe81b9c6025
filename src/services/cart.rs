use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, Set, TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::entities::{cart, cart_item, product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};

/// Cart mutations and reads.
///
/// Every mutation runs in a transaction and finishes by recomputing the cart
/// total from live product prices. The final total write is guarded by the
/// cart's version column: if another request mutated the cart in between,
/// the write matches zero rows and the whole transaction rolls back with a
/// conflict, so lost updates cannot corrupt the total.
pub struct CartService {
    db: Arc<DatabaseConnection>,
    events: EventSender,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartView {
    pub id: Uuid,
    pub total_cents: i64,
    pub items: Vec<CartItemView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartItemView {
    pub product_id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub image_url: String,
    pub quantity: i32,
    pub line_total_cents: i64,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>, events: EventSender) -> Self {
        Self { db, events }
    }

    /// Add `quantity` units of a product, merging into an existing line.
    /// The combined line quantity must be coverable by current stock.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::Validation("quantity must be at least 1".into()));
        }

        let txn = self.db.begin().await?;
        let cart = get_or_create_cart(&txn, user_id).await?;
        let product = load_product(&txn, product_id).await?;

        let existing = find_line(&txn, cart.id, product_id).await?;
        let requested = existing.as_ref().map_or(0, |l| l.quantity) + quantity;
        check_stock(&product, requested)?;

        upsert_line(&txn, cart.id, product_id, requested, existing).await?;
        let view = self.finalize(&txn, &cart).await?;
        txn.commit().await?;

        self.events.send_or_log(Event::CartUpdated {
            cart_id: view.id,
            user_id,
            total_cents: view.total_cents,
        });
        Ok(view)
    }

    /// Set a line to an exact quantity, creating the line if absent.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn set_item_quantity(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        if quantity < 1 {
            return Err(ServiceError::Validation("quantity must be at least 1".into()));
        }

        let txn = self.db.begin().await?;
        let cart = get_or_create_cart(&txn, user_id).await?;
        let product = load_product(&txn, product_id).await?;
        check_stock(&product, quantity)?;

        let existing = find_line(&txn, cart.id, product_id).await?;
        upsert_line(&txn, cart.id, product_id, quantity, existing).await?;
        let view = self.finalize(&txn, &cart).await?;
        txn.commit().await?;

        self.events.send_or_log(Event::CartUpdated {
            cart_id: view.id,
            user_id,
            total_cents: view.total_cents,
        });
        Ok(view)
    }

    /// Reduce a line by one unit; the line is removed when it reaches zero.
    /// If stock has shrunk below the line quantity since it was added, the
    /// line is clamped down to what stock can still cover. Reducing a
    /// product not in the cart is a no-op.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn reduce_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = get_or_create_cart(&txn, user_id).await?;

        let Some(line) = find_line(&txn, cart.id, product_id).await? else {
            debug!(%product_id, "reduce on absent line, no-op");
            let view = read_view(&txn, &cart).await?;
            txn.commit().await?;
            return Ok(view);
        };

        let product = load_product(&txn, product_id).await?;
        let new_quantity = (line.quantity - 1).min(product.available_quantity);
        if new_quantity < 1 {
            cart_item::Entity::delete_by_id(line.id).exec(&txn).await?;
        } else {
            let mut model: cart_item::ActiveModel = line.into();
            model.quantity = Set(new_quantity);
            model.updated_at = Set(Utc::now());
            model.update(&txn).await?;
        }

        let view = self.finalize(&txn, &cart).await?;
        txn.commit().await?;

        self.events.send_or_log(Event::CartUpdated {
            cart_id: view.id,
            user_id,
            total_cents: view.total_cents,
        });
        Ok(view)
    }

    /// Remove a line entirely. Removing an absent product is a no-op.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn remove_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = get_or_create_cart(&txn, user_id).await?;

        let Some(line) = find_line(&txn, cart.id, product_id).await? else {
            let view = read_view(&txn, &cart).await?;
            txn.commit().await?;
            return Ok(view);
        };
        cart_item::Entity::delete_by_id(line.id).exec(&txn).await?;

        let view = self.finalize(&txn, &cart).await?;
        txn.commit().await?;

        self.events.send_or_log(Event::CartUpdated {
            cart_id: view.id,
            user_id,
            total_cents: view.total_cents,
        });
        Ok(view)
    }

    /// Drop every line and reset the total.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let txn = self.db.begin().await?;
        let cart = get_or_create_cart(&txn, user_id).await?;

        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;

        let view = self.finalize(&txn, &cart).await?;
        txn.commit().await?;

        self.events.send_or_log(Event::CartCleared {
            cart_id: view.id,
            user_id,
        });
        Ok(view)
    }

    /// Read the cart, pricing lines from the live catalog. The stored total
    /// is not trusted on reads; lines whose product has disappeared are
    /// simply not shown.
    pub async fn get_cart(&self, user_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = get_or_create_cart(&*self.db, user_id).await?;
        read_view(&*self.db, &cart).await
    }

    /// Recompute the total from live prices, prune orphaned lines, and write
    /// the total back under the version guard.
    async fn finalize<C: ConnectionTrait>(
        &self,
        conn: &C,
        cart: &cart::Model,
    ) -> Result<CartView, ServiceError> {
        let lines = load_lines(conn, cart.id).await?;
        let mut total = 0i64;
        let mut items = Vec::with_capacity(lines.len());

        for (line, product) in lines {
            match product {
                Some(p) => {
                    let line_total = p.price_cents * i64::from(line.quantity);
                    total += line_total;
                    items.push(CartItemView {
                        product_id: p.id,
                        name: p.name,
                        price_cents: p.price_cents,
                        image_url: p.image_url,
                        quantity: line.quantity,
                        line_total_cents: line_total,
                    });
                }
                None => {
                    // product deleted from the catalog since it was added
                    cart_item::Entity::delete_by_id(line.id).exec(conn).await?;
                }
            }
        }

        let result = cart::Entity::update_many()
            .col_expr(cart::Column::TotalCents, Expr::value(total))
            .col_expr(
                cart::Column::Version,
                Expr::col(cart::Column::Version).add(1),
            )
            .col_expr(cart::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(cart::Column::Id.eq(cart.id))
            .filter(cart::Column::Version.eq(cart.version))
            .exec(conn)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(
                "cart was modified concurrently, retry the request".into(),
            ));
        }

        Ok(CartView {
            id: cart.id,
            total_cents: total,
            items,
        })
    }
}

async fn get_or_create_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<cart::Model, ServiceError> {
    if let Some(existing) = cart::Entity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .one(conn)
        .await?
    {
        return Ok(existing);
    }
    create_cart(conn, user_id).await
}

/// First-time cart creation. Two concurrent first mutations for the same
/// user can both miss the lookup; the insert ignores the unique user_id
/// conflict and the loser reselects the winner's row.
async fn create_cart<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
) -> Result<cart::Model, ServiceError> {
    let now = Utc::now();
    let model = cart::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        total_cents: Set(0),
        version: Set(0),
        created_at: Set(now),
        updated_at: Set(now),
    };

    match cart::Entity::insert(model)
        .on_conflict(
            OnConflict::column(cart::Column::UserId)
                .do_nothing()
                .to_owned(),
        )
        .exec(conn)
        .await
    {
        Ok(_) | Err(DbErr::RecordNotInserted) => {}
        Err(e) => return Err(e.into()),
    }

    cart::Entity::find()
        .filter(cart::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or_else(|| ServiceError::Internal("cart row missing after insert".into()))
}

async fn load_product<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> Result<product::Model, ServiceError> {
    product::Entity::find_by_id(product_id)
        .one(conn)
        .await?
        .ok_or(ServiceError::ProductNotFound)
}

async fn find_line<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
    product_id: Uuid,
) -> Result<Option<cart_item::Model>, ServiceError> {
    Ok(cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .filter(cart_item::Column::ProductId.eq(product_id))
        .one(conn)
        .await?)
}

async fn load_lines<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
) -> Result<Vec<(cart_item::Model, Option<product::Model>)>, ServiceError> {
    Ok(cart_item::Entity::find()
        .filter(cart_item::Column::CartId.eq(cart_id))
        .find_also_related(product::Entity)
        .all(conn)
        .await?)
}

async fn upsert_line<C: ConnectionTrait>(
    conn: &C,
    cart_id: Uuid,
    product_id: Uuid,
    quantity: i32,
    existing: Option<cart_item::Model>,
) -> Result<(), ServiceError> {
    let now = Utc::now();
    match existing {
        Some(line) => {
            let mut model: cart_item::ActiveModel = line.into();
            model.quantity = Set(quantity);
            model.updated_at = Set(now);
            model.update(conn).await?;
        }
        None => {
            let model = cart_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                cart_id: Set(cart_id),
                product_id: Set(product_id),
                quantity: Set(quantity),
                created_at: Set(now),
                updated_at: Set(now),
            };
            model.insert(conn).await?;
        }
    }
    Ok(())
}

fn check_stock(product: &product::Model, requested: i32) -> Result<(), ServiceError> {
    if product.available_quantity == 0 {
        return Err(ServiceError::OutOfStock {
            name: product.name.clone(),
        });
    }
    if requested > product.available_quantity {
        return Err(ServiceError::InsufficientStock {
            name: product.name.clone(),
            available: product.available_quantity,
        });
    }
    Ok(())
}

/// Build a view without touching the version or stored total.
async fn read_view<C: ConnectionTrait>(
    conn: &C,
    cart: &cart::Model,
) -> Result<CartView, ServiceError> {
    let lines = load_lines(conn, cart.id).await?;
    let mut total = 0i64;
    let mut items = Vec::with_capacity(lines.len());
    for (line, product) in lines {
        if let Some(p) = product {
            let line_total = p.price_cents * i64::from(line.quantity);
            total += line_total;
            items.push(CartItemView {
                product_id: p.id,
                name: p.name,
                price_cents: p.price_cents,
                image_url: p.image_url,
                quantity: line.quantity,
                line_total_cents: line_total,
            });
        }
    }
    Ok(CartView {
        id: cart.id,
        total_cents: total,
        items,
    })
}
