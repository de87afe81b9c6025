use chrono::{DateTime, Duration, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::entities::{cart, cart_item, order, order_item, product};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::payments::{PaymentGateway, WebhookEvent};
use crate::services::catalog;

/// Checkout orchestration: turns a cart into an order with a payment intent,
/// and settles orders when the gateway confirms capture.
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    gateway: Arc<dyn PaymentGateway>,
    events: EventSender,
    currency: String,
    retention_days: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    pub id: Uuid,
    pub external_order_id: String,
    pub receipt: String,
    pub total_cents: i64,
    pub currency: String,
    pub is_paid: bool,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderItemView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderItemView {
    pub product_id: Uuid,
    pub name: String,
    pub price_cents: i64,
    pub brand: String,
    pub image_url: String,
    pub quantity: i32,
}

/// What a settlement attempt did. Webhook delivery is at-least-once, so
/// redeliveries and unknown orders are expected outcomes, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// The order was marked paid and stock was decremented.
    Settled { order_id: Uuid },
    /// The order was already paid; nothing changed.
    AlreadySettled,
    /// Not a capture event, or no matching order.
    Ignored,
}

impl CheckoutService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        gateway: Arc<dyn PaymentGateway>,
        events: EventSender,
        currency: String,
        retention_days: i64,
    ) -> Self {
        Self {
            db,
            gateway,
            events,
            currency,
            retention_days,
        }
    }

    /// Create an order from the caller's cart.
    ///
    /// The cart is snapshotted line by line, a payment intent is registered
    /// with the gateway, and the order plus its items are persisted and the
    /// cart emptied in one transaction. A gateway failure aborts the whole
    /// attempt and leaves the cart untouched. Stock is checked here but not
    /// reserved; the decrement happens at settlement.
    #[instrument(skip(self, user), fields(user_id = %user.id))]
    pub async fn create_order(&self, user: &AuthenticatedUser) -> Result<OrderView, ServiceError> {
        let txn = self.db.begin().await?;

        let cart = cart::Entity::find()
            .filter(cart::Column::UserId.eq(user.id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::InvalidOperation("cart is empty".into()))?;

        let lines = cart_item::Entity::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .find_also_related(product::Entity)
            .all(&txn)
            .await?;
        if lines.is_empty() {
            return Err(ServiceError::InvalidOperation("cart is empty".into()));
        }

        let mut total = 0i64;
        let mut snapshots = Vec::with_capacity(lines.len());
        for (line, maybe_product) in lines {
            let product = maybe_product.ok_or(ServiceError::ProductNotFound)?;
            if product.available_quantity == 0 {
                return Err(ServiceError::OutOfStock { name: product.name });
            }
            if line.quantity > product.available_quantity {
                return Err(ServiceError::InsufficientStock {
                    name: product.name,
                    available: product.available_quantity,
                });
            }
            total += product.price_cents * i64::from(line.quantity);
            snapshots.push((product, line.quantity));
        }

        let receipt = make_receipt(&user.name);
        let intent = self
            .gateway
            .create_intent(total, &self.currency, &receipt)
            .await?;

        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let new_order = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(user.id),
            user_email: Set(user.email.clone()),
            user_name: Set(user.name.clone()),
            total_cents: Set(total),
            currency: Set(self.currency.clone()),
            is_paid: Set(false),
            external_order_id: Set(intent.external_order_id.clone()),
            receipt: Set(receipt.clone()),
            expires_at: Set(now + Duration::days(self.retention_days)),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = new_order.insert(&txn).await?;

        let mut item_views = Vec::with_capacity(snapshots.len());
        for (product, quantity) in snapshots {
            let item = order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                name: Set(product.name.clone()),
                price_cents: Set(product.price_cents),
                brand: Set(product.brand.clone()),
                image_url: Set(product.image_url.clone()),
                quantity: Set(quantity),
                created_at: Set(now),
            };
            item.insert(&txn).await?;
            item_views.push(OrderItemView {
                product_id: product.id,
                name: product.name,
                price_cents: product.price_cents,
                brand: product.brand,
                image_url: product.image_url,
                quantity,
            });
        }

        // empty the cart under the version guard
        cart_item::Entity::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;
        let cleared = cart::Entity::update_many()
            .col_expr(cart::Column::TotalCents, Expr::value(0i64))
            .col_expr(
                cart::Column::Version,
                Expr::col(cart::Column::Version).add(1),
            )
            .col_expr(cart::Column::UpdatedAt, Expr::value(now))
            .filter(cart::Column::Id.eq(cart.id))
            .filter(cart::Column::Version.eq(cart.version))
            .exec(&txn)
            .await?;
        if cleared.rows_affected == 0 {
            return Err(ServiceError::Conflict(
                "cart was modified concurrently, retry the request".into(),
            ));
        }

        txn.commit().await?;

        info!(order_id = %order_id, external_order_id = %created.external_order_id, total_cents = total, "order created");
        self.events.send_or_log(Event::OrderCreated {
            order_id,
            user_id: user.id,
            external_order_id: created.external_order_id.clone(),
            total_cents: total,
        });

        Ok(OrderView {
            id: created.id,
            external_order_id: created.external_order_id,
            receipt: created.receipt,
            total_cents: created.total_cents,
            currency: created.currency,
            is_paid: created.is_paid,
            created_at: created.created_at,
            items: item_views,
        })
    }

    /// Apply a verified webhook event.
    ///
    /// Settlement is idempotent: the paid flag flips through a conditional
    /// update that matches only unpaid orders, and stock is decremented only
    /// when this delivery won that update. Redeliveries therefore observe
    /// `AlreadySettled` and change nothing.
    #[instrument(skip(self, event), fields(event_type = %event.event))]
    pub async fn settle_payment(
        &self,
        event: &WebhookEvent,
    ) -> Result<SettlementOutcome, ServiceError> {
        let payment = &event.payload.payment.entity;
        if event.event != "payment.captured" || !payment.captured {
            return Ok(SettlementOutcome::Ignored);
        }
        let external_order_id = payment.order_id.as_str();

        let txn = self.db.begin().await?;

        let claimed = order::Entity::update_many()
            .col_expr(order::Column::IsPaid, Expr::value(true))
            .col_expr(order::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(order::Column::ExternalOrderId.eq(external_order_id))
            .filter(order::Column::IsPaid.eq(false))
            .exec(&txn)
            .await?;

        if claimed.rows_affected == 0 {
            let existing = order::Entity::find()
                .filter(order::Column::ExternalOrderId.eq(external_order_id))
                .one(&txn)
                .await?;
            txn.commit().await?;
            return Ok(match existing {
                Some(_) => SettlementOutcome::AlreadySettled,
                None => {
                    warn!(external_order_id, "webhook for unknown order");
                    SettlementOutcome::Ignored
                }
            });
        }

        let settled = order::Entity::find()
            .filter(order::Column::ExternalOrderId.eq(external_order_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::Internal("settled order vanished".into()))?;

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(settled.id))
            .all(&txn)
            .await?;
        for item in &items {
            catalog::decrement_stock(&txn, item.product_id, item.quantity).await?;
        }

        txn.commit().await?;

        info!(order_id = %settled.id, external_order_id, "order settled");
        self.events.send_or_log(Event::OrderPaid {
            order_id: settled.id,
            external_order_id: external_order_id.to_string(),
        });
        for item in items {
            self.events.send_or_log(Event::StockDecremented {
                product_id: item.product_id,
                quantity: item.quantity,
            });
        }

        Ok(SettlementOutcome::Settled {
            order_id: settled.id,
        })
    }

    /// Fetch one order by its gateway order id. Only the owner may read it.
    pub async fn get_order(
        &self,
        user: &AuthenticatedUser,
        external_order_id: &str,
    ) -> Result<OrderView, ServiceError> {
        let found = order::Entity::find()
            .filter(order::Column::ExternalOrderId.eq(external_order_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("order not found".into()))?;

        if found.user_id != user.id {
            return Err(ServiceError::Forbidden(
                "order belongs to another user".into(),
            ));
        }

        let items = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(found.id))
            .all(&*self.db)
            .await?;
        Ok(to_view(found, items))
    }

    /// The caller's orders, newest first.
    pub async fn list_orders(
        &self,
        user: &AuthenticatedUser,
    ) -> Result<Vec<OrderView>, ServiceError> {
        let rows = order::Entity::find()
            .filter(order::Column::UserId.eq(user.id))
            .order_by_desc(order::Column::CreatedAt)
            .find_with_related(order_item::Entity)
            .all(&*self.db)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(order, items)| to_view(order, items))
            .collect())
    }
}

fn to_view(order: order::Model, items: Vec<order_item::Model>) -> OrderView {
    OrderView {
        id: order.id,
        external_order_id: order.external_order_id,
        receipt: order.receipt,
        total_cents: order.total_cents,
        currency: order.currency,
        is_paid: order.is_paid,
        created_at: order.created_at,
        items: items
            .into_iter()
            .map(|i| OrderItemView {
                product_id: i.product_id,
                name: i.name,
                price_cents: i.price_cents,
                brand: i.brand,
                image_url: i.image_url,
                quantity: i.quantity,
            })
            .collect(),
    }
}

/// Merchant reference sent to the gateway: the user's first name and the
/// current unix timestamp.
fn make_receipt(user_name: &str) -> String {
    let first = user_name.split_whitespace().next().unwrap_or("customer");
    format!("{}_{}", first, Utc::now().timestamp())
}
