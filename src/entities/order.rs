use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Order record: an immutable snapshot of a cart at checkout time.
///
/// Only the payment fields change after creation (`is_paid`, `updated_at`).
/// The purchasing user's identity is denormalized so historical orders are
/// unaffected by later profile edits. `external_order_id` is the payment
/// gateway's order identifier and correlates asynchronous settlement
/// callbacks. `expires_at` implements the configured retention window.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub user_email: String,
    pub user_name: String,
    pub total_cents: i64,
    pub currency: String,
    pub is_paid: bool,
    #[sea_orm(unique)]
    pub external_order_id: String,
    pub receipt: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
