use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Append-only record of a single signed stock change.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "stock_ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub product_id: i32,

    /// Originating line item; `None` for entries not produced by an activity
    pub activity_item_id: Option<i32>,

    /// Positive for inbound, negative for outbound, never zero
    pub change_quantity: i32,

    pub note: String,

    pub date: DateTime<Utc>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "Restrict"
    )]
    Product,
    #[sea_orm(
        belongs_to = "super::activity_item::Entity",
        from = "Column::ActivityItemId",
        to = "super::activity_item::Column::Id",
        on_delete = "Restrict"
    )]
    ActivityItem,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::activity_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActivityItem.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
