use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Product entity
///
/// `stock` is a denormalized counter. Every change to it is mirrored by a row in
/// `stock_ledger_entries`, so the per-product ledger sum always equals `stock`.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "products")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub name: String,

    /// Units on hand, never negative
    pub stock: i32,

    /// Unit price, never negative
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub price: Decimal,

    /// Shelf or rack where the part is kept
    pub location: String,

    pub category_id: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "Restrict"
    )]
    Category,
    #[sea_orm(has_many = "super::activity_item::Entity")]
    ActivityItem,
    #[sea_orm(has_many = "super::stock_ledger_entry::Entity")]
    StockLedgerEntry,
    #[sea_orm(has_many = "super::price_history::Entity")]
    PriceHistory,
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl Related<super::activity_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ActivityItem.def()
    }
}

impl Related<super::stock_ledger_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockLedgerEntry.def()
    }
}

impl Related<super::price_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PriceHistory.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
