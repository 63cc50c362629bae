use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Line item of an activity. Prices are snapshots taken when the activity was
/// recorded and are never recomputed.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "activity_items")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    pub activity_id: i32,

    pub product_id: i32,

    pub quantity: i32,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub price_at_time: Decimal,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub discount_amount: Decimal,

    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub final_price: Decimal,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::activity::Entity",
        from = "Column::ActivityId",
        to = "super::activity::Column::Id",
        on_delete = "Cascade"
    )]
    Activity,
    #[sea_orm(
        belongs_to = "super::product::Entity",
        from = "Column::ProductId",
        to = "super::product::Column::Id",
        on_delete = "Restrict"
    )]
    Product,
    #[sea_orm(has_many = "super::stock_ledger_entry::Entity")]
    StockLedgerEntry,
}

impl Related<super::activity::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Activity.def()
    }
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Product.def()
    }
}

impl Related<super::stock_ledger_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockLedgerEntry.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
