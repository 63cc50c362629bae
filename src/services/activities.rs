//! Recording stock movements.
//!
//! `create_inbound` and `create_outbound` share one transactional workflow: admission
//! check, header, items, ledger entries, stock counters, commit. A failure at any step
//! rolls the whole activity back; there is no persisted failed state.

use chrono::{DateTime, Utc};
use metrics::counter;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait,
    QueryFilter, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::{
    auth::Principal,
    db::{self, DbPool},
    entities::{
        activity::{self, ActivityKind, ActivityStatus},
        activity_item,
        product::{self, Entity as Product},
        stock_ledger_entry,
    },
    errors::{ServiceError, WriteStage},
    services::stock_validator::{self, RequestedLine, ResolvedLine},
};

/// Note written on every ledger entry produced by an activity
pub const LEDGER_NOTE: &str = "Stock change for activity";

/// A committed activity with everything written for it
#[derive(Debug, Clone, Serialize)]
pub struct RecordedActivity {
    #[serde(flatten)]
    pub activity: activity::Model,
    pub items: Vec<activity_item::Model>,
    pub ledger_entries: Vec<stock_ledger_entry::Model>,
}

pub struct ActivityService {
    db_pool: Arc<DbPool>,
}

impl ActivityService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Restock. Admin only.
    pub async fn create_inbound(
        &self,
        principal: Principal,
        lines: Vec<RequestedLine>,
    ) -> Result<RecordedActivity, ServiceError> {
        self.record(principal, ActivityKind::Inbound, lines).await
    }

    /// Sale. Any authenticated user.
    pub async fn create_outbound(
        &self,
        principal: Principal,
        lines: Vec<RequestedLine>,
    ) -> Result<RecordedActivity, ServiceError> {
        self.record(principal, ActivityKind::Outbound, lines).await
    }

    /// Entry point for callers holding an unparsed kind such as `"inbound"`.
    pub async fn create_activity(
        &self,
        principal: Principal,
        raw_kind: &str,
        lines: Vec<RequestedLine>,
    ) -> Result<RecordedActivity, ServiceError> {
        let kind = stock_validator::parse_kind(raw_kind)?;
        self.record(principal, kind, lines).await
    }

    #[instrument(skip(self, lines), fields(user_id = principal.user_id, kind = %kind, lines = lines.len()))]
    async fn record(
        &self,
        principal: Principal,
        kind: ActivityKind,
        lines: Vec<RequestedLine>,
    ) -> Result<RecordedActivity, ServiceError> {
        let lock = db::supports_row_locks(self.db_pool.as_ref());

        let result = db::transaction(&self.db_pool, "record_activity", move |txn| {
            Box::pin(async move {
                let resolved =
                    stock_validator::resolve(txn, &principal, kind, &lines, lock).await?;
                write_activity(txn, principal.user_id, kind, resolved).await
            })
        })
        .await;

        match &result {
            Ok(recorded) => {
                counter!("bengkel_activities.committed", 1, "kind" => kind.to_string());
                info!(
                    activity_id = recorded.activity.id,
                    items = recorded.items.len(),
                    "activity recorded"
                );
            }
            Err(e) => {
                counter!(
                    "bengkel_activities.rejected", 1,
                    "kind" => kind.to_string(),
                    "reason" => e.kind()
                );
                if e.status_code().is_server_error() {
                    warn!(error = %e, "activity rolled back");
                } else {
                    warn!(reason = e.kind(), "activity rejected: {}", e);
                }
            }
        }

        result
    }
}

/// Coordinated write for an admitted request. Must run inside a transaction.
async fn write_activity(
    txn: &DatabaseTransaction,
    user_id: i32,
    kind: ActivityKind,
    lines: Vec<ResolvedLine>,
) -> Result<RecordedActivity, ServiceError> {
    let now = Utc::now();

    let header = activity::ActiveModel {
        user_id: Set(user_id),
        kind: Set(kind),
        status: Set(ActivityStatus::Success),
        date: Set(now),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(txn)
    .await
    .map_err(ServiceError::persistence(WriteStage::Header))?;

    let mut items = Vec::with_capacity(lines.len());
    for line in &lines {
        let price_at_time = line.product.price;
        let discount_amount = rust_decimal::Decimal::ZERO;
        let item = activity_item::ActiveModel {
            activity_id: Set(header.id),
            product_id: Set(line.product.id),
            quantity: Set(line.quantity),
            price_at_time: Set(price_at_time),
            discount_amount: Set(discount_amount),
            final_price: Set(price_at_time - discount_amount),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(ServiceError::persistence(WriteStage::Items))?;
        items.push(item);
    }

    let mut ledger_entries = Vec::with_capacity(items.len());
    for item in &items {
        let entry = stock_ledger_entry::ActiveModel {
            product_id: Set(item.product_id),
            activity_item_id: Set(Some(item.id)),
            change_quantity: Set(kind.signed(item.quantity)),
            note: Set(LEDGER_NOTE.to_string()),
            date: Set(now),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(txn)
        .await
        .map_err(ServiceError::persistence(WriteStage::Ledger))?;
        ledger_entries.push(entry);
    }

    for line in &lines {
        apply_stock_delta(txn, kind, line, now).await?;
    }

    Ok(RecordedActivity {
        activity: header,
        items,
        ledger_entries,
    })
}

/// Conditional counter update. Outbound only succeeds while enough stock remains,
/// so a concurrent sale that got there first turns this into `InsufficientStock`.
async fn apply_stock_delta(
    txn: &DatabaseTransaction,
    kind: ActivityKind,
    line: &ResolvedLine,
    now: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let product_id = line.product.id;
    let mut update = Product::update_many()
        .col_expr(
            product::Column::Stock,
            Expr::col(product::Column::Stock).add(kind.signed(line.quantity)),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(now))
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::DeletedAt.is_null());
    if kind == ActivityKind::Outbound {
        update = update.filter(product::Column::Stock.gte(line.quantity));
    }

    let result = update
        .exec(txn)
        .await
        .map_err(ServiceError::persistence(WriteStage::StockUpdate))?;
    if result.rows_affected > 0 {
        return Ok(());
    }

    let current = Product::find_by_id(product_id)
        .filter(product::Column::DeletedAt.is_null())
        .one(txn)
        .await
        .map_err(ServiceError::persistence(WriteStage::StockUpdate))?;

    match current {
        Some(p) => Err(ServiceError::InsufficientStock {
            product_id,
            name: p.name,
            requested: line.quantity,
            available: p.stock,
        }),
        None => Err(ServiceError::ProductNotFound(vec![product_id])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        db::{establish_connection_with_config, run_migrations, DbConfig},
        entities::category,
    };
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use sea_orm::TransactionTrait;

    async fn pool_with_product(stock: i32) -> (DbPool, product::Model) {
        let pool = establish_connection_with_config(&DbConfig::single_connection("sqlite::memory:"))
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();

        let now = Utc::now();
        let category = category::ActiveModel {
            name: Set("Rem".to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(&pool)
        .await
        .unwrap();
        let product = product::ActiveModel {
            name: Set("Kampas rem".to_string()),
            stock: Set(stock),
            price: Set(dec!(45000)),
            location: Set("Rak A1".to_string()),
            category_id: Set(category.id),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(&pool)
        .await
        .unwrap();
        (pool, product)
    }

    // A line as admitted while the product still showed `admitted_stock` units.
    fn admitted_against(product: &product::Model, admitted_stock: i32, quantity: i32) -> ResolvedLine {
        ResolvedLine {
            product: product::Model {
                stock: admitted_stock,
                ..product.clone()
            },
            quantity,
        }
    }

    #[tokio::test]
    async fn decrement_below_zero_after_admission_is_insufficient_stock() {
        let (pool, product) = pool_with_product(2).await;
        let line = admitted_against(&product, 10, 5);

        let txn = pool.begin().await.unwrap();
        let result = apply_stock_delta(&txn, ActivityKind::Outbound, &line, Utc::now()).await;
        txn.rollback().await.unwrap();

        assert_matches!(
            result,
            Err(ServiceError::InsufficientStock {
                requested: 5,
                available: 2,
                ..
            })
        );
        let stored = Product::find_by_id(product.id).one(&pool).await.unwrap().unwrap();
        assert_eq!(stored.stock, 2);
    }

    #[tokio::test]
    async fn product_deleted_after_admission_is_not_found() {
        let (pool, product) = pool_with_product(8).await;
        let line = admitted_against(&product, 8, 1);

        let mut deleted: product::ActiveModel = product.clone().into();
        deleted.deleted_at = Set(Some(Utc::now()));
        deleted.update(&pool).await.unwrap();

        let txn = pool.begin().await.unwrap();
        let result = apply_stock_delta(&txn, ActivityKind::Outbound, &line, Utc::now()).await;
        txn.rollback().await.unwrap();

        assert_matches!(result, Err(ServiceError::ProductNotFound(ids)) if ids == vec![product.id]);
    }

    #[tokio::test]
    async fn delta_applies_when_stock_still_covers_it() {
        let (pool, product) = pool_with_product(6).await;

        let txn = pool.begin().await.unwrap();
        apply_stock_delta(&txn, ActivityKind::Outbound, &admitted_against(&product, 6, 6), Utc::now())
            .await
            .unwrap();
        apply_stock_delta(&txn, ActivityKind::Inbound, &admitted_against(&product, 0, 3), Utc::now())
            .await
            .unwrap();
        txn.commit().await.unwrap();

        let stored = Product::find_by_id(product.id).one(&pool).await.unwrap().unwrap();
        assert_eq!(stored.stock, 3);
    }
}
