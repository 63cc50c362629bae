use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::{Validate, ValidationError};

use crate::{
    db::{self, DbPool},
    entities::{
        category::{self, Entity as Category},
        price_history::{self, Entity as PriceHistory},
        product::{self, Entity as Product},
        stock_ledger_entry::{self, Entity as StockLedgerEntry},
    },
    errors::{ServiceError, WriteStage},
    services::{Page, PageRequest},
};

/// Note on the ledger entry that records a product's opening stock
pub const INITIAL_STOCK_NOTE: &str = "Initial stock";

fn validate_non_negative_price(price: &Decimal) -> Result<(), ValidationError> {
    if *price < Decimal::ZERO {
        let mut err = ValidationError::new("price");
        err.message = Some("Price must not be negative".into());
        return Err(err);
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 200, message = "Product name must be 1 to 200 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(range(min = 0, message = "Stock must not be negative"))]
    pub stock: i32,
    #[validate(custom = "validate_non_negative_price")]
    pub price: Decimal,
    #[validate(length(min = 1, max = 100, message = "Location is required"))]
    pub location: String,
    pub category_id: i32,
}

/// Full replacement of the editable fields. Stock is not editable here; it only
/// moves through activities.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 200, message = "Product name must be 1 to 200 characters"))]
    pub name: String,
    #[validate(custom = "validate_non_negative_price")]
    pub price: Decimal,
    #[validate(length(min = 1, max = 100, message = "Location is required"))]
    pub location: String,
    pub category_id: i32,
}

pub struct ProductService {
    db_pool: Arc<DbPool>,
}

impl ProductService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        request: PageRequest,
        category_id: Option<i32>,
    ) -> Result<Page<product::Model>, ServiceError> {
        let mut query = Product::find()
            .filter(product::Column::DeletedAt.is_null())
            .order_by_asc(product::Column::Id);
        if let Some(category_id) = category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }

        let paginator = query.paginate(self.db_pool.as_ref(), request.limit);
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let rows = paginator
            .fetch_page(request.index())
            .await
            .map_err(ServiceError::db_error)?;
        Ok(Page::new(rows, request, total))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<product::Model, ServiceError> {
        find_live(self.db_pool.as_ref(), id).await
    }

    /// Creates a product. Non-zero opening stock is mirrored by a ledger entry so the
    /// ledger sum matches `stock` from the start.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(&self, input: CreateProductInput) -> Result<product::Model, ServiceError> {
        let input = CreateProductInput {
            name: input.name.trim().to_string(),
            location: input.location.trim().to_string(),
            ..input
        };
        input.validate()?;

        let created = db::transaction(&self.db_pool, "create_product", move |txn| {
            Box::pin(async move {
                db::claim_writer::<Category, _>(
                    txn,
                    category::Column::UpdatedAt,
                    category::Column::Id,
                    &[input.category_id],
                )
                .await
                .map_err(ServiceError::db_error)?;
                ensure_category(txn, input.category_id).await?;

                let now = Utc::now();
                let product = product::ActiveModel {
                    name: Set(input.name),
                    stock: Set(input.stock),
                    price: Set(input.price),
                    location: Set(input.location),
                    category_id: Set(input.category_id),
                    created_at: Set(now),
                    updated_at: Set(now),
                    deleted_at: Set(None),
                    ..Default::default()
                }
                .insert(txn)
                .await
                .map_err(ServiceError::db_error)?;

                if product.stock > 0 {
                    stock_ledger_entry::ActiveModel {
                        product_id: Set(product.id),
                        activity_item_id: Set(None),
                        change_quantity: Set(product.stock),
                        note: Set(INITIAL_STOCK_NOTE.to_string()),
                        date: Set(now),
                        created_at: Set(now),
                        updated_at: Set(now),
                        deleted_at: Set(None),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::persistence(WriteStage::Ledger))?;
                }

                Ok(product)
            })
        })
        .await?;

        info!(product_id = created.id, stock = created.stock, "product created");
        Ok(created)
    }

    /// Updates name, price, location and category. A price change appends a
    /// price-history row in the same transaction; an identical price does not.
    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: i32,
        input: UpdateProductInput,
    ) -> Result<product::Model, ServiceError> {
        let input = UpdateProductInput {
            name: input.name.trim().to_string(),
            location: input.location.trim().to_string(),
            ..input
        };
        input.validate()?;

        let (updated, price_changed) = db::transaction(&self.db_pool, "update_product", move |txn| {
            Box::pin(async move {
                db::claim_writer::<Product, _>(
                    txn,
                    product::Column::UpdatedAt,
                    product::Column::Id,
                    &[id],
                )
                .await
                .map_err(ServiceError::db_error)?;
                let current = find_live(txn, id).await?;
                ensure_category(txn, input.category_id).await?;

                let now = Utc::now();
                let old_price = current.price;
                let price_changed = old_price != input.price;

                if price_changed {
                    price_history::ActiveModel {
                        product_id: Set(id),
                        old_price: Set(old_price),
                        new_price: Set(input.price),
                        date_changed: Set(now),
                        created_at: Set(now),
                        updated_at: Set(now),
                        deleted_at: Set(None),
                        ..Default::default()
                    }
                    .insert(txn)
                    .await
                    .map_err(ServiceError::persistence(WriteStage::PriceHistory))?;
                }

                let mut active: product::ActiveModel = current.into();
                active.name = Set(input.name);
                active.price = Set(input.price);
                active.location = Set(input.location);
                active.category_id = Set(input.category_id);
                active.updated_at = Set(now);
                let updated = active.update(txn).await.map_err(ServiceError::db_error)?;

                Ok((updated, price_changed))
            })
        })
        .await?;

        info!(product_id = id, price_changed, "product updated");
        Ok(updated)
    }

    /// Soft delete. Ledger and activity history keep referencing the row.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let current = find_live(db, id).await?;

        let now = Utc::now();
        let mut active: product::ActiveModel = current.into();
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(db).await.map_err(ServiceError::db_error)?;

        info!(product_id = id, "product deleted");
        Ok(())
    }

    /// Price changes for a product, newest first
    #[instrument(skip(self))]
    pub async fn price_history(&self, id: i32) -> Result<Vec<price_history::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        find_live(db, id).await?;

        PriceHistory::find()
            .filter(price_history::Column::ProductId.eq(id))
            .filter(price_history::Column::DeletedAt.is_null())
            .order_by_desc(price_history::Column::DateChanged)
            .order_by_desc(price_history::Column::Id)
            .all(db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Ledger entries for a product, newest first
    #[instrument(skip(self))]
    pub async fn stock_ledger(
        &self,
        id: i32,
        request: PageRequest,
    ) -> Result<Page<stock_ledger_entry::Model>, ServiceError> {
        let db = self.db_pool.as_ref();
        find_live(db, id).await?;

        let paginator = StockLedgerEntry::find()
            .filter(stock_ledger_entry::Column::ProductId.eq(id))
            .filter(stock_ledger_entry::Column::DeletedAt.is_null())
            .order_by_desc(stock_ledger_entry::Column::Date)
            .order_by_desc(stock_ledger_entry::Column::Id)
            .paginate(db, request.limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let rows = paginator
            .fetch_page(request.index())
            .await
            .map_err(ServiceError::db_error)?;
        Ok(Page::new(rows, request, total))
    }
}

async fn find_live<C: ConnectionTrait>(db: &C, id: i32) -> Result<product::Model, ServiceError> {
    Product::find_by_id(id)
        .filter(product::Column::DeletedAt.is_null())
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", id)))
}

async fn ensure_category<C: ConnectionTrait>(db: &C, category_id: i32) -> Result<(), ServiceError> {
    let exists = Category::find_by_id(category_id)
        .filter(category::Column::DeletedAt.is_null())
        .count(db)
        .await
        .map_err(ServiceError::db_error)?;
    if exists == 0 {
        return Err(ServiceError::InvalidCategory(category_id));
    }
    Ok(())
}
