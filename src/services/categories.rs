use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use validator::Validate;

use crate::{
    db::{self, DbPool},
    entities::{
        category::{self, Entity as Category},
        product::{self, Entity as Product},
    },
    errors::ServiceError,
    services::{Page, PageRequest},
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CategoryInput {
    #[validate(length(min = 1, max = 100, message = "Category name must be 1 to 100 characters"))]
    pub name: String,
}

impl CategoryInput {
    fn normalized(mut self) -> Result<Self, ServiceError> {
        self.name = self.name.trim().to_string();
        self.validate()?;
        Ok(self)
    }
}

pub struct CategoryService {
    db_pool: Arc<DbPool>,
}

impl CategoryService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self))]
    pub async fn list(&self, request: PageRequest) -> Result<Page<category::Model>, ServiceError> {
        let paginator = Category::find()
            .filter(category::Column::DeletedAt.is_null())
            .order_by_asc(category::Column::Id)
            .paginate(self.db_pool.as_ref(), request.limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let rows = paginator
            .fetch_page(request.index())
            .await
            .map_err(ServiceError::db_error)?;
        Ok(Page::new(rows, request, total))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i32) -> Result<category::Model, ServiceError> {
        find_live(self.db_pool.as_ref(), id).await
    }

    /// Creates a category. Reusing the name of a soft-deleted category revives that row.
    #[instrument(skip(self))]
    pub async fn create(&self, input: CategoryInput) -> Result<category::Model, ServiceError> {
        let input = input.normalized()?;
        let db = self.db_pool.as_ref();
        let now = Utc::now();

        let existing = Category::find()
            .filter(category::Column::Name.eq(input.name.as_str()))
            .one(db)
            .await
            .map_err(ServiceError::db_error)?;

        let saved = match existing {
            Some(row) if row.deleted_at.is_none() => {
                return Err(duplicate_name(&input.name));
            }
            Some(row) => {
                let mut active: category::ActiveModel = row.into();
                active.deleted_at = Set(None);
                active.updated_at = Set(now);
                active.update(db).await.map_err(ServiceError::db_error)?
            }
            None => category::ActiveModel {
                name: Set(input.name.clone()),
                created_at: Set(now),
                updated_at: Set(now),
                deleted_at: Set(None),
                ..Default::default()
            }
            .insert(db)
            .await
            .map_err(ServiceError::conflict_on_unique(duplicate_message(&input.name)))?,
        };

        info!(category_id = saved.id, "category created");
        Ok(saved)
    }

    /// Renames a category. A soft-deleted category holding the wanted name gives it up,
    /// the same way `create` would revive it.
    #[instrument(skip(self))]
    pub async fn update(
        &self,
        id: i32,
        input: CategoryInput,
    ) -> Result<category::Model, ServiceError> {
        let input = input.normalized()?;

        let updated = db::transaction(&self.db_pool, "update_category", move |txn| {
            Box::pin(async move {
                db::claim_writer::<Category, _>(
                    txn,
                    category::Column::UpdatedAt,
                    category::Column::Id,
                    &[id],
                )
                .await
                .map_err(ServiceError::db_error)?;

                let current = find_live(txn, id).await?;
                if current.name == input.name {
                    return Ok(current);
                }

                let holder = Category::find()
                    .filter(category::Column::Name.eq(input.name.as_str()))
                    .filter(category::Column::Id.ne(id))
                    .one(txn)
                    .await
                    .map_err(ServiceError::db_error)?;
                match holder {
                    Some(row) if row.deleted_at.is_none() => {
                        return Err(duplicate_name(&input.name));
                    }
                    Some(row) => release_name(txn, row).await?,
                    None => {}
                }

                let mut active: category::ActiveModel = current.into();
                active.name = Set(input.name.clone());
                active.updated_at = Set(Utc::now());
                active
                    .update(txn)
                    .await
                    .map_err(ServiceError::conflict_on_unique(duplicate_message(&input.name)))
            })
        })
        .await?;

        info!(category_id = id, "category updated");
        Ok(updated)
    }

    /// Soft delete. Refused while live products still reference the category.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: i32) -> Result<(), ServiceError> {
        let db = self.db_pool.as_ref();
        let current = self.get(id).await?;

        let in_use = Product::find()
            .filter(product::Column::CategoryId.eq(id))
            .filter(product::Column::DeletedAt.is_null())
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if in_use > 0 {
            return Err(ServiceError::Conflict(format!(
                "Category {} still has {} product(s)",
                id, in_use
            )));
        }

        let now = Utc::now();
        let mut active: category::ActiveModel = current.into();
        active.deleted_at = Set(Some(now));
        active.updated_at = Set(now);
        active.update(db).await.map_err(ServiceError::db_error)?;

        info!(category_id = id, "category deleted");
        Ok(())
    }
}

async fn find_live<C: ConnectionTrait>(db: &C, id: i32) -> Result<category::Model, ServiceError> {
    Category::find_by_id(id)
        .filter(category::Column::DeletedAt.is_null())
        .one(db)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Category {} not found", id)))
}

/// Moves a soft-deleted category off its name so a live category can take it.
async fn release_name<C: ConnectionTrait>(db: &C, row: category::Model) -> Result<(), ServiceError> {
    let retired = format!("{} (deleted #{})", row.name, row.id);
    let mut active: category::ActiveModel = row.into();
    active.name = Set(retired);
    active.update(db).await.map_err(ServiceError::db_error)?;
    Ok(())
}

fn duplicate_message(name: &str) -> String {
    format!("Category '{}' already exists", name)
}

fn duplicate_name(name: &str) -> ServiceError {
    ServiceError::Conflict(duplicate_message(name))
}
