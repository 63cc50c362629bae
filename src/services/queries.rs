use sea_orm::{
    ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, LoaderTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Statement,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

use crate::{
    db::DbPool,
    entities::{
        activity::{self, Entity as Activity},
        activity_item,
        product::{self, Entity as Product},
        user::{self, Role},
    },
    errors::ServiceError,
    services::{Page, PageRequest},
};

/// Public view of the account that recorded an activity
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl From<user::Model> for UserSummary {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            role: user.role,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityDetail {
    #[serde(flatten)]
    pub activity: activity::Model,
    pub user: Option<UserSummary>,
    pub items: Vec<activity_item::Model>,
}

/// One row of the sales report
#[derive(Debug, Clone, PartialEq, Serialize, FromQueryResult)]
pub struct ProductSales {
    pub id: i32,
    pub name: String,
    pub category: Option<String>,
    pub stock: i32,
    pub total_sales: i64,
}

/// Read side for activities and the sales report.
pub struct QueryService {
    db_pool: Arc<DbPool>,
}

impl QueryService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Activities newest first, each with its items and owning user.
    #[instrument(skip(self))]
    pub async fn list_activities(
        &self,
        request: PageRequest,
    ) -> Result<Page<ActivityDetail>, ServiceError> {
        let db = self.db_pool.as_ref();

        let paginator = Activity::find()
            .filter(activity::Column::DeletedAt.is_null())
            .order_by_desc(activity::Column::Date)
            .order_by_desc(activity::Column::Id)
            .paginate(db, request.limit);

        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let activities = paginator
            .fetch_page(request.index())
            .await
            .map_err(ServiceError::db_error)?;

        let details = attach_details(db, activities).await?;
        Ok(Page::new(details, request, total))
    }

    /// One activity with items and user; `NotFound` if absent or soft-deleted.
    #[instrument(skip(self))]
    pub async fn get_activity(&self, id: i32) -> Result<ActivityDetail, ServiceError> {
        let db = self.db_pool.as_ref();

        let activity = Activity::find_by_id(id)
            .filter(activity::Column::DeletedAt.is_null())
            .one(db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Activity {} not found", id)))?;

        attach_details(db, vec![activity])
            .await?
            .pop()
            .ok_or_else(|| ServiceError::InternalError("activity detail lost".to_string()))
    }

    /// Units sold per live product (outbound ledger entries only), best sellers first.
    /// Products that never sold are listed with zero.
    #[instrument(skip(self))]
    pub async fn sales_report(
        &self,
        request: PageRequest,
    ) -> Result<Page<ProductSales>, ServiceError> {
        let db = self.db_pool.as_ref();

        let total = Product::find()
            .filter(product::Column::DeletedAt.is_null())
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;

        let sql = sales_report_sql(request.limit, request.offset());
        let rows = ProductSales::find_by_statement(Statement::from_string(
            db.get_database_backend(),
            sql,
        ))
        .all(db)
        .await
        .map_err(ServiceError::db_error)?;

        Ok(Page::new(rows, request, total))
    }
}

// LIMIT/OFFSET are computed integers and inlined, so the statement has no bind parameters.
fn sales_report_sql(limit: u64, offset: u64) -> String {
    format!(
        r#"
        SELECT p.id AS id,
               p.name AS name,
               c.name AS category,
               p.stock AS stock,
               COALESCE(s.total_sales, 0) AS total_sales
        FROM products p
        LEFT JOIN categories c ON c.id = p.category_id
        LEFT JOIN (
            SELECT l.product_id AS product_id,
                   -SUM(l.change_quantity) AS total_sales
            FROM stock_ledger_entries l
            JOIN activity_items ai ON ai.id = l.activity_item_id
            JOIN activities a ON a.id = ai.activity_id
            WHERE a.kind = 'outbound'
              AND a.deleted_at IS NULL
              AND l.deleted_at IS NULL
            GROUP BY l.product_id
        ) s ON s.product_id = p.id
        WHERE p.deleted_at IS NULL
        ORDER BY total_sales DESC, p.id ASC
        LIMIT {} OFFSET {}
        "#,
        limit, offset
    )
}

async fn attach_details<C: ConnectionTrait>(
    db: &C,
    activities: Vec<activity::Model>,
) -> Result<Vec<ActivityDetail>, ServiceError> {
    let items = activities
        .load_many(activity_item::Entity, db)
        .await
        .map_err(ServiceError::db_error)?;
    let users = activities
        .load_one(user::Entity, db)
        .await
        .map_err(ServiceError::db_error)?;

    Ok(activities
        .into_iter()
        .zip(items)
        .zip(users)
        .map(|((activity, items), user)| ActivityDetail {
            activity,
            user: user.map(UserSummary::from),
            items: items
                .into_iter()
                .filter(|i| i.deleted_at.is_none())
                .collect(),
        })
        .collect())
}
