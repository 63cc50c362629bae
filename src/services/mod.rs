use serde::Serialize;
use std::sync::Arc;

use crate::db::DbPool;

// Stock movements
pub mod activities;
pub mod queries;
pub mod stock_validator;

// Catalog
pub mod categories;
pub mod products;

// Accounts
pub mod users;

pub use activities::{ActivityService, RecordedActivity};
pub use categories::CategoryService;
pub use products::ProductService;
pub use queries::QueryService;
pub use users::UserService;

pub const DEFAULT_PAGE_SIZE: u64 = 10;
pub const MAX_PAGE_SIZE: u64 = 100;

/// Normalized page/limit pair. Page numbers start at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub limit: u64,
}

impl PageRequest {
    /// `page < 1` becomes 1 and `limit < 1` becomes `default_limit`; limits above
    /// `max_limit` are capped. Pages are capped so the row offset fits a signed 64-bit
    /// SQL `OFFSET`.
    pub fn normalize(page: i64, limit: i64, default_limit: u64, max_limit: u64) -> Self {
        let limit = if limit < 1 {
            default_limit
        } else {
            (limit as u64).min(max_limit)
        };
        let limit = limit.max(1);
        let max_page = i64::MAX as u64 / limit;
        let page = if page < 1 { 1 } else { (page as u64).min(max_page) };
        Self { page, limit }
    }

    pub fn new(page: i64, limit: i64) -> Self {
        Self::normalize(page, limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> u64 {
        self.index().saturating_mul(self.limit)
    }

    /// Zero-based index for sea-orm paginators
    pub fn index(&self) -> u64 {
        self.page.saturating_sub(1)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of results plus the totals needed to render pagination.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub page: u64,
    pub limit: u64,
    pub total: u64,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, request: PageRequest, total: u64) -> Self {
        let total_pages = if request.limit == 0 {
            0
        } else {
            (total + request.limit - 1) / request.limit
        };
        Self {
            data,
            page: request.page,
            limit: request.limit,
            total,
            total_pages,
        }
    }
}

/// Every service, built once at startup and shared through `AppState`.
#[derive(Clone)]
pub struct AppServices {
    pub activities: Arc<ActivityService>,
    pub queries: Arc<QueryService>,
    pub categories: Arc<CategoryService>,
    pub products: Arc<ProductService>,
    pub users: Arc<UserService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, auth: Arc<crate::auth::AuthService>) -> Self {
        Self {
            activities: Arc::new(ActivityService::new(db.clone())),
            queries: Arc::new(QueryService::new(db.clone())),
            categories: Arc::new(CategoryService::new(db.clone())),
            products: Arc::new(ProductService::new(db.clone())),
            users: Arc::new(UserService::new(db, auth)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0, 1, 10)]
    #[case(-3, -1, 1, 10)]
    #[case(2, 5, 2, 5)]
    #[case(1, 1000, 1, 100)]
    #[case(i64::MAX, 100, i64::MAX as u64 / 100, 100)]
    #[case(i64::MAX, 0, i64::MAX as u64 / 10, 10)]
    fn page_request_normalizes(
        #[case] page: i64,
        #[case] limit: i64,
        #[case] expected_page: u64,
        #[case] expected_limit: u64,
    ) {
        let req = PageRequest::new(page, limit);
        assert_eq!(req.page, expected_page);
        assert_eq!(req.limit, expected_limit);
    }

    #[test]
    fn huge_page_offset_stays_in_sql_range() {
        let req = PageRequest::new(i64::MAX, 100);
        assert!(req.offset() <= i64::MAX as u64);
        assert_eq!(req.offset(), (req.page - 1) * 100);

        let unnormalized = PageRequest { page: u64::MAX, limit: 100 };
        assert_eq!(unnormalized.offset(), u64::MAX);
        assert_eq!(PageRequest { page: 0, limit: 10 }.offset(), 0);
    }

    #[test]
    fn total_pages_rounds_up() {
        let req = PageRequest::new(2, 10);
        assert_eq!(req.offset(), 10);
        let page = Page::new(vec![1, 2, 3], req, 23);
        assert_eq!(page.total_pages, 3);
        assert_eq!(Page::<i32>::new(vec![], req, 0).total_pages, 0);
    }
}
