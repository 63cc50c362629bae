#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{Method, Request},
    response::Response,
    Router,
};
use bengkel_inventory::{
    build_router,
    config::AppConfig,
    db::{self, DbConfig, DbPool},
    entities::{
        activity, activity_item, category,
        product::{self, Entity as Product},
        stock_ledger_entry,
        user::{self, Role},
    },
    services::products::CreateProductInput,
    AppState,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, EntityTrait,
    PaginatorTrait, QueryFilter, Set, Statement,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const TEST_JWT_SECRET: &str = "test_secret_key_for_testing_purposes_only_32chars";

/// Application wired to a fresh in-memory SQLite database with one admin and one
/// employee account.
pub struct TestApp {
    router: Router,
    pub state: Arc<AppState>,
    pub admin_id: i32,
    pub admin_token: String,
    pub employee_id: i32,
    pub employee_token: String,
    _data_dir: Option<TempDir>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_db_config(DbConfig::single_connection("sqlite::memory:"), None).await
    }

    /// Application on a SQLite file in a temporary directory, served by a pool of
    /// `max_connections` connections like a default deployment.
    pub async fn on_file_database(max_connections: u32) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let url = format!("sqlite://{}?mode=rwc", dir.path().join("bengkel.db").display());
        let config = DbConfig {
            url,
            max_connections,
            min_connections: 1,
            sqlx_logging: false,
            ..Default::default()
        };
        Self::with_db_config(config, Some(dir)).await
    }

    async fn with_db_config(db_config: DbConfig, data_dir: Option<TempDir>) -> Self {
        let cfg = AppConfig::new(
            db_config.url.clone(),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );

        let pool = db::establish_connection_with_config(&db_config)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let state = Arc::new(AppState::new(Arc::new(pool), cfg));

        let admin_id = insert_user(
            state.db.as_ref(),
            "Admin Bengkel",
            "admin@bengkel.test",
            Role::Admin,
        )
        .await;
        let employee_id = insert_user(
            state.db.as_ref(),
            "Budi Santoso",
            "budi@bengkel.test",
            Role::Karyawan,
        )
        .await;

        let admin_token = state
            .auth
            .issue_token(admin_id, Role::Admin)
            .expect("issue admin token")
            .access_token;
        let employee_token = state
            .auth
            .issue_token(employee_id, Role::Karyawan)
            .expect("issue employee token")
            .access_token;

        Self {
            router: build_router(state.clone()),
            state,
            admin_id,
            admin_token,
            employee_id,
            employee_token,
            _data_dir: data_dir,
        }
    }

    pub fn db(&self) -> &DbPool {
        self.state.db.as_ref()
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    pub async fn as_admin(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(&self.admin_token))
            .await
    }

    pub async fn as_employee(&self, method: Method, uri: &str, body: Option<Value>) -> Response {
        self.request(method, uri, body, Some(&self.employee_token))
            .await
    }

    pub async fn seed_category(&self, name: &str) -> category::Model {
        let now = Utc::now();
        category::ActiveModel {
            name: Set(name.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
            ..Default::default()
        }
        .insert(self.db())
        .await
        .expect("seed category")
    }

    /// Creates a product through the service so opening stock gets its ledger entry.
    pub async fn seed_product(
        &self,
        name: &str,
        stock: i32,
        price: Decimal,
        category_id: i32,
    ) -> product::Model {
        self.state
            .services
            .products
            .create(CreateProductInput {
                name: name.to_string(),
                stock,
                price,
                location: "Rak A1".to_string(),
                category_id,
            })
            .await
            .expect("seed product")
    }

    pub async fn stock_of(&self, product_id: i32) -> i32 {
        Product::find_by_id(product_id)
            .one(self.db())
            .await
            .expect("query product")
            .expect("product exists")
            .stock
    }

    pub async fn ledger_sum(&self, product_id: i32) -> i64 {
        stock_ledger_entry::Entity::find()
            .filter(stock_ledger_entry::Column::ProductId.eq(product_id))
            .all(self.db())
            .await
            .expect("query ledger")
            .iter()
            .map(|e| e.change_quantity as i64)
            .sum()
    }

    pub async fn activity_count(&self) -> u64 {
        activity::Entity::find()
            .count(self.db())
            .await
            .expect("count activities")
    }

    pub async fn item_count(&self) -> u64 {
        activity_item::Entity::find()
            .count(self.db())
            .await
            .expect("count activity items")
    }

    pub async fn ledger_count(&self) -> u64 {
        stock_ledger_entry::Entity::find()
            .count(self.db())
            .await
            .expect("count ledger entries")
    }

    /// Runs raw SQL, e.g. to install failure-injecting triggers.
    pub async fn exec(&self, sql: &str) {
        self.db()
            .execute(Statement::from_string(
                DatabaseBackend::Sqlite,
                sql.to_string(),
            ))
            .await
            .expect("execute raw sql");
    }
}

async fn insert_user(db: &DbPool, name: &str, email: &str, role: Role) -> i32 {
    let now = Utc::now();
    user::ActiveModel {
        name: Set(name.to_string()),
        email: Set(email.to_string()),
        password_hash: Set("not-a-real-hash".to_string()),
        role: Set(role),
        created_at: Set(now),
        updated_at: Set(now),
        deleted_at: Set(None),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("seed user")
    .id
}

pub async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read response body");
    serde_json::from_slice(&bytes).expect("response body is json")
}
