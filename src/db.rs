use crate::config::AppConfig;
use crate::errors::ServiceError;
use futures::future::BoxFuture;
use metrics::{counter, gauge, histogram};
use sea_orm::{
    sea_query::Expr, ColumnTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection,
    DatabaseTransaction, DbBackend, DbErr, EntityTrait, QueryFilter, TransactionTrait,
};
use sea_orm_migration::MigratorTrait;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Database connection URL
    pub url: String,
    /// Maximum number of connections
    pub max_connections: u32,
    /// Minimum number of connections
    pub min_connections: u32,
    /// Connection timeout duration
    pub connect_timeout: Duration,
    /// Idle timeout duration
    pub idle_timeout: Duration,
    /// Acquire connection timeout
    pub acquire_timeout: Duration,
    /// Log every statement through sqlx
    pub sqlx_logging: bool,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
            sqlx_logging: true,
        }
    }
}

impl DbConfig {
    /// Single-connection pool, used for SQLite test databases.
    pub fn single_connection(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 1,
            min_connections: 1,
            sqlx_logging: false,
            ..Default::default()
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
            sqlx_logging: cfg.is_development(),
        }
    }
}

/// Establishes a connection pool to the database with custom configuration
///
/// # Errors
/// Returns `ServiceError::DatabaseError` if the connection cannot be established
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, ServiceError> {
    debug!(
        max_connections = config.max_connections,
        min_connections = config.min_connections,
        "Configuring database connection"
    );

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(config.sqlx_logging);

    gauge!("bengkel_db.max_connections", config.max_connections as f64);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let db_pool = Database::connect(opt).await.map_err(|e| {
        error!("Database connection establishment failed: {}", e);
        ServiceError::db_error(e)
    })?;

    info!("Database connection pool established successfully");
    Ok(db_pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, ServiceError> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

/// SQLite has no `SELECT ... FOR UPDATE`; writers are serialized by the database lock instead.
pub fn supports_row_locks<C: ConnectionTrait>(db: &C) -> bool {
    !matches!(db.get_database_backend(), DbBackend::Sqlite)
}

/// Makes the open transaction the database writer before it reads anything. No-op
/// outside SQLite.
///
/// A deferred SQLite transaction that has already read cannot upgrade to a writer while
/// another connection holds the write lock: the upgrade fails with `SQLITE_BUSY` at once
/// instead of waiting on the busy timeout. A first statement that writes (touching
/// `touch` on the rows in `ids`, whether or not any exist) takes the lock up front, so a
/// competing writer queues here instead.
pub async fn claim_writer<E, C>(
    txn: &C,
    touch: E::Column,
    key: E::Column,
    ids: &[i32],
) -> Result<(), DbErr>
where
    E: EntityTrait,
    C: ConnectionTrait,
{
    if txn.get_database_backend() != DbBackend::Sqlite {
        return Ok(());
    }

    E::update_many()
        .col_expr(touch, Expr::col(touch).into())
        .filter(key.is_in(ids.iter().copied()))
        .exec(txn)
        .await
        .map(|_| ())
}

/// Runs `f` inside a database transaction, recording duration and outcome metrics.
///
/// The transaction commits when `f` returns `Ok` and rolls back otherwise. Failing to
/// begin or commit surfaces as a persistence error of the commit stage.
pub async fn transaction<F, T>(db: &DbPool, operation: &'static str, f: F) -> Result<T, ServiceError>
where
    F: for<'a> FnOnce(&'a DatabaseTransaction) -> BoxFuture<'a, Result<T, ServiceError>> + Send,
    T: Send,
{
    let transaction_id = Uuid::new_v4();
    let start = Instant::now();

    debug!(transaction_id = %transaction_id, operation, "Starting database transaction");
    counter!("bengkel_db.transaction.started", 1, "operation" => operation);

    let result = db
        .transaction::<_, T, ServiceError>(f)
        .await
        .map_err(ServiceError::from);

    let elapsed = start.elapsed();
    histogram!("bengkel_db.transaction.duration", elapsed, "operation" => operation);

    match &result {
        Ok(_) => {
            counter!("bengkel_db.transaction.committed", 1, "operation" => operation);
            debug!(transaction_id = %transaction_id, "Transaction committed in {:?}", elapsed);
        }
        Err(e) => {
            counter!("bengkel_db.transaction.rolled_back", 1, "operation" => operation);
            warn!(
                transaction_id = %transaction_id,
                kind = e.kind(),
                "Transaction rolled back after {:?}",
                elapsed
            );
        }
    }

    result
}

/// Runs database migrations
///
/// # Errors
/// Returns `ServiceError::DatabaseError` if migrations fail to execute
pub async fn run_migrations(pool: &DbPool) -> Result<(), ServiceError> {
    info!("Running database migrations");
    let start = Instant::now();

    let result = crate::migrator::Migrator::up(pool, None)
        .await
        .map_err(ServiceError::db_error);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => info!(
            "Database migrations completed successfully in {:?}",
            elapsed
        ),
        Err(e) => error!("Database migrations failed after {:?}: {}", elapsed, e),
    }

    result
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<Duration, ServiceError> {
    debug!("Checking database connection");
    let start = Instant::now();

    let result = pool.ping().await.map_err(ServiceError::db_error);

    let elapsed = start.elapsed();
    match &result {
        Ok(_) => {
            debug!("Database connection check successful in {:?}", elapsed);
            gauge!("bengkel_db.connection_latency", elapsed.as_millis() as f64);
        }
        Err(e) => {
            error!(
                "Database connection check failed after {:?}: {}",
                elapsed, e
            );
            counter!("bengkel_db.connection_failures", 1);
        }
    }

    result.map(|_| elapsed)
}

/// Closes the database connection pool
pub async fn close_pool(pool: DbPool) -> Result<(), ServiceError> {
    info!("Closing database connection pool");
    pool.close().await.map_err(ServiceError::db_error)
}
