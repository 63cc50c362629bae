use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{error::DbErr, SqlErr, TransactionError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::error;

fn current_request_id() -> Option<String> {
    crate::telemetry::current_request_id().map(|rid| rid.as_str().to_string())
}

/// JSON body returned for every failed request
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable description of the first violated rule
    pub error: String,
    /// Stable machine-readable error kind, e.g. `insufficient_stock`
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

/// Step of the coordinated activity write that a persistence failure happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteStage {
    Header,
    Items,
    Ledger,
    StockUpdate,
    PriceHistory,
    Commit,
}

impl fmt::Display for WriteStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WriteStage::Header => "activity header",
            WriteStage::Items => "activity items",
            WriteStage::Ledger => "stock ledger entries",
            WriteStage::StockUpdate => "stock update",
            WriteStage::PriceHistory => "price history",
            WriteStage::Commit => "commit",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid activity kind '{0}', expected inbound or outbound")]
    InvalidKind(String),

    #[error("Duplicate product ID found: {0}")]
    DuplicateProduct(i32),

    #[error("Request must contain at least one product")]
    EmptyRequest,

    #[error("Quantity for product {product_id} must be a positive integer, got {quantity}")]
    QuantityInvalid { product_id: i32, quantity: i64 },

    #[error("Products not found: {}", join_ids(.0))]
    ProductNotFound(Vec<i32>),

    #[error(
        "Insufficient stock for product {product_id} ({name}): requested {requested}, available {available}, short by {}",
        .requested - .available
    )]
    InsufficientStock {
        product_id: i32,
        name: String,
        requested: i32,
        available: i32,
    },

    #[error("Invalid category: {0} does not exist")]
    InvalidCategory(i32),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Persistence error while writing {stage}: {source}")]
    PersistenceError {
        stage: WriteStage,
        #[source]
        source: DbErr,
    },

    #[error("Database error: {0}")]
    DatabaseError(#[from] DbErr),

    #[error("Hash error: {0}")]
    HashError(String),

    #[error("JWT error: {0}")]
    JwtError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

fn join_ids(ids: &[i32]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl From<validator::ValidationErrors> for ServiceError {
    fn from(err: validator::ValidationErrors) -> Self {
        ServiceError::ValidationError(err.to_string())
    }
}

/// Unwraps the error returned from a closure passed to `TransactionTrait::transaction`.
/// Failures to begin or commit count as a persistence failure of the commit stage.
impl From<TransactionError<ServiceError>> for ServiceError {
    fn from(err: TransactionError<ServiceError>) -> Self {
        match err {
            TransactionError::Connection(db_err) => ServiceError::PersistenceError {
                stage: WriteStage::Commit,
                source: db_err,
            },
            TransactionError::Transaction(service_err) => service_err,
        }
    }
}

impl ServiceError {
    pub fn db_error(error: DbErr) -> Self {
        ServiceError::DatabaseError(error)
    }

    /// Maps a unique-constraint violation to `Conflict(message)`, anything else to
    /// `DatabaseError`.
    pub fn conflict_on_unique(message: impl Into<String>) -> impl FnOnce(DbErr) -> Self {
        let message = message.into();
        move |err| match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(_)) => ServiceError::Conflict(message),
            _ => ServiceError::DatabaseError(err),
        }
    }

    pub fn persistence(stage: WriteStage) -> impl FnOnce(DbErr) -> Self {
        move |source| ServiceError::PersistenceError { stage, source }
    }

    /// Stable snake_case identifier of the variant
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "validation_error",
            Self::InvalidKind(_) => "invalid_kind",
            Self::DuplicateProduct(_) => "duplicate_product",
            Self::EmptyRequest => "empty_request",
            Self::QuantityInvalid { .. } => "quantity_invalid",
            Self::ProductNotFound(_) => "product_not_found",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::InvalidCategory(_) => "invalid_category",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::PersistenceError { .. } => "persistence_error",
            Self::DatabaseError(_) => "database_error",
            Self::HashError(_) | Self::JwtError(_) | Self::InternalError(_) => "internal_error",
        }
    }

    /// Returns the HTTP status code for this error.
    /// This is the single source of truth for error-to-status mapping.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::ValidationError(_)
            | Self::InvalidKind(_)
            | Self::DuplicateProduct(_)
            | Self::EmptyRequest
            | Self::QuantityInvalid { .. }
            | Self::ProductNotFound(_)
            | Self::InsufficientStock { .. }
            | Self::InvalidCategory(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::PersistenceError { .. }
            | Self::DatabaseError(_)
            | Self::HashError(_)
            | Self::JwtError(_)
            | Self::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error message suitable for HTTP responses.
    /// Internal errors return generic messages to avoid leaking implementation details.
    pub fn response_message(&self) -> String {
        match self {
            Self::PersistenceError { stage, .. } => {
                format!("Failed to persist {}", stage)
            }
            Self::DatabaseError(_) => "Database error".to_string(),
            Self::HashError(_) | Self::JwtError(_) | Self::InternalError(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(kind = self.kind(), error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: self.response_message(),
            kind: self.kind().to_string(),
            request_id: current_request_id(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        };

        (status, Json(body)).into_response()
    }
}
