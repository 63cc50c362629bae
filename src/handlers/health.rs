use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{sync::Arc, time::Instant};
use tracing::warn;

use crate::{db, AppState};

/// Component health status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    Up,
    Down,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: ComponentStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ComponentStatus,
    pub version: String,
    pub git_hash: String,
    pub build_time: String,
    pub timestamp: String,
    pub uptime_secs: u64,
    pub database: ComponentHealth,
}

/// Tracks application start time for uptime calculation
static START_TIME: std::sync::OnceLock<Instant> = std::sync::OnceLock::new();

/// Initialize the start time (call this on application startup)
pub fn init_start_time() {
    let _ = START_TIME.get_or_init(Instant::now);
}

fn uptime_secs() -> u64 {
    START_TIME.get().map(|t| t.elapsed().as_secs()).unwrap_or(0)
}

async fn ping() -> impl IntoResponse {
    Json(json!({ "message": "pong" }))
}

/// Readiness: 200 when the database answers, 503 otherwise.
async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let database = match db::check_connection(&state.db).await {
        Ok(latency) => ComponentHealth {
            status: ComponentStatus::Up,
            message: "Database connection successful".to_string(),
            latency_ms: Some(latency.as_millis() as u64),
        },
        Err(e) => {
            warn!(error = %e, "health check: database unreachable");
            ComponentHealth {
                status: ComponentStatus::Down,
                message: "Database unreachable".to_string(),
                latency_ms: None,
            }
        }
    };

    let status = database.status;
    let code = match status {
        ComponentStatus::Up => StatusCode::OK,
        ComponentStatus::Down => StatusCode::SERVICE_UNAVAILABLE,
    };

    let body = HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION").to_string(),
        git_hash: env!("GIT_HASH").to_string(),
        build_time: env!("BUILD_TIME").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        uptime_secs: uptime_secs(),
        database,
    };
    (code, Json(body))
}

pub fn health_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/ping", get(ping))
        .route("/health", get(health))
}
