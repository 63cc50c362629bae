//! Bengkel Inventory Library
//!
//! Inventory backend for a repair shop: catalog, stock activities with an append-only
//! ledger, price history and a sales report, served over a JSON HTTP API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod handlers;
pub mod migrator;
pub mod services;
pub mod telemetry;

use axum::{extract::Extension, middleware, Router};
use http::HeaderValue;
use std::{sync::Arc, time::Duration};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
};
use tracing::info;

use crate::auth::{AuthConfig, AuthRouterExt, AuthService};
use crate::config::AppConfig;
use crate::db::DbPool;
use crate::entities::user::Role;
use crate::services::AppServices;

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DbPool>,
    pub config: Arc<AppConfig>,
    pub auth: Arc<AuthService>,
    pub services: AppServices,
}

impl AppState {
    /// Wires the auth service and every domain service around one pool.
    pub fn new(db: Arc<DbPool>, config: AppConfig) -> Self {
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config)));
        let services = AppServices::new(db.clone(), auth.clone());
        Self {
            db,
            config: Arc::new(config),
            auth,
            services,
        }
    }
}

/// Full HTTP surface: public probes and auth, user routes, admin routes.
pub fn build_router(state: Arc<AppState>) -> Router {
    let public = Router::new()
        .merge(handlers::health::health_routes())
        .merge(handlers::auth::auth_routes());

    let user = Router::new()
        .merge(handlers::categories::category_read_routes())
        .merge(handlers::products::product_read_routes())
        .merge(handlers::activities::activity_routes())
        .merge(handlers::reports::report_routes())
        .with_auth();

    let admin = Router::new()
        .merge(handlers::categories::category_write_routes())
        .merge(handlers::products::product_write_routes())
        .merge(handlers::activities::stock_transaction_routes())
        .with_role(Role::Admin);

    let timeout = Duration::from_secs(state.config.request_timeout_secs.max(1));
    let auth_service = state.auth.clone();

    Router::new()
        .merge(public)
        .merge(user)
        .merge(admin)
        .layer(TimeoutLayer::new(timeout))
        // HTTP tracing layer for consistent request/response telemetry
        .layer(telemetry::http_trace_layer())
        // Inject AuthService into request extensions for auth middleware
        .layer(Extension(auth_service))
        // Ensure every request carries a request id for traceability
        .layer(middleware::from_fn(telemetry::request_id_middleware))
        .with_state(state)
}

/// CORS policy from config. `None` means nothing usable is configured and permissive
/// CORS is not allowed for this environment.
pub fn cors_layer(cfg: &AppConfig) -> Option<CorsLayer> {
    let configured_origins: Option<Vec<HeaderValue>> = cfg
        .cors_allowed_origins
        .as_ref()
        .map(|raw| {
            raw.split(',')
                .map(str::trim)
                .filter(|origin| !origin.is_empty())
                .filter_map(|origin| HeaderValue::from_str(origin).ok())
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty());

    if let Some(origins) = configured_origins {
        Some(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else if cfg.should_allow_permissive_cors() {
        info!(
            "Using permissive CORS because explicit origins were not configured ({})",
            if cfg.is_development() {
                "development environment"
            } else {
                "explicit override enabled"
            }
        );
        Some(CorsLayer::permissive())
    } else {
        None
    }
}
