use super::common::{created_response, success_response, AppJson, AppPath, AppQuery, PaginationParams};
use crate::{
    auth::Principal,
    errors::ServiceError,
    services::stock_validator::RequestedLine,
    AppState,
};
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

/// `{"products": [{"id": 1, "quantity": 2}]}`. The kind comes from the route.
#[derive(Debug, Deserialize)]
pub struct ActivityRequest {
    pub products: Vec<RequestedLine>,
}

/// Sale: stock leaves the shop.
async fn create_outbound(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    AppJson(payload): AppJson<ActivityRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let recorded = state
        .services
        .activities
        .create_outbound(principal, payload.products)
        .await?;
    Ok(created_response(recorded))
}

/// Restock: stock enters the shop. Admin only.
async fn create_inbound(
    State(state): State<Arc<AppState>>,
    principal: Principal,
    AppJson(payload): AppJson<ActivityRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let recorded = state
        .services
        .activities
        .create_inbound(principal, payload.products)
        .await?;
    Ok(created_response(recorded))
}

async fn list_activities(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .queries
        .list_activities(params.to_request(&state.config))
        .await?;
    Ok(success_response(page))
}

async fn get_activity(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let detail = state.services.queries.get_activity(id).await?;
    Ok(success_response(detail))
}

pub fn activity_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/activities", get(list_activities).post(create_outbound))
        .route("/activities/:id", get(get_activity))
}

pub fn stock_transaction_routes() -> Router<Arc<AppState>> {
    Router::new().route("/stock-transactions", post(create_inbound))
}
