use super::common::{success_response, AppQuery, PaginationParams};
use crate::{errors::ServiceError, AppState};
use axum::{extract::State, response::IntoResponse, routing::get, Router};
use std::sync::Arc;

/// Units sold per product, best sellers first
async fn sales_report(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .queries
        .sales_report(params.to_request(&state.config))
        .await?;
    Ok(success_response(page))
}

pub fn report_routes() -> Router<Arc<AppState>> {
    Router::new().route("/sales-report", get(sales_report))
}
