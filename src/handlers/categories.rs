use super::common::{
    created_response, no_content_response, success_response, AppJson, AppPath, AppQuery,
    PaginationParams,
};
use crate::{errors::ServiceError, services::categories::CategoryInput, AppState};
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;

async fn list_categories(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .categories
        .list(params.to_request(&state.config))
        .await?;
    Ok(success_response(page))
}

async fn get_category(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let category = state.services.categories.get(id).await?;
    Ok(success_response(category))
}

async fn create_category(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<CategoryInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let category = state.services.categories.create(payload).await?;
    Ok(created_response(category))
}

async fn update_category(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<CategoryInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let category = state.services.categories.update(id, payload).await?;
    Ok(success_response(category))
}

async fn delete_category(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.categories.delete(id).await?;
    Ok(no_content_response())
}

/// Read access for any authenticated user
pub fn category_read_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/categories", get(list_categories))
        .route("/categories/:id", get(get_category))
}

pub fn category_write_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/categories", post(create_category))
        .route("/categories/:id", put(update_category).delete(delete_category))
}
