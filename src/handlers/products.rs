use super::common::{
    created_response, no_content_response, success_response, AppJson, AppPath, AppQuery,
    PaginationParams,
};
use crate::{
    errors::ServiceError,
    services::products::{CreateProductInput, UpdateProductInput},
    AppState,
};
use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Default, Deserialize)]
pub struct ProductListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category_id: Option<i32>,
}

async fn list_products(
    State(state): State<Arc<AppState>>,
    AppQuery(params): AppQuery<ProductListParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let request = PaginationParams {
        page: params.page,
        limit: params.limit,
    }
    .to_request(&state.config);

    let page = state
        .services
        .products
        .list(request, params.category_id)
        .await?;
    Ok(success_response(page))
}

async fn get_product(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.products.get(id).await?;
    Ok(success_response(product))
}

async fn price_history(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    let history = state.services.products.price_history(id).await?;
    Ok(success_response(history))
}

async fn stock_ledger(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    AppQuery(params): AppQuery<PaginationParams>,
) -> Result<impl IntoResponse, ServiceError> {
    let page = state
        .services
        .products
        .stock_ledger(id, params.to_request(&state.config))
        .await?;
    Ok(success_response(page))
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<CreateProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.products.create(payload).await?;
    Ok(created_response(product))
}

async fn update_product(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
    AppJson(payload): AppJson<UpdateProductInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let product = state.services.products.update(id, payload).await?;
    Ok(success_response(product))
}

async fn delete_product(
    State(state): State<Arc<AppState>>,
    AppPath(id): AppPath<i32>,
) -> Result<impl IntoResponse, ServiceError> {
    state.services.products.delete(id).await?;
    Ok(no_content_response())
}

pub fn product_read_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
        .route("/products/:id/price-history", get(price_history))
        .route("/products/:id/stock-ledger", get(stock_ledger))
}

pub fn product_write_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/products", post(create_product))
        .route("/products/:id", put(update_product).delete(delete_product))
}
