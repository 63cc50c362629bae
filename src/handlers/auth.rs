use super::common::{created_response, success_response, AppJson};
use crate::{
    errors::ServiceError,
    services::users::{LoginInput, RegisterInput},
    AppState,
};
use axum::{extract::State, response::IntoResponse, routing::post, Router};
use std::sync::Arc;

/// Self-service registration. New accounts always get the `karyawan` role.
async fn register(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<RegisterInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state.services.users.register(payload).await?;
    Ok(created_response(user))
}

async fn login(
    State(state): State<Arc<AppState>>,
    AppJson(payload): AppJson<LoginInput>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state.services.users.login(payload).await?;
    Ok(success_response(outcome))
}

pub fn auth_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}
