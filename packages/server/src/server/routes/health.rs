use axum::{extract::Extension, http::StatusCode, Json};
use serde::Serialize;

use crate::server::app::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    status: String,
    waiting_pool_size: usize,
}

/// Health check endpoint
///
/// Always reports healthy once the app is up; the pool size is included so
/// operators can eyeball queue depth without a metrics stack.
pub async fn health_handler(
    Extension(state): Extension<AppState>,
) -> (StatusCode, Json<HealthResponse>) {
    let waiting_pool_size = state.service.pool().len().await;

    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            waiting_pool_size,
        }),
    )
}
