//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::domains::matching::service::MatchService;
use crate::server::routes::health::health_handler;
use crate::server::routes::matching::{
    cancel_matching_handler, match_response_handler, start_matching_handler, start_time_handler,
    timeout_choice_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MatchService>,
}

/// Build the Axum application router
pub fn build_app(service: Arc<MatchService>) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/match/start", post(start_matching_handler))
        .route("/api/match/cancel", delete(cancel_matching_handler))
        .route("/api/match/start-time", get(start_time_handler))
        .route("/api/match/response", post(match_response_handler))
        .route("/api/match/timeout-choice", post(timeout_choice_handler))
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
