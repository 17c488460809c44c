use crate::api::handlers::{health, rag};
use crate::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

/// Request bodies are small JSON documents.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

pub fn create_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.server.request_timeout_secs);

    let public_routes = Router::new()
        .route("/ping", get(health::ping))
        .route("/health", get(health::health));

    let protected_routes = Router::new()
        .route("/rag/context", post(rag::context))
        .route("/rag/search", post(rag::search))
        .route("/rag/rebuild", post(rag::rebuild))
        .route("/rag/status/{collection}", get(rag::status))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            crate::api::middleware::require_api_key,
        ));

    // outermost first
    let layers = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, timeout))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES));

    public_routes
        .merge(protected_routes)
        .layer(layers)
        .with_state(state)
}
