use crate::types::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Header carrying the shared secret.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests whose `x-api-key` header does not match the configured secret.
pub async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let provided = req
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| AppError::Auth("Missing x-api-key header".to_string()))?;

    if provided != state.api_key.as_ref() {
        tracing::warn!(path = %req.uri().path(), "Rejected request with invalid API key");
        return Err(AppError::Auth("Invalid API key".to_string()));
    }

    Ok(next.run(req).await)
}
