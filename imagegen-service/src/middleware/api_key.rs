use crate::startup::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use service_core::utils::keys_match;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Gate on the `x-api-key` header. Runs before the body is read, so a bad key
/// is rejected whatever the payload.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let api_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok());

    match api_key {
        Some(key) if keys_match(key, state.config.security.gate_key.expose_secret()) => {
            next.run(request).await
        }
        _ => {
            tracing::warn!("Unauthorized access attempt");
            AppError::Unauthorized(anyhow::anyhow!("Unauthorized access")).into_response()
        }
    }
}
