use crate::config::SERVICE_NAME;
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

/// Liveness probe. No upstream call is made.
pub async fn health_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ok",
            "service": SERVICE_NAME,
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}
