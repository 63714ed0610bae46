//! Shared setup for imagegen-service integration tests.

#![allow(dead_code)]

use axum::body::{to_bytes, Body};
use axum::http::{Request, Response};
use imagegen_service::config::ImagegenConfig;
use imagegen_service::services::providers::MockImageProvider;
use imagegen_service::{build_router, AppState};
use serde_json::Value;
use service_core::config::Config;
use std::collections::HashMap;
use std::sync::Arc;

pub const GATE_KEY: &str = "secret";
pub const UPSTREAM_KEY: &str = "r8_upstream_test_key";

/// Config with defaults everywhere except the two secrets and a random port.
pub fn test_config() -> ImagegenConfig {
    test_config_with(&[])
}

pub fn test_config_with(extra: &[(&str, &str)]) -> ImagegenConfig {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("X_API_KEY".into(), GATE_KEY.into());
    vars.insert("REPLICATE_API_KEY".into(), UPSTREAM_KEY.into());
    for (k, v) in extra {
        vars.insert(k.to_string(), v.to_string());
    }

    let common = Config {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    ImagegenConfig::from_map(common, &vars).expect("Failed to build test config")
}

/// Router backed by `provider`, which the caller keeps to inspect calls.
pub fn router_with(provider: Arc<MockImageProvider>) -> axum::Router {
    build_router(AppState::new(test_config(), provider))
}

pub fn generate_request(api_key: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/generate-images")
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
