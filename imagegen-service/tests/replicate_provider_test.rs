//! Replicate provider tests against a local stub of the predictions API.

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use imagegen_service::config::{GenerationConfig, ReplicateConfig};
use imagegen_service::models::GenerationInput;
use imagegen_service::services::providers::{ImageProvider, ProviderError, ReplicateProvider};
use secrecy::Secret;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

#[derive(Clone, Copy)]
enum Mode {
    Succeed,
    Poll,
    Fail,
    Unauthorized,
    Garbage,
}

#[derive(Debug, Clone)]
struct Captured {
    path: String,
    authorization: Option<String>,
    prefer: Option<String>,
    body: Option<Value>,
}

struct Stub {
    mode: Mode,
    base: String,
    polls: AtomicUsize,
    captured: Mutex<Vec<Captured>>,
}

impl Stub {
    fn capture(&self, path: String, headers: &HeaderMap, body: Option<Value>) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.captured.lock().unwrap().push(Captured {
            path,
            authorization: header("authorization"),
            prefer: header("prefer"),
            body,
        });
    }

    fn captured(&self) -> Vec<Captured> {
        self.captured.lock().unwrap().clone()
    }
}

fn urls() -> Value {
    json!(["https://replicate.delivery/out-0.png"])
}

fn create_response(stub: &Stub) -> Response {
    match stub.mode {
        Mode::Succeed => Json(json!({
            "id": "p1",
            "status": "succeeded",
            "output": urls(),
        }))
        .into_response(),
        Mode::Poll => (
            StatusCode::CREATED,
            Json(json!({
                "id": "p1",
                "status": "starting",
                "output": null,
                "urls": { "get": format!("{}/predictions/p1", stub.base) },
            })),
        )
            .into_response(),
        Mode::Fail => Json(json!({
            "id": "p1",
            "status": "failed",
            "error": "CUDA out of memory",
        }))
        .into_response(),
        Mode::Unauthorized => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "title": "Unauthenticated", "detail": "Invalid token." })),
        )
            .into_response(),
        Mode::Garbage => (StatusCode::OK, "<html>gateway</html>").into_response(),
    }
}

async fn create_versioned(
    State(stub): State<Arc<Stub>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    stub.capture("/v1/predictions".to_string(), &headers, Some(body));
    create_response(&stub)
}

async fn create_for_model(
    State(stub): State<Arc<Stub>>,
    Path((owner, name)): Path<(String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    stub.capture(
        format!("/v1/models/{}/{}/predictions", owner, name),
        &headers,
        Some(body),
    );
    create_response(&stub)
}

async fn poll(
    State(stub): State<Arc<Stub>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    stub.capture(format!("/v1/predictions/{}", id), &headers, None);
    let seen = stub.polls.fetch_add(1, Ordering::SeqCst);
    if seen == 0 {
        Json(json!({
            "id": id.clone(),
            "status": "processing",
            "urls": { "get": format!("{}/predictions/{}", stub.base, id) },
        }))
        .into_response()
    } else {
        Json(json!({ "id": id, "status": "succeeded", "output": urls() })).into_response()
    }
}

async fn spawn_stub(mode: Mode) -> Arc<Stub> {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind stub");
    let port = listener.local_addr().unwrap().port();

    let stub = Arc::new(Stub {
        mode,
        base: format!("http://127.0.0.1:{}/v1", port),
        polls: AtomicUsize::new(0),
        captured: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/v1/predictions", post(create_versioned))
        .route("/v1/predictions/:id", get(poll))
        .route("/v1/models/:owner/:name/predictions", post(create_for_model))
        .with_state(stub.clone());

    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    stub
}

fn provider_for(api_base: &str) -> ReplicateProvider {
    ReplicateProvider::new(&ReplicateConfig {
        api_key: Secret::new("r8_test".to_string()),
        api_base: api_base.to_string(),
        poll_interval_ms: 10,
        timeout_secs: 5,
    })
    .expect("Failed to build provider")
}

fn input() -> GenerationInput {
    GenerationInput::new("a red bicycle", &GenerationConfig::default())
}

fn credential() -> Secret<String> {
    Secret::new("r8_test".to_string())
}

#[tokio::test]
async fn versioned_reference_posts_to_predictions() {
    let stub = spawn_stub(Mode::Succeed).await;
    let provider = provider_for(&stub.base);

    let output = provider
        .run("ashakoen/akv-1-flux2:abc123", &input(), &credential())
        .await
        .expect("run should succeed");

    assert_eq!(output, urls());

    let captured = stub.captured();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].path, "/v1/predictions");
    assert_eq!(captured[0].authorization.as_deref(), Some("Bearer r8_test"));
    assert_eq!(captured[0].prefer.as_deref(), Some("wait"));
    assert_eq!(
        captured[0].body,
        Some(json!({
            "version": "abc123",
            "input": serde_json::to_value(input()).unwrap(),
        }))
    );
}

#[tokio::test]
async fn unversioned_reference_posts_to_model_endpoint() {
    let stub = spawn_stub(Mode::Succeed).await;
    let provider = provider_for(&stub.base);

    provider
        .run("black-forest-labs/flux-dev", &input(), &credential())
        .await
        .expect("run should succeed");

    let captured = stub.captured();
    assert_eq!(
        captured[0].path,
        "/v1/models/black-forest-labs/flux-dev/predictions"
    );
    let body = captured[0].body.clone().unwrap();
    assert!(body.get("version").is_none());
    assert_eq!(body["input"]["prompt"], "a red bicycle");
}

#[tokio::test]
async fn pending_prediction_is_followed_until_done() {
    let stub = spawn_stub(Mode::Poll).await;
    let provider = provider_for(&stub.base);

    let output = provider
        .run("o/n:v1", &input(), &credential())
        .await
        .expect("run should succeed");

    assert_eq!(output, urls());

    let paths: Vec<_> = stub.captured().into_iter().map(|c| c.path).collect();
    assert_eq!(
        paths,
        vec![
            "/v1/predictions".to_string(),
            "/v1/predictions/p1".to_string(),
            "/v1/predictions/p1".to_string(),
        ]
    );
    assert!(stub
        .captured()
        .iter()
        .all(|c| c.authorization.as_deref() == Some("Bearer r8_test")));
}

#[tokio::test]
async fn failed_prediction_is_typed() {
    let stub = spawn_stub(Mode::Fail).await;
    let err = provider_for(&stub.base)
        .run("o/n:v1", &input(), &credential())
        .await
        .unwrap_err();

    match err {
        ProviderError::PredictionFailed { status, detail } => {
            assert_eq!(status, "failed");
            assert_eq!(detail, "CUDA out of memory");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn api_error_carries_status_and_detail() {
    let stub = spawn_stub(Mode::Unauthorized).await;
    let err = provider_for(&stub.base)
        .run("o/n:v1", &input(), &credential())
        .await
        .unwrap_err();

    match err {
        ProviderError::ApiError { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "Invalid token.");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn non_json_success_is_malformed() {
    let stub = spawn_stub(Mode::Garbage).await;
    let err = provider_for(&stub.base)
        .run("o/n:v1", &input(), &credential())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::MalformedResponse(_)), "{err:?}");
}

#[tokio::test]
async fn unreachable_provider_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let err = provider_for(&format!("http://127.0.0.1:{}/v1", port))
        .run("o/n:v1", &input(), &credential())
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::NetworkError(_)), "{err:?}");
}

#[tokio::test]
async fn empty_credential_is_rejected_before_any_call() {
    let stub = spawn_stub(Mode::Succeed).await;
    let err = provider_for(&stub.base)
        .run("o/n:v1", &input(), &Secret::new(String::new()))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::NotConfigured(_)));
    assert!(stub.captured().is_empty());
}
