//! Router tests with a stub inference backend.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tower::ServiceExt;

use voice_sql::inference::{hf_error_label, InferenceBackend, InferenceResult};
use voice_sql::metrics::Metrics;
use voice_sql::prompt::PromptStyle;
use voice_sql::server::api::{build_router, AppState, ErrorBody, HealthResponse, StatusMessage};

/// Returns a canned result and records the prompts it was given.
struct StubBackend {
    reply: InferenceResult,
    label: Option<&'static str>,
    seen: Mutex<Vec<String>>,
}

impl StubBackend {
    fn new(reply: InferenceResult) -> Arc<Self> {
        Arc::new(Self {
            reply,
            label: None,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn labelled(reply: InferenceResult, label: &'static str) -> Arc<Self> {
        Arc::new(Self {
            reply,
            label: Some(label),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl InferenceBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn model(&self) -> &str {
        "stub/model"
    }

    fn error_label(&self, code: u16) -> String {
        match self.label {
            Some(label) => label.to_string(),
            None => hf_error_label(code),
        }
    }

    async fn infer(&self, prompt: &str) -> InferenceResult {
        self.seen.lock().unwrap().push(prompt.to_string());
        self.reply.clone()
    }
}

fn app(backend: Arc<StubBackend>) -> Router {
    let state = AppState::new(backend, PromptStyle::FewShot, Metrics::new().unwrap());
    build_router(Arc::new(state), true)
}

fn post_json(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/process-voice")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, headers, bytes.to_vec())
}

#[tokio::test]
async fn test_success_returns_trimmed_sql() {
    let backend = StubBackend::new(InferenceResult::Success("  SELECT * FROM t \n".into()));
    let (status, _, body) = send(app(backend.clone()), post_json(r#"{"prompt": "everything in t"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    let body: StatusMessage = serde_json::from_slice(&body).unwrap();
    assert_eq!(body.status, "success");
    assert_eq!(body.message, "SQL: SELECT * FROM t");

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].contains("Input: everything in t\nSQL: "));
}

#[tokio::test]
async fn test_invalid_payloads_return_400() {
    let cases = [
        r#"{}"#,
        r#"{"prompt": ""}"#,
        r#"{"prompt": "   "}"#,
        r#"{"prompt": null}"#,
        r#"{"prompt": 42}"#,
        r#"not json"#,
        r#""#,
        r#"[]"#,
    ];

    for case in cases {
        let backend = StubBackend::new(InferenceResult::Success("SELECT 1".into()));
        let (status, _, body) = send(app(backend.clone()), post_json(case)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST, "payload {case:?}");
        let body: ErrorBody = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.error, "Invalid payload");
        assert!(backend.calls().is_empty(), "backend called for {case:?}");
    }
}

#[tokio::test]
async fn test_missing_content_type_is_invalid() {
    let backend = StubBackend::new(InferenceResult::Success("SELECT 1".into()));
    let request = Request::builder()
        .method("POST")
        .uri("/process-voice")
        .body(Body::from(r#"{"prompt": "x"}"#))
        .unwrap();
    let (status, _, body) = send(app(backend), request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let body: ErrorBody = serde_json::from_slice(&body).unwrap();
    assert_eq!(body.error, "Invalid payload");
}

#[tokio::test]
async fn test_loading_returns_503_for_any_prompt() {
    for prompt in ["show users", "DROP TABLE students", "é ü 中文"] {
        let backend = StubBackend::new(InferenceResult::Loading { retry_hint: Some(7) });
        let payload = serde_json::json!({ "prompt": prompt }).to_string();
        let (status, headers, body) = send(app(backend), post_json(&payload)).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(headers.get(header::RETRY_AFTER).unwrap(), "7");
        let body: StatusMessage = serde_json::from_slice(&body).unwrap();
        assert_eq!(body.status, "error");
        assert_eq!(body.message, "AI is warming up... Try again in 20s");
    }
}

#[tokio::test]
async fn test_provider_error_returns_500_with_raw() {
    let backend = StubBackend::new(InferenceResult::ProviderError {
        code: 403,
        raw: r#"{"error":"Forbidden"}"#.into(),
    });
    let (status, _, body) = send(app(backend), post_json(r#"{"prompt": "x"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: StatusMessage = serde_json::from_slice(&body).unwrap();
    assert_eq!(body.status, "error");
    assert!(body.message.starts_with("AI Error: HF Error 403"));
    assert!(body.message.contains("Forbidden"));
}

#[tokio::test]
async fn test_provider_error_uses_backend_label() {
    let backend = StubBackend::labelled(
        InferenceResult::ProviderError {
            code: 500,
            raw: "forward pass failed: shape mismatch".into(),
        },
        "Local model error",
    );
    let (status, _, body) = send(app(backend), post_json(r#"{"prompt": "x"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: StatusMessage = serde_json::from_slice(&body).unwrap();
    assert_eq!(
        body.message,
        "AI Error: Local model error: forward pass failed: shape mismatch"
    );
}

#[tokio::test]
async fn test_transport_error_returns_500() {
    let backend = StubBackend::new(InferenceResult::TransportError("dns failure".into()));
    let (status, _, body) = send(app(backend), post_json(r#"{"prompt": "x"}"#)).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    let body: StatusMessage = serde_json::from_slice(&body).unwrap();
    assert_eq!(body.message, "Server Error: dns failure");
}

#[tokio::test]
async fn test_health_reports_backend() {
    let backend = StubBackend::new(InferenceResult::Success(String::new()));
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, _, body) = send(app(backend), request).await;

    assert_eq!(status, StatusCode::OK);
    let health: HealthResponse = serde_json::from_slice(&body).unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.backend, "stub");
    assert_eq!(health.model, "stub/model");
}

#[tokio::test]
async fn test_metrics_count_outcomes() {
    let backend = StubBackend::new(InferenceResult::Success("SELECT 1".into()));
    let router = app(backend);

    send(router.clone(), post_json(r#"{"prompt": "one"}"#)).await;
    send(router.clone(), post_json(r#"{}"#)).await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let (status, _, body) = send(router, request).await;

    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("voice_sql_requests_total{outcome=\"success\"} 1"));
    assert!(text.contains("voice_sql_requests_total{outcome=\"invalid_payload\"} 1"));
}
