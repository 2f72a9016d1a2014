//! HTTP API.
//!
//! - POST /process-voice
//! - GET /health
//! - GET /metrics

use std::sync::Arc;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::{CONTENT_TYPE, RETRY_AFTER};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::inference::SharedBackend;
use crate::metrics::Metrics;
use crate::prompt::{build_prompt, PromptStyle};
use crate::server::interpret::interpret;

pub const INVALID_PAYLOAD_MESSAGE: &str = "Invalid payload";

/// Application state shared across handlers.
pub struct AppState {
    pub backend: SharedBackend,
    pub prompt_style: PromptStyle,
    pub metrics: Metrics,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(backend: SharedBackend, prompt_style: PromptStyle, metrics: Metrics) -> Self {
        Self {
            backend,
            prompt_style,
            metrics,
            start_time: Instant::now(),
        }
    }
}

/// Build the axum router with all API routes.
pub fn build_router(state: Arc<AppState>, cors: bool) -> Router {
    let router = Router::new()
        .route("/process-voice", post(process_voice))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .with_state(state)
        .layer(TraceLayer::new_for_http());

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

// ─── Request/Response Types ────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct VoiceRequest {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Body of every non-400 reply from /process-voice.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusMessage {
    pub status: String,
    pub message: String,
}

/// Body of a 400 reply.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
    pub model: String,
    pub uptime_secs: u64,
}

// ─── Route Handlers ────────────────────────────────────────────────────────

fn invalid_payload() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: INVALID_PAYLOAD_MESSAGE.to_string(),
        }),
    )
        .into_response()
}

async fn process_voice(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<VoiceRequest>, JsonRejection>,
) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let prompt = match payload {
        Ok(Json(VoiceRequest {
            prompt: Some(prompt),
        })) if !prompt.trim().is_empty() => prompt,
        Ok(_) => {
            warn!(request_id, "Request without prompt");
            state.metrics.record_request("invalid_payload");
            return invalid_payload();
        }
        Err(rejection) => {
            warn!(request_id, reason = %rejection.body_text(), "Rejected request body");
            state.metrics.record_request("invalid_payload");
            return invalid_payload();
        }
    };

    info!(
        request_id,
        backend = state.backend.name(),
        prompt_chars = prompt.chars().count(),
        "SQL generation request"
    );
    debug!(request_id, prompt, "Prompt");

    let built = build_prompt(state.prompt_style, &prompt);

    let started = Instant::now();
    let result = state.backend.infer(&built).await;
    let elapsed = started.elapsed().as_secs_f64();

    state.metrics.observe_inference(state.backend.name(), elapsed);
    state.metrics.record_request(result.outcome());

    let outcome = result.outcome();
    let interpretation = interpret(result, |code| state.backend.error_label(code));

    if interpretation.is_success() {
        info!(request_id, elapsed_secs = elapsed, sql = %interpretation.message, "Generated SQL");
    } else {
        error!(
            request_id,
            outcome,
            status = interpretation.status.as_u16(),
            message = %interpretation.message,
            "Generation failed"
        );
    }

    let body = Json(StatusMessage {
        status: if interpretation.is_success() { "success" } else { "error" }.to_string(),
        message: interpretation.message,
    });

    match interpretation.retry_after {
        Some(secs) => (
            interpretation.status,
            [(RETRY_AFTER, secs.to_string())],
            body,
        )
            .into_response(),
        None => (interpretation.status, body).into_response(),
    }
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        backend: state.backend.name().to_string(),
        model: state.backend.model().to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.render() {
        Ok(text) => (
            [(CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("Failed to render metrics: {e}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
