//! Maps an [`InferenceResult`] onto the user-visible message and status.

use axum::http::StatusCode;

use crate::inference::InferenceResult;

/// Fixed message returned while the provider loads the model.
pub const WARMING_UP_MESSAGE: &str = "AI is warming up... Try again in 20s";

/// Retry-After value used when the provider gives no estimate.
pub const DEFAULT_RETRY_AFTER_SECS: u32 = 20;

/// Longest slice of a raw provider body echoed back to the caller.
const RAW_SUMMARY_LIMIT: usize = 512;

/// Final outcome of a request, before JSON encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct Interpretation {
    pub status: StatusCode,
    pub message: String,
    /// Seconds for the `Retry-After` header, set only for warm-up.
    pub retry_after: Option<u32>,
}

impl Interpretation {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

/// `error_label` names a `ProviderError` by its status code, e.g. `HF Error 404`.
pub fn interpret<L>(result: InferenceResult, error_label: L) -> Interpretation
where
    L: FnOnce(u16) -> String,
{
    match result {
        InferenceResult::Success(text) => Interpretation {
            status: StatusCode::OK,
            message: format!("SQL: {}", text.trim()),
            retry_after: None,
        },
        InferenceResult::Loading { retry_hint } => Interpretation {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: WARMING_UP_MESSAGE.to_string(),
            retry_after: Some(retry_hint.unwrap_or(DEFAULT_RETRY_AFTER_SECS)),
        },
        InferenceResult::ProviderError { code, raw } => {
            let label = error_label(code);
            let summary = summarize(&raw);
            let message = if summary.is_empty() {
                format!("AI Error: {label}")
            } else {
                format!("AI Error: {label}: {summary}")
            };
            Interpretation {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message,
                retry_after: None,
            }
        }
        InferenceResult::TransportError(message) => Interpretation {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("Server Error: {message}"),
            retry_after: None,
        },
    }
}

/// Trimmed raw body, cut at a char boundary.
fn summarize(raw: &str) -> String {
    let raw = raw.trim();
    match raw.char_indices().nth(RAW_SUMMARY_LIMIT) {
        Some((cut, _)) => format!("{}...", &raw[..cut]),
        None => raw.to_string(),
    }
}
