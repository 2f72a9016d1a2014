//! Hosted text-generation endpoint client.
//!
//! Sends one `POST` per prompt and classifies the reply into an
//! [`InferenceResult`]. The provider's JSON is untyped and changes shape
//! between success, failure and warm-up; it is discriminated on HTTP status
//! first and payload shape second.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::DecodingParams;
use crate::inference::{InferenceBackend, InferenceResult, EMPTY_COMPLETION};

/// Outbound request body.
#[derive(Debug, Serialize)]
pub struct GenerationPayload<'a> {
    pub inputs: &'a str,
    #[serde(skip_serializing_if = "no_parameters")]
    pub parameters: &'a DecodingParams,
    pub options: PayloadOptions,
}

fn no_parameters(params: &&DecodingParams) -> bool {
    params.is_empty()
}

#[derive(Debug, Serialize)]
pub struct PayloadOptions {
    pub wait_for_model: bool,
}

/// One element of a list-shaped generation reply.
#[derive(Debug, Deserialize)]
struct GeneratedText {
    generated_text: Option<String>,
}

/// A single-object generation reply; the text is mandatory.
#[derive(Debug, Deserialize)]
struct SingleText {
    generated_text: String,
}

/// An error object sent with a 2xx status.
#[derive(Debug, Deserialize)]
struct ErrorReply {
    error: serde_json::Value,
}

/// 2xx reply bodies the provider is known to send. Variant order matters:
/// an object carrying `error` is an error even if it also has text.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SuccessBody {
    List(Vec<GeneratedText>),
    Error(ErrorReply),
    Single(SingleText),
}

/// Warm-up reply body, e.g. `{"error": "... is currently loading", "estimated_time": 20.0}`.
#[derive(Debug, Deserialize)]
struct LoadingBody {
    estimated_time: Option<f64>,
}

/// Classify a provider reply.
pub fn decode_reply(status: StatusCode, body: &str) -> InferenceResult {
    if status == StatusCode::SERVICE_UNAVAILABLE {
        let retry_hint = serde_json::from_str::<LoadingBody>(body)
            .ok()
            .and_then(|b| b.estimated_time)
            .filter(|t| t.is_finite() && *t >= 0.0)
            .map(|t| t.ceil() as u32);
        return InferenceResult::Loading { retry_hint };
    }

    if !status.is_success() {
        return InferenceResult::ProviderError {
            code: status.as_u16(),
            raw: body.to_string(),
        };
    }

    match serde_json::from_str::<SuccessBody>(body) {
        Ok(SuccessBody::List(items)) => {
            let text = items
                .into_iter()
                .next()
                .and_then(|item| item.generated_text)
                .unwrap_or_else(|| EMPTY_COMPLETION.to_string());
            InferenceResult::Success(text)
        }
        Ok(SuccessBody::Single(item)) => InferenceResult::Success(item.generated_text),
        Ok(SuccessBody::Error(reply)) => {
            warn!(
                status = status.as_u16(),
                error = %reply.error,
                "Provider reported an error with a success status"
            );
            InferenceResult::ProviderError {
                code: status.as_u16(),
                raw: body.to_string(),
            }
        }
        Err(e) => {
            debug!(error = %e, "Undecodable success body");
            InferenceResult::ProviderError {
                code: status.as_u16(),
                raw: body.to_string(),
            }
        }
    }
}

/// Client for a hosted text-generation endpoint.
pub struct HfInferenceClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
    decoding: DecodingParams,
}

impl HfInferenceClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: Option<String>,
        decoding: DecodingParams,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            model: model.into(),
            api_key,
            decoding,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn payload<'a>(&'a self, prompt: &'a str) -> GenerationPayload<'a> {
        GenerationPayload {
            inputs: prompt,
            parameters: &self.decoding,
            options: PayloadOptions {
                wait_for_model: true,
            },
        }
    }
}

#[async_trait]
impl InferenceBackend for HfInferenceClient {
    fn name(&self) -> &str {
        "remote"
    }

    fn model(&self) -> &str {
        &self.model
    }

    async fn infer(&self, prompt: &str) -> InferenceResult {
        info!(endpoint = %self.endpoint, "Sending generation request");

        let mut request = self.http.post(&self.endpoint).json(&self.payload(prompt));
        if let Some(key) = &self.api_key {
            request = request.header(AUTHORIZATION, format!("Bearer {key}"));
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Inference endpoint unreachable");
                return InferenceResult::TransportError(e.to_string());
            }
        };

        let status = response.status();
        info!(status = status.as_u16(), "Inference endpoint replied");

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "Failed to read inference reply");
                return InferenceResult::TransportError(e.to_string());
            }
        };

        decode_reply(status, &body)
    }
}
