//! SQL generation backends.
//!
//! - [`remote`]: Hosted text-generation endpoint over HTTP
//! - [`local`]: In-process seq2seq model (feature `local`)
//! - [`beam`]: Beam search over a step scoring function

pub mod beam;
#[cfg(feature = "local")]
pub mod local;
pub mod remote;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, Strategy};
use crate::inference::remote::HfInferenceClient;

/// Text substituted when the provider answers successfully but without any text.
pub const EMPTY_COMPLETION: &str = "Error";

/// Outcome of one generation attempt, discriminated before any text is extracted.
#[derive(Debug, Clone, PartialEq)]
pub enum InferenceResult {
    /// Generated text, untrimmed.
    Success(String),

    /// The model is not resident yet; `retry_hint` is the provider's estimate in seconds.
    Loading { retry_hint: Option<u32> },

    /// The provider answered with a failure status.
    ProviderError { code: u16, raw: String },

    /// The provider could not be reached or its reply could not be read.
    TransportError(String),
}

impl InferenceResult {
    /// Short label for logs and metrics.
    pub fn outcome(&self) -> &'static str {
        match self {
            InferenceResult::Success(_) => "success",
            InferenceResult::Loading { .. } => "loading",
            InferenceResult::ProviderError { .. } => "provider_error",
            InferenceResult::TransportError(_) => "transport_error",
        }
    }
}

/// A strategy for turning a built prompt into raw completion text.
///
/// One attempt per call; implementations never retry.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Backend kind, e.g. "remote".
    fn name(&self) -> &str;

    /// Model identifier served by this backend.
    fn model(&self) -> &str;

    /// How a `ProviderError` with `code` is named to the caller.
    fn error_label(&self, code: u16) -> String {
        hf_error_label(code)
    }

    async fn infer(&self, prompt: &str) -> InferenceResult;
}

/// Error label for failures reported by the hosted inference provider.
pub fn hf_error_label(code: u16) -> String {
    format!("HF Error {code}")
}

pub type SharedBackend = Arc<dyn InferenceBackend>;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("profile {0} needs local inference; rebuild with `--features local`")]
    LocalUnavailable(String),

    #[cfg(feature = "local")]
    #[error("failed to load local model {model}: {source}")]
    LocalLoad {
        model: String,
        #[source]
        source: local::ModelLoadError,
    },
}

/// Build the backend selected by the configured profile.
///
/// Runs once at startup; a local model that cannot be loaded is an error here,
/// never a per-request failure.
pub fn build_backend(config: &Config) -> Result<SharedBackend, BackendError> {
    match config.strategy() {
        Strategy::Remote => {
            if config.api_key.is_none() {
                warn!("HF_API_KEY is not set; requests are sent without credentials");
            }
            let client = HfInferenceClient::new(
                config.endpoint(),
                config.model_id(),
                config.api_key.clone(),
                config.decoding(),
            );
            info!(endpoint = client.endpoint(), "Remote inference backend ready");
            Ok(Arc::new(client))
        }
        Strategy::Local => build_local_backend(config),
    }
}

#[cfg(feature = "local")]
fn build_local_backend(config: &Config) -> Result<SharedBackend, BackendError> {
    let decoding = config.decoding();
    let backend = local::LocalSeq2Seq::load(
        config.model_id(),
        &config.local,
        decoding.num_beams,
        decoding.max_new_tokens,
    )
    .map_err(|source| BackendError::LocalLoad {
        model: config.model_id().to_string(),
        source,
    })?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "local"))]
fn build_local_backend(config: &Config) -> Result<SharedBackend, BackendError> {
    Err(BackendError::LocalUnavailable(config.profile.to_string()))
}
