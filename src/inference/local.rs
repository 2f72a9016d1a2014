//! In-process seq2seq generation with candle.
//!
//! The model and tokenizer are loaded once at startup by [`LocalSeq2Seq::load`]
//! and owned by the backend for the lifetime of the process. Loading either
//! one is fallible and the caller treats failure as fatal.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor, D};
use candle_nn::VarBuilder;
use candle_transformers::models::t5;
use thiserror::Error;
use tokenizers::Tokenizer;
use tracing::{debug, info, warn};

use crate::config::{LocalConfig, Precision};
use crate::inference::beam::{beam_search, BeamConfig, TokenId};
use crate::inference::{InferenceBackend, InferenceResult};

/// Default number of generated tokens.
const DEFAULT_MAX_LENGTH: usize = 128;

#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("Model file not found: {0}")]
    FileNotFound(String),

    #[error("Hub download failed: {0}")]
    Hub(String),

    #[error("Failed to load tokenizer: {0}")]
    Tokenizer(String),

    #[error("Invalid model config: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),
}

#[derive(Error, Debug)]
enum GenerateError {
    #[error("tokenization failed: {0}")]
    Tokenize(String),

    #[error("forward pass failed: {0}")]
    Candle(#[from] candle_core::Error),
}

/// Paths of the three files a T5 checkpoint needs.
struct ModelFiles {
    config: PathBuf,
    tokenizer: PathBuf,
    weights: PathBuf,
}

impl ModelFiles {
    fn from_dir(dir: &Path) -> Result<Self, ModelLoadError> {
        let files = Self {
            config: dir.join("config.json"),
            tokenizer: dir.join("tokenizer.json"),
            weights: dir.join("model.safetensors"),
        };
        for path in [&files.config, &files.tokenizer, &files.weights] {
            if !path.exists() {
                return Err(ModelLoadError::FileNotFound(path.display().to_string()));
            }
        }
        Ok(files)
    }

    fn from_hub(model_id: &str) -> Result<Self, ModelLoadError> {
        use hf_hub::api::sync::Api;

        let api = Api::new().map_err(|e| ModelLoadError::Hub(e.to_string()))?;
        let repo = api.model(model_id.to_string());
        let get = |name: &str| repo.get(name).map_err(|e| ModelLoadError::Hub(format!("{name}: {e}")));

        Ok(Self {
            config: get("config.json")?,
            tokenizer: get("tokenizer.json")?,
            weights: get("model.safetensors")?,
        })
    }
}

/// Loaded model, tokenizer and decoding settings.
struct Seq2SeqRunner {
    model: t5::T5ForConditionalGeneration,
    tokenizer: Tokenizer,
    device: Device,
    num_beams: usize,
    max_length: usize,
    start_token: TokenId,
    eos_token: TokenId,
}

impl Seq2SeqRunner {
    fn generate(&mut self, prompt: &str) -> Result<String, GenerateError> {
        let input_ids = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| GenerateError::Tokenize(e.to_string()))?
            .get_ids()
            .to_vec();

        self.model.clear_kv_cache();
        let input = Tensor::new(input_ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let encoder_output = self.model.encode(&input)?;

        let config = BeamConfig {
            num_beams: self.num_beams,
            max_length: self.max_length,
            start_token: self.start_token,
            eos_token: self.eos_token,
        };

        let model = &mut self.model;
        let device = &self.device;
        let output_ids = beam_search(config, |prefix| {
            model.clear_kv_cache();
            let decoder_input = Tensor::new(prefix, device)?.unsqueeze(0)?;
            let logits = model.decode(&decoder_input, &encoder_output)?.squeeze(0)?;
            let log_probs = candle_nn::ops::log_softmax(&logits, D::Minus1)?;
            log_probs.to_dtype(DType::F32)?.to_vec1::<f32>()
        })?;

        debug!(
            input_tokens = input_ids.len(),
            output_tokens = output_ids.len(),
            "Local generation complete"
        );

        self.tokenizer
            .decode(&output_ids, true)
            .map_err(|e| GenerateError::Tokenize(e.to_string()))
    }
}

/// Backend running a T5-family model in-process.
pub struct LocalSeq2Seq {
    model_id: String,
    runner: Arc<Mutex<Seq2SeqRunner>>,
}

impl LocalSeq2Seq {
    /// Load model and tokenizer from `settings.model_dir`, or from the hub by `model_id`.
    pub fn load(
        model_id: &str,
        settings: &LocalConfig,
        num_beams: Option<usize>,
        max_length: Option<usize>,
    ) -> Result<Self, ModelLoadError> {
        let files = match &settings.model_dir {
            Some(dir) => ModelFiles::from_dir(dir)?,
            None => ModelFiles::from_hub(model_id)?,
        };

        let device = if settings.cpu {
            Device::Cpu
        } else {
            Device::cuda_if_available(0)?
        };

        let mut config: t5::Config = serde_json::from_str(&std::fs::read_to_string(&files.config)?)?;
        // Every step re-decodes the full prefix, so the decoder cache is never reused.
        config.use_cache = false;

        let tokenizer = Tokenizer::from_file(&files.tokenizer)
            .map_err(|e| ModelLoadError::Tokenizer(e.to_string()))?;

        let dtype = match settings.precision {
            Precision::F32 => DType::F32,
            Precision::F16 => DType::F16,
            Precision::Bf16 => DType::BF16,
        };
        if dtype != DType::F32 && device.is_cpu() {
            warn!(?dtype, "Reduced precision on CPU may be slow or unsupported");
        }

        // SAFETY: the weights file is not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[&files.weights], dtype, &device)? };
        let model = t5::T5ForConditionalGeneration::load(vb, &config)?;

        let start_token = config
            .decoder_start_token_id
            .unwrap_or(config.pad_token_id) as TokenId;

        info!(
            model = model_id,
            weights = %files.weights.display(),
            ?dtype,
            device = ?device,
            "Loaded local seq2seq model"
        );

        Ok(Self {
            model_id: model_id.to_string(),
            runner: Arc::new(Mutex::new(Seq2SeqRunner {
                model,
                tokenizer,
                device,
                num_beams: num_beams.unwrap_or(1).max(1),
                max_length: max_length.unwrap_or(DEFAULT_MAX_LENGTH),
                start_token,
                eos_token: config.eos_token_id as TokenId,
            })),
        })
    }
}

#[async_trait]
impl InferenceBackend for LocalSeq2Seq {
    fn name(&self) -> &str {
        "local"
    }

    fn model(&self) -> &str {
        &self.model_id
    }

    fn error_label(&self, _code: u16) -> String {
        "Local model error".to_string()
    }

    async fn infer(&self, prompt: &str) -> InferenceResult {
        let runner = self.runner.clone();
        let prompt = prompt.to_string();

        let joined = tokio::task::spawn_blocking(move || {
            let mut runner = runner
                .lock()
                .map_err(|_| "model lock poisoned".to_string())?;
            runner.generate(&prompt).map_err(|e| e.to_string())
        })
        .await;

        match joined {
            Ok(Ok(text)) => InferenceResult::Success(text),
            Ok(Err(message)) => {
                warn!(error = %message, "Local generation failed");
                InferenceResult::ProviderError {
                    code: 500,
                    raw: message,
                }
            }
            Err(e) => InferenceResult::ProviderError {
                code: 500,
                raw: format!("generation task failed: {e}"),
            },
        }
    }
}
