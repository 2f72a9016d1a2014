//! Runtime configuration for voice-sql.
//!
//! Configuration is loaded from an optional JSON file and then overridden by
//! command-line arguments and environment variables (`PORT`, `HF_API_KEY`).
//! A [`Profile`] bundles the model, prompt style and decoding defaults of one
//! deployment variant; the file can override each of them individually.

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prompt::PromptStyle;

/// Hosted inference router base. The model id is appended as a path suffix.
pub const DEFAULT_ENDPOINT_BASE: &str = "https://router.huggingface.co/hf-inference/models";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Command-line arguments.
#[derive(Parser, Debug, Clone)]
#[command(name = "voice-sql", about = "Natural-language to SQL inference service")]
pub struct Cli {
    /// Path to configuration file (JSON).
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Listen host.
    #[arg(long)]
    pub host: Option<String>,

    /// Listen port.
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Model profile to serve.
    #[arg(long, value_enum)]
    pub profile: Option<Profile>,

    /// Bearer credential for the hosted inference endpoint.
    #[arg(long, env = "HF_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long)]
    pub log_json: bool,
}

/// Where generation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Hosted text-generation endpoint.
    Remote,
    /// In-process seq2seq model.
    Local,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Strategy::Remote => write!(f, "remote"),
            Strategy::Local => write!(f, "local"),
        }
    }
}

/// A deployment variant: target model, prompt format and decoding defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// FLAN-T5 large on the hosted router, few-shot prompt.
    #[default]
    FlanT5,
    /// Mistral instruct on the hosted router, `[INST]` wrapper.
    MistralInstruct,
    /// Small text-to-SQL T5 run in-process.
    T5Local,
}

impl Profile {
    pub fn strategy(&self) -> Strategy {
        match self {
            Profile::FlanT5 | Profile::MistralInstruct => Strategy::Remote,
            Profile::T5Local => Strategy::Local,
        }
    }

    pub fn model_id(&self) -> &'static str {
        match self {
            Profile::FlanT5 => "google/flan-t5-large",
            Profile::MistralInstruct => "mistralai/Mistral-7B-Instruct-v0.3",
            Profile::T5Local => "cssupport/t5-small-awesome-text-to-sql",
        }
    }

    pub fn prompt_style(&self) -> PromptStyle {
        match self {
            Profile::FlanT5 => PromptStyle::FewShot,
            Profile::MistralInstruct => PromptStyle::InstructionTags,
            Profile::T5Local => PromptStyle::TaskPrefix,
        }
    }

    pub fn decoding(&self) -> DecodingParams {
        match self {
            Profile::FlanT5 => DecodingParams::default(),
            Profile::MistralInstruct => DecodingParams {
                max_new_tokens: Some(100),
                temperature: Some(0.1),
                num_beams: None,
                return_full_text: Some(false),
            },
            Profile::T5Local => DecodingParams {
                max_new_tokens: Some(128),
                temperature: None,
                num_beams: Some(4),
                return_full_text: None,
            },
        }
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Profile::FlanT5 => write!(f, "flan-t5"),
            Profile::MistralInstruct => write!(f, "mistral-instruct"),
            Profile::T5Local => write!(f, "t5-local"),
        }
    }
}

/// Decoding options. Unset fields are left to the provider's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DecodingParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_new_tokens: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_beams: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_full_text: Option<bool>,
}

impl DecodingParams {
    pub fn is_empty(&self) -> bool {
        *self == DecodingParams::default()
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,

    /// Deployment variant.
    pub profile: Profile,

    /// Model id override (hub id for both strategies).
    pub model_id: Option<String>,

    /// Full endpoint URL override for the remote strategy.
    pub endpoint: Option<String>,

    /// Decoding override; replaces the profile's decoding defaults.
    pub decoding: Option<DecodingParams>,

    /// Local inference settings.
    pub local: LocalConfig,

    /// Bearer credential. Normally supplied via `HF_API_KEY`, never written to disk.
    #[serde(skip)]
    pub api_key: Option<String>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen host.
    pub host: String,

    /// Listen port.
    pub port: u16,

    /// Allow cross-origin requests from any origin.
    pub cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            cors: true,
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Weight precision applied once when the local model is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    #[default]
    F32,
    F16,
    Bf16,
}

/// Local (in-process) model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Directory holding `config.json`, `tokenizer.json` and `model.safetensors`.
    /// When unset, the files are fetched from the hub by model id.
    pub model_dir: Option<PathBuf>,

    /// Weight precision.
    pub precision: Precision,

    /// Force CPU even when an accelerator is available.
    pub cpu: bool,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            precision: Precision::F32,
            cpu: true,
        }
    }
}

impl Config {
    /// Load configuration from a JSON file, falling back to defaults when the file is absent.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let data = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply command-line and environment overrides.
    pub fn apply_cli(mut self, cli: &Cli) -> Self {
        if let Some(host) = &cli.host {
            self.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(profile) = cli.profile {
            self.profile = profile;
        }
        self.api_key = cli.api_key.clone().filter(|key| !key.is_empty());
        self
    }

    pub fn strategy(&self) -> Strategy {
        self.profile.strategy()
    }

    pub fn model_id(&self) -> &str {
        self.model_id
            .as_deref()
            .unwrap_or_else(|| self.profile.model_id())
    }

    pub fn prompt_style(&self) -> PromptStyle {
        self.profile.prompt_style()
    }

    pub fn decoding(&self) -> DecodingParams {
        self.decoding
            .clone()
            .unwrap_or_else(|| self.profile.decoding())
    }

    /// Remote endpoint URL for the configured model.
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(url) => url.clone(),
            None => format!("{}/{}", DEFAULT_ENDPOINT_BASE, self.model_id()),
        }
    }
}
