//! TOML configuration.
//!
//! Only `[db]` is required; every other section falls back to defaults.
//! [`load_config`] validates batching, tokenizer and embedding settings so
//! misconfiguration fails at startup instead of mid-request.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub batching: BatchingConfig,
    #[serde(default)]
    pub tokenizer: TokenizerConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BatchingConfig {
    #[serde(default = "default_max_tokens_per_batch")]
    pub max_tokens_per_batch: usize,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            max_tokens_per_batch: default_max_tokens_per_batch(),
        }
    }
}

fn default_max_tokens_per_batch() -> usize {
    8000
}

#[derive(Debug, Deserialize, Clone)]
pub struct TokenizerConfig {
    /// `"chars"` (ratio heuristic) or `"file"` (Hugging Face tokenizer.json).
    #[serde(default = "default_tokenizer_kind")]
    pub kind: String,
    #[serde(default = "default_chars_per_token")]
    pub chars_per_token: usize,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        Self {
            kind: default_tokenizer_kind(),
            chars_per_token: default_chars_per_token(),
            path: None,
        }
    }
}

fn default_tokenizer_kind() -> String {
    "chars".to_string()
}
fn default_chars_per_token() -> usize {
    text2vector_core::token::CHARS_PER_TOKEN
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.batching.max_tokens_per_batch == 0 {
        bail!("batching.max_tokens_per_batch must be > 0");
    }

    match config.tokenizer.kind.as_str() {
        "chars" => {
            if config.tokenizer.chars_per_token == 0 {
                bail!("tokenizer.chars_per_token must be > 0");
            }
        }
        "file" => {
            if config.tokenizer.path.is_none() {
                bail!("tokenizer.path must be set when tokenizer.kind is 'file'");
            }
        }
        other => bail!(
            "Unknown tokenizer kind: '{}'. Must be chars or file.",
            other
        ),
    }

    match config.embedding.provider.as_str() {
        "disabled" | "hash" | "local" => {}
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, hash, openai, ollama, or local.",
            other
        ),
    }

    if config.embedding.is_enabled()
        && config.embedding.provider != "local"
        && matches!(config.embedding.dims, None | Some(0))
    {
        bail!(
            "embedding.dims must be > 0 when provider is '{}'",
            config.embedding.provider
        );
    }

    Ok(())
}
