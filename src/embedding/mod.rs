//! Embedding backends.
//!
//! Concrete implementations of [`EmbeddingBackend`]:
//! - **[`DisabledBackend`]**: always unavailable; the default when no provider is configured.
//! - **[`HashingBackend`]**: deterministic offline feature hashing, no network.
//! - **[`OpenAIBackend`]**: `POST /v1/embeddings` with retry and backoff.
//! - **[`OllamaBackend`]**: a local Ollama instance's `/api/embed` endpoint.
//! - **`LocalBackend`**: fastembed inference (feature `local-embeddings-fastembed`).
//!
//! Use [`create_backend`] to build the configured one.
//!
//! # Retry Strategy
//!
//! Remote backends use exponential backoff for transient errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately with `EmbeddingBackendError`
//! - Network errors → retry
//! - Retries exhausted → `EmbeddingBackendUnavailable`
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

mod hashed;
#[cfg(feature = "local-embeddings-fastembed")]
mod local;

pub use hashed::HashingBackend;
#[cfg(feature = "local-embeddings-fastembed")]
pub use local::LocalBackend;

use std::sync::Arc;
use std::time::Duration;

use anyhow::bail;
use async_trait::async_trait;
use text2vector_core::embedding::{EmbedOptions, EmbeddingBackend};
use text2vector_core::{IngestError, Result};
use tracing::warn;

use crate::config::EmbeddingConfig;

const OPENAI_URL: &str = "https://api.openai.com";
const OLLAMA_URL: &str = "http://localhost:11434";

// ============ Disabled ============

/// A backend that refuses every request.
pub struct DisabledBackend;

#[async_trait]
impl EmbeddingBackend for DisabledBackend {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _texts: &[String], _options: &EmbedOptions) -> Result<Vec<Vec<f32>>> {
        Err(IngestError::unavailable(
            "embedding provider is disabled; set [embedding] provider in the config",
        ))
    }
}

// ============ Shared HTTP plumbing ============

fn http_client(timeout_secs: u64) -> anyhow::Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?)
}

/// What to do with a non-success HTTP status.
#[derive(Debug, PartialEq, Eq)]
enum StatusAction {
    Retry,
    Fail,
}

fn classify_status(status: reqwest::StatusCode) -> StatusAction {
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        StatusAction::Retry
    } else {
        StatusAction::Fail
    }
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt - 1).min(5))
}

/// POST `body` as JSON and return the decoded JSON response, retrying
/// transient failures up to `max_retries` times.
async fn post_json_with_retry(
    client: &reqwest::Client,
    label: &str,
    url: &str,
    bearer: Option<&str>,
    body: &serde_json::Value,
    max_retries: u32,
) -> Result<serde_json::Value> {
    let mut last_err = String::new();

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff(attempt);
            warn!(
                backend = label,
                attempt,
                delay_secs = delay.as_secs(),
                error = %last_err,
                "retrying embedding request"
            );
            tokio::time::sleep(delay).await;
        }

        let mut request = client.post(url).json(body);
        if let Some(key) = bearer {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return response.json::<serde_json::Value>().await.map_err(|e| {
                        IngestError::backend(format!("{}: invalid response body: {}", label, e))
                    });
                }

                let body_text = response.text().await.unwrap_or_default();
                match classify_status(status) {
                    StatusAction::Retry => {
                        last_err = format!("{} API error {}: {}", label, status, body_text);
                    }
                    StatusAction::Fail => {
                        return Err(IngestError::backend(format!(
                            "{} API error {}: {}",
                            label, status, body_text
                        )));
                    }
                }
            }
            Err(e) => {
                last_err = format!("{} connection error ({}): {}", label, url, e);
            }
        }
    }

    Err(IngestError::unavailable(format!(
        "{} after {} attempt(s)",
        last_err,
        max_retries + 1
    )))
}

fn json_to_vector(value: &serde_json::Value, label: &str) -> Result<Vec<f32>> {
    value
        .as_array()
        .ok_or_else(|| IngestError::backend(format!("{}: embedding is not an array", label)))?
        .iter()
        .map(|v| {
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| IngestError::backend(format!("{}: non-numeric component", label)))
        })
        .collect()
}

// ============ OpenAI ============

/// Embedding backend using the OpenAI API.
///
/// Requires the `OPENAI_API_KEY` environment variable. Supports the
/// `dimensions` request option of the `text-embedding-3-*` models.
pub struct OpenAIBackend {
    model: String,
    dims: usize,
    api_key: String,
    base_url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OpenAIBackend {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.is_empty() => key,
            _ => bail!("OPENAI_API_KEY environment variable not set"),
        };

        Ok(Self {
            model,
            dims,
            api_key,
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_URL.to_string()),
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAIBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String], options: &EmbedOptions) -> Result<Vec<Vec<f32>>> {
        let mut body = serde_json::json!({
            "model": options.model.as_deref().unwrap_or(&self.model),
            "input": texts,
        });
        if let Some(dimensions) = options.dimensions {
            body["dimensions"] = serde_json::json!(dimensions);
        }

        let url = format!("{}/v1/embeddings", self.base_url.trim_end_matches('/'));
        let json = post_json_with_retry(
            &self.client,
            "OpenAI",
            &url,
            Some(&self.api_key),
            &body,
            self.max_retries,
        )
        .await?;
        parse_openai_response(&json)
    }
}

/// Extract `data[].embedding`, ordered by each item's `index`.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| IngestError::backend("Invalid OpenAI response: missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());
    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .ok_or_else(|| IngestError::backend("Invalid OpenAI response: missing embedding"))?;
        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, json_to_vector(embedding, "OpenAI")?));
    }
    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, v)| v).collect())
}

// ============ Ollama ============

/// Embedding backend using a local Ollama instance.
///
/// Requires Ollama running with an embedding model pulled
/// (e.g. `ollama pull nomic-embed-text`).
pub struct OllamaBackend {
    model: String,
    dims: usize,
    url: String,
    max_retries: u32,
    client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for Ollama provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| OLLAMA_URL.to_string());

        Ok(Self {
            model,
            dims,
            url,
            max_retries: config.max_retries,
            client: http_client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OllamaBackend {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String], options: &EmbedOptions) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": options.model.as_deref().unwrap_or(&self.model),
            "input": texts,
        });
        let url = format!("{}/api/embed", self.url.trim_end_matches('/'));
        let json = post_json_with_retry(
            &self.client,
            "Ollama",
            &url,
            None,
            &body,
            self.max_retries,
        )
        .await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    json.get("embeddings")
        .and_then(|e| e.as_array())
        .ok_or_else(|| IngestError::backend("Invalid Ollama response: missing embeddings array"))?
        .iter()
        .map(|e| json_to_vector(e, "Ollama"))
        .collect()
}

// ============ Factory ============

/// Build the [`EmbeddingBackend`] named by `config.provider`.
///
/// | Config Value | Backend |
/// |-------------|----------|
/// | `"disabled"` | [`DisabledBackend`] |
/// | `"hash"` | [`HashingBackend`] |
/// | `"openai"` | [`OpenAIBackend`] |
/// | `"ollama"` | [`OllamaBackend`] |
/// | `"local"` | `LocalBackend` (feature `local-embeddings-fastembed`) |
pub fn create_backend(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn EmbeddingBackend>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledBackend)),
        "hash" => {
            let dims = config
                .dims
                .ok_or_else(|| anyhow::anyhow!("embedding.dims required for hash provider"))?;
            Ok(Arc::new(HashingBackend::new(dims)?))
        }
        "openai" => Ok(Arc::new(OpenAIBackend::new(config)?)),
        "ollama" => Ok(Arc::new(OllamaBackend::new(config)?)),
        #[cfg(feature = "local-embeddings-fastembed")]
        "local" => Ok(Arc::new(LocalBackend::new(config)?)),
        #[cfg(not(feature = "local-embeddings-fastembed"))]
        "local" => bail!(
            "Local embedding provider requires --features local-embeddings-fastembed"
        ),
        other => bail!("Unknown embedding provider: {}", other),
    }
}
