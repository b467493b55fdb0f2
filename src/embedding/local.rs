//! Local inference via fastembed.
//!
//! Models are downloaded from Hugging Face on first use and cached; after
//! that no network calls are made. The model is loaded once and reused,
//! guarded by a mutex because fastembed's `embed` takes `&mut self`.

use std::sync::{Arc, Mutex};

use anyhow::bail;
use async_trait::async_trait;
use text2vector_core::embedding::{EmbedOptions, EmbeddingBackend};
use text2vector_core::{IngestError, Result};
use tracing::info;

use crate::config::EmbeddingConfig;

const DEFAULT_MODEL: &str = "all-minilm-l6-v2";

pub struct LocalBackend {
    model_name: String,
    dims: usize,
    model: fastembed::EmbeddingModel,
    loaded: Arc<Mutex<Option<fastembed::TextEmbedding>>>,
}

impl LocalBackend {
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let model_name = config
            .model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let model = config_to_fastembed_model(&model_name)?;
        let dims = config.dims.unwrap_or_else(|| default_dims(&model_name));
        Ok(Self {
            model_name,
            dims,
            model,
            loaded: Arc::new(Mutex::new(None)),
        })
    }
}

fn default_dims(model_name: &str) -> usize {
    match model_name {
        "bge-base-en-v1.5" | "nomic-embed-text-v1" | "nomic-embed-text-v1.5"
        | "multilingual-e5-base" => 768,
        "bge-large-en-v1.5" | "multilingual-e5-large" => 1024,
        _ => 384,
    }
}

fn config_to_fastembed_model(name: &str) -> anyhow::Result<fastembed::EmbeddingModel> {
    match name {
        "all-minilm-l6-v2" => Ok(fastembed::EmbeddingModel::AllMiniLML6V2),
        "bge-small-en-v1.5" => Ok(fastembed::EmbeddingModel::BGESmallENV15),
        "bge-base-en-v1.5" => Ok(fastembed::EmbeddingModel::BGEBaseENV15),
        "bge-large-en-v1.5" => Ok(fastembed::EmbeddingModel::BGELargeENV15),
        "nomic-embed-text-v1" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV1),
        "nomic-embed-text-v1.5" => Ok(fastembed::EmbeddingModel::NomicEmbedTextV15),
        "multilingual-e5-small" => Ok(fastembed::EmbeddingModel::MultilingualE5Small),
        "multilingual-e5-base" => Ok(fastembed::EmbeddingModel::MultilingualE5Base),
        "multilingual-e5-large" => Ok(fastembed::EmbeddingModel::MultilingualE5Large),
        other => bail!(
            "Unknown local embedding model: '{}'. Supported models: \
             all-minilm-l6-v2, bge-small-en-v1.5, bge-base-en-v1.5, bge-large-en-v1.5, \
             nomic-embed-text-v1, nomic-embed-text-v1.5, \
             multilingual-e5-small, multilingual-e5-base, multilingual-e5-large",
            other
        ),
    }
}

#[async_trait]
impl EmbeddingBackend for LocalBackend {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String], _options: &EmbedOptions) -> Result<Vec<Vec<f32>>> {
        let texts = texts.to_vec();
        let loaded = Arc::clone(&self.loaded);
        let model = self.model.clone();
        let model_name = self.model_name.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = loaded
                .lock()
                .map_err(|_| IngestError::backend("local model lock poisoned"))?;
            if guard.is_none() {
                info!(model = %model_name, "loading local embedding model");
                let embedding = fastembed::TextEmbedding::try_new(
                    fastembed::InitOptions::new(model).with_show_download_progress(true),
                )
                .map_err(|e| {
                    IngestError::unavailable(format!(
                        "Failed to initialize local embedding model: {}",
                        e
                    ))
                })?;
                *guard = Some(embedding);
            }
            match guard.as_mut() {
                Some(embedding) => embedding
                    .embed(texts, None)
                    .map_err(|e| IngestError::backend(format!("Local embedding failed: {}", e))),
                None => Err(IngestError::unavailable("local embedding model not loaded")),
            }
        })
        .await
        .map_err(|e| IngestError::backend(format!("local embedding task failed: {}", e)))?
    }
}
