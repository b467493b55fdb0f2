//! Ingestion orchestration.
//!
//! [`Ingestor`] runs the pipeline for each resource:
//! detect → extract → batch → embed → zip vectors back onto segments.
//! Resources are processed sequentially and independently: in the
//! multi-resource entry points ([`Ingestor::ingest`], [`Ingestor::store`])
//! a failure is recorded on that resource's [`IngestionResult`] and never
//! aborts its siblings.
//!
//! The raw-text path ([`Ingestor::embed_texts`]) skips detection and
//! extraction and sends all strings to the backend as one implicit batch.

use std::sync::Arc;

use serde::Serialize;
use text2vector_core::batch::ChunkBatcher;
use text2vector_core::embedding::{mean_pool, EmbedOptions, EmbeddingBackend};
use text2vector_core::models::{FileType, IngestionResult, IngestionStatus, Resource, TextSegment};
use text2vector_core::store::{SearchHit, VectorRecord, VectorStore};
use text2vector_core::token::TokenEstimator;
use text2vector_core::{IngestError, Result};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::detect::detect;
use crate::embedding::create_backend;
use crate::extract::ExtractorRegistry;
use crate::tokenizer::create_estimator;

/// One resource after a successful pass through the pipeline.
#[derive(Debug, Clone)]
pub struct IngestedDocument {
    pub filename: String,
    pub file_type: FileType,
    /// Segments in `sequence_index` order.
    pub segments: Vec<TextSegment>,
    /// One vector per segment, same order.
    pub vectors: Vec<Vec<f32>>,
    pub batches: usize,
    pub oversized_batches: usize,
}

impl IngestedDocument {
    /// True when the resource held no extractable text.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn into_result(self) -> IngestionResult {
        if self.is_empty() {
            return IngestionResult::empty(&self.filename, self.file_type);
        }
        IngestionResult {
            filename: self.filename,
            file_type: Some(self.file_type),
            chunk_count: self.segments.len(),
            vectors: self.vectors,
            status: IngestionStatus::Ok,
        }
    }
}

/// Aggregate embedding of a list of raw strings.
#[derive(Debug, Clone, Serialize)]
pub struct TextEmbedding {
    pub texts: Vec<String>,
    pub vector: Vec<f32>,
    pub length: usize,
}

pub struct Ingestor {
    registry: Arc<ExtractorRegistry>,
    estimator: Arc<dyn TokenEstimator>,
    backend: Arc<dyn EmbeddingBackend>,
    batcher: ChunkBatcher,
    options: EmbedOptions,
}

impl Ingestor {
    /// Fails with [`IngestError::InvalidConfiguration`] when
    /// `max_tokens_per_batch` is zero.
    pub fn new(
        backend: Arc<dyn EmbeddingBackend>,
        estimator: Arc<dyn TokenEstimator>,
        max_tokens_per_batch: usize,
    ) -> Result<Self> {
        Ok(Self {
            registry: ExtractorRegistry::global(),
            estimator,
            backend,
            batcher: ChunkBatcher::new(max_tokens_per_batch)?,
            options: EmbedOptions::default(),
        })
    }

    /// Build the backend, estimator and batcher described by `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let backend = create_backend(&config.embedding)?;
        let estimator = create_estimator(&config.tokenizer)?;
        Ok(Self::new(
            backend,
            estimator,
            config.batching.max_tokens_per_batch,
        )?)
    }

    pub fn with_registry(mut self, registry: Arc<ExtractorRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_options(mut self, options: EmbedOptions) -> Self {
        self.options = options;
        self
    }

    /// Run the full pipeline for one resource, failing with the first error.
    pub async fn ingest_resource(&self, resource: Resource) -> Result<IngestedDocument> {
        let file_type = detect(resource.bytes(), resource.filename())?;
        self.embed_document(resource, file_type).await
    }

    async fn embed_document(
        &self,
        resource: Resource,
        file_type: FileType,
    ) -> Result<IngestedDocument> {
        let filename = resource.source_label().to_string();
        let segments = self
            .registry
            .extractor_for(file_type)?
            .extract(&resource)?;
        drop(resource);

        let mut document = IngestedDocument {
            filename,
            file_type,
            segments: Vec::with_capacity(segments.len()),
            vectors: Vec::with_capacity(segments.len()),
            batches: 0,
            oversized_batches: 0,
        };
        if segments.is_empty() {
            return Ok(document);
        }

        let batches = self.batcher.batch(segments, self.estimator.as_ref());
        document.batches = batches.len();

        for (index, batch) in batches.into_iter().enumerate() {
            debug!(
                filename = %document.filename,
                batch = index,
                segments = batch.len(),
                estimated_tokens = batch.estimated_tokens,
                oversized = batch.oversized,
                "embedding batch"
            );
            if batch.oversized {
                document.oversized_batches += 1;
            }

            let vectors = self.backend.embed(&batch.texts(), &self.options).await?;
            if vectors.len() != batch.len() {
                return Err(IngestError::backend(format!(
                    "expected {} vectors, backend returned {}",
                    batch.len(),
                    vectors.len()
                )));
            }
            document.segments.extend(batch.segments);
            document.vectors.extend(vectors);
        }

        info!(
            filename = %document.filename,
            file_type = %document.file_type,
            segments = document.segments.len(),
            batches = document.batches,
            "resource embedded"
        );
        Ok(document)
    }

    /// Run one resource; a failure comes back as its `Failed` result.
    async fn run_one(
        &self,
        resource: Resource,
    ) -> std::result::Result<IngestedDocument, IngestionResult> {
        let filename = resource.source_label().to_string();
        let outcome = match detect(resource.bytes(), resource.filename()) {
            Ok(file_type) => self
                .embed_document(resource, file_type)
                .await
                .map_err(|e| (Some(file_type), e)),
            Err(e) => Err((None, e)),
        };

        outcome.map_err(|(file_type, err)| {
            warn!(filename = %filename, kind = err.kind(), error = %err, "resource failed");
            IngestionResult::failed(&filename, file_type, &err)
        })
    }

    /// Embed every resource; the result has one entry per input, in order.
    pub async fn ingest(&self, resources: Vec<Resource>) -> Vec<IngestionResult> {
        let mut results = Vec::with_capacity(resources.len());
        for resource in resources {
            let result = match self.run_one(resource).await {
                Ok(document) => document.into_result(),
                Err(failed) => failed,
            };
            results.push(result);
        }
        results
    }

    /// Embed every resource and persist its segments in `store`.
    ///
    /// Returned results carry chunk counts but no vectors. A store failure
    /// fails only the resource being written.
    pub async fn store(
        &self,
        resources: Vec<Resource>,
        store: &dyn VectorStore,
    ) -> Vec<IngestionResult> {
        let mut results = Vec::with_capacity(resources.len());
        for resource in resources {
            let document = match self.run_one(resource).await {
                Ok(document) if !document.is_empty() => document,
                Ok(empty) => {
                    results.push(empty.into_result());
                    continue;
                }
                Err(failed) => {
                    results.push(failed);
                    continue;
                }
            };

            let filename = document.filename;
            let file_type = document.file_type;
            let chunk_count = document.segments.len();
            let records: Vec<VectorRecord> = document
                .segments
                .into_iter()
                .zip(document.vectors)
                .map(|(segment, vector)| {
                    VectorRecord::from_segment(Uuid::new_v4().to_string(), segment, vector)
                })
                .collect();

            let result = match store.add(&records).await {
                Ok(written) => {
                    info!(filename = %filename, records = written, "segments stored");
                    IngestionResult {
                        filename,
                        file_type: Some(file_type),
                        chunk_count,
                        vectors: Vec::new(),
                        status: IngestionStatus::Ok,
                    }
                }
                Err(err) => {
                    warn!(filename = %filename, kind = err.kind(), error = %err, "store failed");
                    IngestionResult::failed(&filename, Some(file_type), &err)
                }
            };
            results.push(result);
        }
        results
    }

    /// Embed raw strings as one implicit batch and return their mean vector.
    ///
    /// Every non-blank string contributes to the result: the vector is the
    /// element-wise mean over all of them, not the first string's vector.
    /// Blank strings are not sent to the backend but are echoed back in
    /// [`TextEmbedding::texts`] with the rest of the request. An empty or
    /// all-blank list fails with [`IngestError::InvalidInput`].
    pub async fn embed_texts(&self, request: &[String]) -> Result<TextEmbedding> {
        let texts: Vec<String> = request
            .iter()
            .filter(|t| !t.trim().is_empty())
            .cloned()
            .collect();
        if texts.is_empty() {
            return Err(IngestError::InvalidInput(
                "at least one non-blank text is required".to_string(),
            ));
        }

        let estimated: usize = texts.iter().map(|t| self.estimator.estimate(t)).sum();
        let max = self.batcher.max_tokens_per_batch();
        if estimated > max {
            warn!(
                estimated_tokens = estimated,
                max_tokens_per_batch = max,
                "text request exceeds token ceiling; sending as one batch"
            );
        }

        let vectors = self.backend.embed(&texts, &self.options).await?;
        if vectors.len() != texts.len() {
            return Err(IngestError::backend(format!(
                "expected {} vectors, backend returned {}",
                texts.len(),
                vectors.len()
            )));
        }
        let vector = mean_pool(&vectors)
            .ok_or_else(|| IngestError::backend("backend returned vectors of differing lengths"))?;
        Ok(TextEmbedding {
            length: vector.len(),
            texts: request.to_vec(),
            vector,
        })
    }

    /// Embed `query` and return the `top_k` most similar stored segments.
    pub async fn search(
        &self,
        query: &str,
        top_k: usize,
        store: &dyn VectorStore,
    ) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(IngestError::InvalidInput("query must not be empty".to_string()));
        }
        if top_k == 0 {
            return Err(IngestError::InvalidInput("top_k must be > 0".to_string()));
        }
        let vector = self
            .backend
            .embed(&[query.to_string()], &self.options)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| IngestError::backend("empty embedding response"))?;
        store.similarity_search(&vector, top_k).await
    }
}
