//! In-memory [`VectorStore`] for tests and single-process use.
//!
//! Records live in a `Vec` behind a `std::sync::RwLock`; search is a
//! brute-force cosine scan.

use std::sync::RwLock;

use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::error::{IngestError, Result};

use super::{SearchHit, VectorRecord, VectorStore};

#[derive(Default)]
pub struct InMemoryVectorStore {
    records: RwLock<Vec<VectorRecord>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> IngestError {
    IngestError::VectorStore("in-memory store lock poisoned".to_string())
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn add(&self, records: &[VectorRecord]) -> Result<usize> {
        let mut stored = self.records.write().map_err(poisoned)?;
        for record in records {
            stored.retain(|r| r.id != record.id);
            stored.push(record.clone());
        }
        Ok(records.len())
    }

    async fn similarity_search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let stored = self.records.read().map_err(poisoned)?;
        let mut hits: Vec<SearchHit> = stored
            .iter()
            .map(|r| SearchHit {
                id: r.id.clone(),
                text: r.text.clone(),
                metadata: r.metadata.clone(),
                score: cosine_similarity(query, &r.vector),
            })
            .collect();
        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.records.read().map_err(poisoned)?.len())
    }
}
