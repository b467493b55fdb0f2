//! Vector store abstraction.
//!
//! The [`VectorStore`] trait is the second external collaborator of the
//! pipeline: the storage entry point hands it embedded segments, and the
//! search entry point queries it by vector. Backends must be
//! `Send + Sync` so they can be shared across async tasks.

pub mod memory;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::TextSegment;

pub use memory::InMemoryVectorStore;

/// One embedded segment ready for persistence.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub sequence_index: usize,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    pub vector: Vec<f32>,
}

impl VectorRecord {
    pub fn from_segment(id: impl Into<String>, segment: TextSegment, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            sequence_index: segment.sequence_index,
            text: segment.text,
            metadata: segment.metadata,
            vector,
        }
    }
}

/// A stored segment returned by similarity search, most similar first.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub id: String,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
    pub score: f32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Persist records; returns how many were written. A store may skip
    /// records whose content it already holds.
    async fn add(&self, records: &[VectorRecord]) -> Result<usize>;

    /// Return up to `top_k` records ranked by cosine similarity to `query`.
    async fn similarity_search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>>;

    /// Number of stored records.
    async fn count(&self) -> Result<usize>;
}
