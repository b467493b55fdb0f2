//! Offline feature-hashing embedder.
//!
//! Each lowercase word is hashed with SHA-256 into one of `dims` buckets
//! with a ±1 sign, and the resulting bag-of-words vector is L2-normalised.
//! Output is deterministic across runs and machines, which makes this
//! backend useful for tests and air-gapped setups. It captures lexical
//! overlap only, not semantics.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use text2vector_core::embedding::{EmbedOptions, EmbeddingBackend};
use text2vector_core::Result;

pub struct HashingBackend {
    dims: usize,
}

impl HashingBackend {
    pub fn new(dims: usize) -> anyhow::Result<Self> {
        if dims == 0 {
            anyhow::bail!("embedding.dims must be > 0 for hash provider");
        }
        Ok(Self { dims })
    }

    fn embed_one(&self, text: &str, dims: usize) -> Vec<f32> {
        let mut vector = vec![0.0f32; dims];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let digest = Sha256::digest(word.to_lowercase().as_bytes());
            let mut head = [0u8; 8];
            head.copy_from_slice(&digest[..8]);
            let bucket = (u64::from_le_bytes(head) % dims as u64) as usize;
            let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

#[async_trait]
impl EmbeddingBackend for HashingBackend {
    fn model_name(&self) -> &str {
        "hash"
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String], options: &EmbedOptions) -> Result<Vec<Vec<f32>>> {
        let dims = options.dimensions.filter(|d| *d > 0).unwrap_or(self.dims);
        Ok(texts.iter().map(|t| self.embed_one(t, dims)).collect())
    }
}
