//! Embedding backend trait and vector utilities.
//!
//! The [`EmbeddingBackend`] trait is the narrow interface the pipeline uses
//! to turn text into vectors. Concrete backends (OpenAI, Ollama, fastembed,
//! the offline hashing embedder) live in the `text2vector` app crate.

use async_trait::async_trait;

use crate::error::Result;

/// Per-call knobs forwarded to the backend.
#[derive(Debug, Clone, Default)]
pub struct EmbedOptions {
    /// Override the configured model for this call.
    pub model: Option<String>,
    /// Requested output dimensionality, for backends that support it.
    pub dimensions: Option<usize>,
}

/// A service that embeds a batch of texts.
///
/// Implementations must return exactly one vector per input text, in input
/// order. Transport failures map to
/// [`IngestError::EmbeddingBackendUnavailable`](crate::IngestError::EmbeddingBackendUnavailable),
/// rejected requests and malformed responses to
/// [`IngestError::EmbeddingBackendError`](crate::IngestError::EmbeddingBackendError).
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Vector dimensionality produced by [`embed`](EmbeddingBackend::embed).
    fn dims(&self) -> usize;

    async fn embed(&self, texts: &[String], options: &EmbedOptions) -> Result<Vec<Vec<f32>>>;
}

/// Encode a vector as little-endian `f32` bytes (4 bytes per component).
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    vec.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Inverse of [`vec_to_blob`]. Trailing bytes that do not form a full
/// component are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty, mismatched or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let (dot, norm_a, norm_b) = a
        .iter()
        .zip(b)
        .fold((0.0f32, 0.0f32, 0.0f32), |(d, na, nb), (x, y)| {
            (d + x * y, na + x * x, nb + y * y)
        });
    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        0.0
    } else {
        dot / denom
    }
}

/// Element-wise mean of equally sized vectors. `None` when the input is
/// empty or the lengths disagree.
pub fn mean_pool(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let dims = first.len();
    if vectors.iter().any(|v| v.len() != dims) {
        return None;
    }
    let mut out = vec![0.0f32; dims];
    for v in vectors {
        for (acc, x) in out.iter_mut().zip(v) {
            *acc += x;
        }
    }
    let n = vectors.len() as f32;
    out.iter_mut().for_each(|x| *x /= n);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_round_trip() {
        let v = vec![1.0f32, -2.5, 3.125, 0.0];
        let blob = vec_to_blob(&v);
        assert_eq!(blob.len(), 16);
        assert_eq!(blob_to_vec(&blob), v);
    }

    #[test]
    fn cosine_of_parallel_and_orthogonal() {
        assert!((cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs_are_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn mean_pool_averages_components() {
        let pooled = mean_pool(&[vec![1.0, 3.0], vec![3.0, 5.0]]).unwrap();
        assert_eq!(pooled, vec![2.0, 4.0]);
        assert!(mean_pool(&[]).is_none());
        assert!(mean_pool(&[vec![1.0], vec![1.0, 2.0]]).is_none());
    }
}
