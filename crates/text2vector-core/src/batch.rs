//! Token-budget batching of extracted segments.
//!
//! Segments are grouped greedily, in `sequence_index` order, into
//! [`EmbeddingBatch`]es whose estimated token total stays within a ceiling.
//! A segment is never split: one whose own estimate exceeds the ceiling is
//! isolated in a single-segment batch flagged `oversized`, and a warning is
//! logged. Whether the backend accepts such a batch is its own concern.

use tracing::{debug, warn};

use crate::error::{IngestError, Result};
use crate::models::{EmbeddingBatch, TextSegment};
use crate::token::TokenEstimator;

/// Groups segments into embedding requests bounded by `max_tokens_per_batch`.
#[derive(Debug, Clone, Copy)]
pub struct ChunkBatcher {
    max_tokens_per_batch: usize,
}

impl ChunkBatcher {
    /// Fails with [`IngestError::InvalidConfiguration`] when the ceiling is zero.
    pub fn new(max_tokens_per_batch: usize) -> Result<Self> {
        if max_tokens_per_batch == 0 {
            return Err(IngestError::InvalidConfiguration(
                "max_tokens_per_batch must be > 0".to_string(),
            ));
        }
        Ok(Self {
            max_tokens_per_batch,
        })
    }

    pub fn max_tokens_per_batch(&self) -> usize {
        self.max_tokens_per_batch
    }

    /// Partition `segments` into ordered batches.
    ///
    /// Every input segment appears in exactly one batch, and concatenating
    /// the batches yields the input sorted by `sequence_index` (ties keep
    /// their input order).
    pub fn batch(
        &self,
        mut segments: Vec<TextSegment>,
        estimator: &dyn TokenEstimator,
    ) -> Vec<EmbeddingBatch> {
        segments.sort_by_key(|s| s.sequence_index);

        let max = self.max_tokens_per_batch;
        let mut batches = Vec::new();
        let mut current: Vec<TextSegment> = Vec::new();
        let mut running = 0usize;

        for segment in segments {
            let tokens = estimator.estimate(&segment.text);

            if tokens > max {
                warn!(
                    source = segment.source(),
                    sequence_index = segment.sequence_index,
                    estimated_tokens = tokens,
                    max_tokens_per_batch = max,
                    "segment exceeds token ceiling; sending it as its own batch"
                );
                flush(&mut batches, &mut current, &mut running);
                batches.push(EmbeddingBatch {
                    segments: vec![segment],
                    estimated_tokens: tokens,
                    oversized: true,
                });
                continue;
            }

            if !current.is_empty() && running + tokens > max {
                flush(&mut batches, &mut current, &mut running);
            }
            running += tokens;
            current.push(segment);
        }
        flush(&mut batches, &mut current, &mut running);

        debug!(
            batches = batches.len(),
            estimator = estimator.name(),
            max_tokens_per_batch = max,
            "segments batched"
        );
        batches
    }
}

fn flush(batches: &mut Vec<EmbeddingBatch>, current: &mut Vec<TextSegment>, running: &mut usize) {
    if current.is_empty() {
        return;
    }
    batches.push(EmbeddingBatch {
        segments: std::mem::take(current),
        estimated_tokens: *running,
        oversized: false,
    });
    *running = 0;
}

/// One-shot form of [`ChunkBatcher::batch`].
pub fn batch_segments(
    segments: Vec<TextSegment>,
    estimator: &dyn TokenEstimator,
    max_tokens_per_batch: usize,
) -> Result<Vec<EmbeddingBatch>> {
    Ok(ChunkBatcher::new(max_tokens_per_batch)?.batch(segments, estimator))
}
