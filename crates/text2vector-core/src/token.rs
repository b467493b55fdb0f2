//! Token estimation for batch sizing.
//!
//! Estimators approximate how many tokens an embedding model will consume
//! for a piece of text. They are built once at startup and shared
//! read-only, so implementations must be `Send + Sync` and free of side
//! effects.

/// Default characters-per-token ratio for English prose.
pub const CHARS_PER_TOKEN: usize = 4;

/// Approximates the token count of a text.
///
/// Implementations must be deterministic, and the default estimator is
/// monotonic in text length: appending text never lowers the count.
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;

    /// Short name used in logs (e.g. `"chars/4"`).
    fn name(&self) -> &str;
}

/// Counts Unicode scalar values and divides by a fixed ratio, rounding up.
#[derive(Debug, Clone)]
pub struct CharRatioEstimator {
    chars_per_token: usize,
    name: String,
}

impl CharRatioEstimator {
    /// A ratio of zero is treated as one.
    pub fn new(chars_per_token: usize) -> Self {
        let chars_per_token = chars_per_token.max(1);
        Self {
            chars_per_token,
            name: format!("chars/{}", chars_per_token),
        }
    }
}

impl Default for CharRatioEstimator {
    fn default() -> Self {
        Self::new(CHARS_PER_TOKEN)
    }
}

impl TokenEstimator for CharRatioEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count().div_ceil(self.chars_per_token)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
