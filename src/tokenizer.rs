//! Token estimator construction.
//!
//! `kind = "chars"` uses the character-ratio heuristic from the core crate.
//! `kind = "file"` loads a Hugging Face `tokenizer.json` once at startup
//! and counts encoded tokens (feature `tokenizer-table`).

use std::sync::Arc;

use anyhow::{bail, Result};
use text2vector_core::token::{CharRatioEstimator, TokenEstimator};

use crate::config::TokenizerConfig;

pub fn create_estimator(config: &TokenizerConfig) -> Result<Arc<dyn TokenEstimator>> {
    match config.kind.as_str() {
        "chars" => Ok(Arc::new(CharRatioEstimator::new(config.chars_per_token))),
        #[cfg(feature = "tokenizer-table")]
        "file" => {
            let path = config
                .path
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("tokenizer.path required for kind 'file'"))?;
            Ok(Arc::new(table::TableEstimator::from_file(path)?))
        }
        #[cfg(not(feature = "tokenizer-table"))]
        "file" => bail!("tokenizer kind 'file' requires --features tokenizer-table"),
        other => bail!("Unknown tokenizer kind: {}", other),
    }
}

#[cfg(feature = "tokenizer-table")]
mod table {
    use std::path::Path;

    use anyhow::Result;
    use text2vector_core::token::TokenEstimator;
    use tracing::warn;

    /// Counts tokens with a pre-loaded tokenizer table.
    pub struct TableEstimator {
        tokenizer: tokenizers::Tokenizer,
        name: String,
    }

    impl TableEstimator {
        pub fn from_file(path: &Path) -> Result<Self> {
            let tokenizer = tokenizers::Tokenizer::from_file(path).map_err(|e| {
                anyhow::anyhow!("Failed to load tokenizer {}: {}", path.display(), e)
            })?;
            Ok(Self {
                tokenizer,
                name: format!("table:{}", path.display()),
            })
        }
    }

    impl TokenEstimator for TableEstimator {
        fn estimate(&self, text: &str) -> usize {
            match self.tokenizer.encode(text, false) {
                Ok(encoding) => encoding.len(),
                Err(e) => {
                    // Ratio heuristic as a fallback.
                    warn!(error = %e, "tokenizer failed; using character estimate");
                    text.chars().count().div_ceil(text2vector_core::token::CHARS_PER_TOKEN)
                }
            }
        }

        fn name(&self) -> &str {
            &self.name
        }
    }
}
