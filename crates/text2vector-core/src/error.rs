//! Error kinds for the ingestion pipeline.

use thiserror::Error;

/// Errors raised by detection, extraction, batching and the two external
/// collaborators (embedding backend, vector store).
///
/// Single-resource operations return these directly. Multi-resource
/// operations convert them into a per-resource
/// [`IngestionStatus::Failed`](crate::models::IngestionStatus::Failed)
/// using [`IngestError::kind`] as the machine-readable label.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Empty bytes, missing filename, or an empty text list.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Neither the content signature nor the filename maps to a supported
    /// format, or no extractor is registered for the detected one.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Format-specific decoding failed (corrupt archive, undecodable bytes, ...).
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    /// Bad batching or provider parameters.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The embedding backend could not be reached (network, retries exhausted, disabled).
    #[error("embedding backend unavailable: {0}")]
    EmbeddingBackendUnavailable(String),

    /// The embedding backend answered with an error or a malformed response.
    #[error("embedding backend error: {0}")]
    EmbeddingBackendError(String),

    /// The vector store rejected or failed an operation.
    #[error("vector store error: {0}")]
    VectorStore(String),
}

impl IngestError {
    /// Stable snake_case label for this error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::InvalidInput(_) => "invalid_input",
            IngestError::UnsupportedFormat(_) => "unsupported_format",
            IngestError::ExtractionFailed(_) => "extraction_failed",
            IngestError::InvalidConfiguration(_) => "invalid_configuration",
            IngestError::EmbeddingBackendUnavailable(_) => "embedding_backend_unavailable",
            IngestError::EmbeddingBackendError(_) => "embedding_backend_error",
            IngestError::VectorStore(_) => "vector_store_error",
        }
    }

    pub fn extraction(message: impl Into<String>) -> Self {
        Self::ExtractionFailed(message.into())
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::EmbeddingBackendError(message.into())
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::EmbeddingBackendUnavailable(message.into())
    }
}

/// Result alias used throughout the core.
pub type Result<T> = std::result::Result<T, IngestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_labels_are_distinct() {
        let errors = [
            IngestError::InvalidInput(String::new()),
            IngestError::UnsupportedFormat(String::new()),
            IngestError::extraction(""),
            IngestError::InvalidConfiguration(String::new()),
            IngestError::unavailable(""),
            IngestError::backend(""),
            IngestError::VectorStore(String::new()),
        ];
        let mut kinds: Vec<&str> = errors.iter().map(|e| e.kind()).collect();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn display_includes_cause() {
        let err = IngestError::extraction("word/document.xml not found");
        assert_eq!(
            err.to_string(),
            "extraction failed: word/document.xml not found"
        );
    }
}
