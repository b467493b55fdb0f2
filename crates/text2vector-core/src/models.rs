//! Data types that flow through the ingestion pipeline.
//!
//! A [`Resource`] is turned into ordered [`TextSegment`]s by an extractor,
//! grouped into [`EmbeddingBatch`]es by the batcher, and finally reported
//! back to the caller as one [`IngestionResult`] per resource.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use crate::error::IngestError;

/// Metadata key holding the filename (or `"unknown"`).
pub const META_SOURCE: &str = "source";
/// Metadata key holding the detected format (`"pdf"`, `"docx"`, `"txt"`).
pub const META_FILE_TYPE: &str = "fileType";
/// Metadata key holding the 0-based page index of a PDF segment.
pub const META_PAGE_INDEX: &str = "pageIndex";
/// Metadata key holding the page count of the source PDF.
pub const META_TOTAL_PAGES: &str = "totalPages";

/// Label used when a resource carries no filename.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Closed set of formats the gateway can ingest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
    Txt,
}

impl FileType {
    pub const ALL: [FileType; 3] = [FileType::Pdf, FileType::Docx, FileType::Txt];

    /// Lowercase short name, also used as the `fileType` metadata value.
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
            FileType::Txt => "txt",
        }
    }

    /// Canonical MIME type.
    pub fn mime(&self) -> &'static str {
        match self {
            FileType::Pdf => "application/pdf",
            FileType::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            FileType::Txt => "text/plain",
        }
    }

    /// Inverse of [`FileType::mime`]. Parameters such as `; charset=utf-8`
    /// are ignored.
    pub fn from_mime(mime: &str) -> Option<FileType> {
        let essence = mime.split(';').next().unwrap_or("").trim();
        FileType::ALL
            .into_iter()
            .find(|ft| ft.mime().eq_ignore_ascii_case(essence))
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded byte source with an optional filename hint.
///
/// Immutable once built. The pipeline takes resources by value and drops
/// the bytes as soon as extraction finishes.
#[derive(Debug, Clone)]
pub struct Resource {
    bytes: Vec<u8>,
    filename: Option<String>,
}

impl Resource {
    pub fn new(bytes: impl Into<Vec<u8>>, filename: Option<String>) -> Self {
        Self {
            bytes: bytes.into(),
            filename,
        }
    }

    pub fn named(bytes: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        Self::new(bytes, Some(filename.into()))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn filename(&self) -> Option<&str> {
        self.filename.as_deref()
    }

    /// Filename for metadata and reports; `"unknown"` when absent or blank.
    pub fn source_label(&self) -> &str {
        match self.filename.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => UNKNOWN_SOURCE,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// A unit of extracted text to be embedded independently.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TextSegment {
    pub text: String,
    pub sequence_index: usize,
    pub metadata: BTreeMap<String, String>,
}

impl TextSegment {
    /// Build a segment carrying the mandatory `source` and `fileType` keys.
    pub fn new(
        text: impl Into<String>,
        sequence_index: usize,
        source: &str,
        file_type: FileType,
    ) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(META_SOURCE.to_string(), source.to_string());
        metadata.insert(META_FILE_TYPE.to_string(), file_type.as_str().to_string());
        Self {
            text: text.into(),
            sequence_index,
            metadata,
        }
    }

    /// Add an extractor-specific key. The mandatory keys cannot be replaced.
    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        if key != META_SOURCE && key != META_FILE_TYPE {
            self.metadata.insert(key.to_string(), value.into());
        }
        self
    }

    pub fn source(&self) -> &str {
        self.metadata
            .get(META_SOURCE)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_SOURCE)
    }
}

/// A group of segments sent to the embedding backend in one call.
///
/// `estimated_tokens <= ceiling` unless `oversized` is set, in which case
/// the batch holds exactly one segment whose own estimate exceeds it.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingBatch {
    pub segments: Vec<TextSegment>,
    pub estimated_tokens: usize,
    pub oversized: bool,
}

impl EmbeddingBatch {
    pub fn texts(&self) -> Vec<String> {
        self.segments.iter().map(|s| s.text.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Per-resource outcome of a multi-resource request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IngestionStatus {
    Ok,
    /// The resource was readable but held no extractable text.
    Empty,
    Failed {
        kind: String,
        reason: String,
    },
}

/// What the caller gets back for one input resource.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionResult {
    pub filename: String,
    pub file_type: Option<FileType>,
    #[serde(rename = "chunks")]
    pub chunk_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vectors: Vec<Vec<f32>>,
    pub status: IngestionStatus,
}

impl IngestionResult {
    pub fn failed(filename: &str, file_type: Option<FileType>, err: &IngestError) -> Self {
        Self {
            filename: filename.to_string(),
            file_type,
            chunk_count: 0,
            vectors: Vec::new(),
            status: IngestionStatus::Failed {
                kind: err.kind().to_string(),
                reason: err.to_string(),
            },
        }
    }

    pub fn empty(filename: &str, file_type: FileType) -> Self {
        Self {
            filename: filename.to_string(),
            file_type: Some(file_type),
            chunk_count: 0,
            vectors: Vec::new(),
            status: IngestionStatus::Empty,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == IngestionStatus::Ok
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.status, IngestionStatus::Failed { .. })
    }
}
