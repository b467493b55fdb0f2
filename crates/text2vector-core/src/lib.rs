//! # text2vector core
//!
//! Pure ingestion logic shared by the `text2vector` gateway: the data model
//! that flows through the pipeline, token estimation, token-budget batching,
//! and the two collaborator traits (embedding backend and vector store).
//!
//! This crate performs no file-format decoding, network I/O, or database
//! access. Format detection, extraction, concrete embedding providers and
//! the SQLite store live in the `text2vector` app crate.
//!
//! ```text
//! Resource ──▶ detect ──▶ extract ──▶ [TextSegment] ──▶ ChunkBatcher ──▶ [EmbeddingBatch]
//!                                                                            │
//!                                                   EmbeddingBackend::embed ◀┘
//! ```

pub mod batch;
pub mod embedding;
pub mod error;
pub mod models;
pub mod store;
pub mod token;

pub use error::{IngestError, Result};
