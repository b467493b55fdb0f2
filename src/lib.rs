//! # text2vector
//!
//! A document-to-vector ingestion gateway. Uploaded PDF, DOCX and TXT
//! files are classified, their text extracted, grouped into token-bounded
//! batches and sent to an embedding backend; the resulting vectors can be
//! returned directly or stored for similarity search.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌──────────┐
//! │  Detect  │──▶│ Extract  │──▶│  Batch   │──▶│  Embed   │
//! │ PDF/DOCX │   │ per page │   │ ≤ tokens │   │ backend  │
//! │   /TXT   │   │ or whole │   │          │   │          │
//! └──────────┘   └──────────┘   └──────────┘   └────┬─────┘
//!                                                   │
//!                                  ┌────────────────┤
//!                                  ▼                ▼
//!                            ┌──────────┐     ┌──────────┐
//!                            │ vectors  │     │  SQLite  │
//!                            │ (stdout) │     │  store   │
//!                            └──────────┘     └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! t2v init                           # create database
//! t2v embed report.pdf notes.txt     # per-file chunk vectors
//! t2v embed-text "hello" "world"     # one aggregate vector
//! t2v store handbook.docx            # embed and persist
//! t2v search "vacation policy" --top-k 3
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`detect`] | File type detection |
//! | [`extract`] | Per-format text extraction and the extractor registry |
//! | [`tokenizer`] | Token estimator construction |
//! | [`embedding`] | Embedding backends |
//! | [`ingest`] | Pipeline orchestration |
//! | [`sqlite_store`] | SQLite vector store |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`logging`] | Tracing subscriber setup |

pub mod config;
pub mod db;
pub mod detect;
pub mod embedding;
pub mod extract;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod sqlite_store;
pub mod tokenizer;
