//! SQLite-backed [`VectorStore`].
//!
//! Segments live in `segments`, their vectors in `segment_vectors` as
//! little-endian `f32` BLOBs. Search loads every vector and ranks by cosine
//! similarity in Rust. Run [`crate::migrate`] (`t2v init`) before use.
//!
//! Each segment row carries a SHA-256 of its text. A record whose source,
//! position and hash match a stored segment is skipped, so storing the same
//! file twice does not duplicate its search hits.

use std::collections::BTreeMap;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use text2vector_core::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use text2vector_core::models::{META_FILE_TYPE, META_SOURCE, UNKNOWN_SOURCE};
use text2vector_core::store::{SearchHit, VectorRecord, VectorStore};
use text2vector_core::{IngestError, Result};
use tracing::debug;

use crate::config::Config;
use crate::db;

pub struct SqliteVectorStore {
    pool: SqlitePool,
}

impl SqliteVectorStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn open(config: &Config) -> anyhow::Result<Self> {
        Ok(Self::new(db::connect(config).await?))
    }
}

fn store_err(e: impl std::fmt::Display) -> IngestError {
    IngestError::VectorStore(e.to_string())
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl VectorStore for SqliteVectorStore {
    async fn add(&self, records: &[VectorRecord]) -> Result<usize> {
        let now = chrono::Utc::now().timestamp();
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        let mut written = 0;

        for record in records {
            let source = record
                .metadata
                .get(META_SOURCE)
                .map(String::as_str)
                .unwrap_or(UNKNOWN_SOURCE);
            let file_type = record
                .metadata
                .get(META_FILE_TYPE)
                .map(String::as_str)
                .unwrap_or("");
            let hash = hash_text(&record.text);

            // Same text at the same position of the same source is already stored.
            let duplicate: Option<String> = sqlx::query_scalar(
                "SELECT id FROM segments WHERE source = ? AND sequence_index = ? AND hash = ? AND id != ? LIMIT 1",
            )
            .bind(source)
            .bind(record.sequence_index as i64)
            .bind(hash.as_str())
            .bind(record.id.as_str())
            .fetch_optional(&mut *tx)
            .await
            .map_err(store_err)?;
            if let Some(existing) = duplicate {
                debug!(
                    source,
                    sequence_index = record.sequence_index,
                    existing = %existing,
                    "segment unchanged, skipping"
                );
                continue;
            }

            let metadata_json = serde_json::to_string(&record.metadata).map_err(store_err)?;

            sqlx::query(
                r#"
                INSERT INTO segments (id, source, file_type, sequence_index, text, hash, metadata_json, created_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(id) DO UPDATE SET
                    source = excluded.source,
                    file_type = excluded.file_type,
                    sequence_index = excluded.sequence_index,
                    text = excluded.text,
                    hash = excluded.hash,
                    metadata_json = excluded.metadata_json,
                    created_at = excluded.created_at
                "#,
            )
            .bind(record.id.as_str())
            .bind(source)
            .bind(file_type)
            .bind(record.sequence_index as i64)
            .bind(record.text.as_str())
            .bind(hash.as_str())
            .bind(metadata_json.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;

            sqlx::query(
                r#"
                INSERT INTO segment_vectors (segment_id, dims, embedding)
                VALUES (?, ?, ?)
                ON CONFLICT(segment_id) DO UPDATE SET
                    dims = excluded.dims,
                    embedding = excluded.embedding
                "#,
            )
            .bind(record.id.as_str())
            .bind(record.vector.len() as i64)
            .bind(vec_to_blob(&record.vector))
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
            written += 1;
        }

        tx.commit().await.map_err(store_err)?;
        Ok(written)
    }

    async fn similarity_search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>> {
        let rows = sqlx::query(
            r#"
            SELECT s.id, s.text, s.metadata_json, v.embedding
            FROM segments s
            JOIN segment_vectors v ON v.segment_id = s.id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;

        let mut hits = Vec::with_capacity(rows.len());
        for row in &rows {
            let blob: Vec<u8> = row.try_get("embedding").map_err(store_err)?;
            let metadata_json: String = row.try_get("metadata_json").map_err(store_err)?;
            let metadata: BTreeMap<String, String> =
                serde_json::from_str(&metadata_json).map_err(store_err)?;
            hits.push(SearchHit {
                id: row.try_get("id").map_err(store_err)?,
                text: row.try_get("text").map_err(store_err)?,
                metadata,
                score: cosine_similarity(query, &blob_to_vec(&blob)),
            });
        }

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn count(&self) -> Result<usize> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM segments")
            .fetch_one(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(count as usize)
    }
}
