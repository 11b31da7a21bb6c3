//! Document store abstraction.
//!
//! The [`DocumentStore`] trait defines the two storage operations the
//! pipeline needs: a batch insert that returns the stored rows, and the
//! `match_documents` similarity search, consumed as a black-box call.
//! Implementations must be `Send + Sync` to be shared across request
//! handlers.
//!
//! [`PostgresStore`] is the production backend (Postgres + pgvector);
//! [`MemoryStore`] is a brute-force in-memory implementation used by
//! tests.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};

use crate::embedding::cosine_similarity;
use crate::error::{Error, Result};
use crate::models::{DocumentRecord, NewDocument, SimilarityMatch};

/// Abstract document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a batch of documents in one write.
    ///
    /// All-or-nothing from the caller's perspective: either every row is
    /// stored and returned, or the call fails.
    async fn insert_documents(&self, docs: &[NewDocument]) -> Result<Vec<DocumentRecord>>;

    /// Similarity search: rows whose similarity against `embedding`
    /// exceeds `threshold`, optionally scoped to `user_id`, ranked by
    /// descending similarity, at most `count` rows.
    async fn match_documents(
        &self,
        embedding: &[f32],
        threshold: f64,
        count: i64,
        user_id: Option<&str>,
    ) -> Result<Vec<SimilarityMatch>>;
}

// ============ Postgres ============

/// Postgres-backed store. Vector storage and the similarity function
/// come from the pgvector extension; see `migrate`.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DocumentStore for PostgresStore {
    async fn insert_documents(&self, docs: &[NewDocument]) -> Result<Vec<DocumentRecord>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = sqlx::QueryBuilder::<sqlx::Postgres>::new(
            "INSERT INTO documents (content, embedding, user_id, user_name, source_ts) ",
        );
        builder.push_values(docs, |mut row, doc| {
            row.push_bind(doc.content.clone())
                .push_bind(pgvector::Vector::from(doc.embedding.clone()))
                .push_bind(doc.user_id.clone())
                .push_bind(doc.user_name.clone())
                .push_bind(doc.source_ts);
        });
        builder.push(" RETURNING id, content, user_id, user_name, source_ts, created_at");

        let rows = builder
            .build()
            .fetch_all(&self.pool)
            .await
            .map_err(|e| Error::Storage(format!("document insert failed: {e}")))?;

        if rows.is_empty() {
            return Err(Error::Storage("document insert returned no rows".into()));
        }

        rows.iter()
            .map(|row| {
                Ok(DocumentRecord {
                    id: row
                        .try_get("id")
                        .map_err(|e| Error::Storage(e.to_string()))?,
                    content: row
                        .try_get("content")
                        .map_err(|e| Error::Storage(e.to_string()))?,
                    user_id: row
                        .try_get("user_id")
                        .map_err(|e| Error::Storage(e.to_string()))?,
                    user_name: row
                        .try_get("user_name")
                        .map_err(|e| Error::Storage(e.to_string()))?,
                    source_ts: row
                        .try_get("source_ts")
                        .map_err(|e| Error::Storage(e.to_string()))?,
                    created_at: row
                        .try_get("created_at")
                        .map_err(|e| Error::Storage(e.to_string()))?,
                })
            })
            .collect()
    }

    async fn match_documents(
        &self,
        embedding: &[f32],
        threshold: f64,
        count: i64,
        user_id: Option<&str>,
    ) -> Result<Vec<SimilarityMatch>> {
        let rows = sqlx::query(
            "SELECT id, content, user_name, source_ts, created_at, similarity \
             FROM match_documents($1, $2, $3, $4)",
        )
        .bind(pgvector::Vector::from(embedding.to_vec()))
        .bind(threshold)
        .bind(count)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::Upstream(format!("match_documents failed: {e}")))?;

        rows.iter()
            .map(|row| {
                Ok(SimilarityMatch {
                    id: row
                        .try_get("id")
                        .map_err(|e| Error::Upstream(e.to_string()))?,
                    content: row
                        .try_get("content")
                        .map_err(|e| Error::Upstream(e.to_string()))?,
                    user_name: row
                        .try_get("user_name")
                        .map_err(|e| Error::Upstream(e.to_string()))?,
                    source_ts: row
                        .try_get("source_ts")
                        .map_err(|e| Error::Upstream(e.to_string()))?,
                    created_at: row
                        .try_get("created_at")
                        .map_err(|e| Error::Upstream(e.to_string()))?,
                    similarity: row
                        .try_get("similarity")
                        .map_err(|e| Error::Upstream(e.to_string()))?,
                })
            })
            .collect()
    }
}

// ============ In-memory ============

struct StoredDocument {
    record: DocumentRecord,
    embedding: Vec<f32>,
}

/// In-memory store with brute-force cosine similarity search. Used by
/// tests; not intended for production data.
pub struct MemoryStore {
    rows: RwLock<Vec<StoredDocument>>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rows: RwLock::new(Vec::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert_documents(&self, docs: &[NewDocument]) -> Result<Vec<DocumentRecord>> {
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let mut rows = self.rows.write().unwrap();
        let mut inserted = Vec::with_capacity(docs.len());

        for doc in docs {
            let record = DocumentRecord {
                id: self.next_id.fetch_add(1, Ordering::SeqCst),
                content: doc.content.clone(),
                user_id: doc.user_id.clone(),
                user_name: doc.user_name.clone(),
                source_ts: doc.source_ts,
                created_at: Utc::now(),
            };
            rows.push(StoredDocument {
                record: record.clone(),
                embedding: doc.embedding.clone(),
            });
            inserted.push(record);
        }

        Ok(inserted)
    }

    async fn match_documents(
        &self,
        embedding: &[f32],
        threshold: f64,
        count: i64,
        user_id: Option<&str>,
    ) -> Result<Vec<SimilarityMatch>> {
        let rows = self.rows.read().unwrap();

        let mut matches: Vec<SimilarityMatch> = rows
            .iter()
            .filter(|stored| match user_id {
                Some(user) => stored.record.user_id.as_deref() == Some(user),
                None => true,
            })
            .filter_map(|stored| {
                let similarity = cosine_similarity(embedding, &stored.embedding) as f64;
                (similarity > threshold).then(|| SimilarityMatch {
                    id: stored.record.id,
                    content: stored.record.content.clone(),
                    user_name: stored.record.user_name.clone(),
                    source_ts: stored.record.source_ts,
                    created_at: stored.record.created_at,
                    similarity,
                })
            })
            .collect();

        matches.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        matches.truncate(count.max(0) as usize);

        Ok(matches)
    }
}
