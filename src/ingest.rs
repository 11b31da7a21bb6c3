//! Ingestion pipeline: batch embed + single batch write.
//!
//! The [`Ingestor`] exclusively owns the embed-then-insert flow; no other
//! component writes documents. Batches are embedded with one provider
//! call and stored with one write — partial inserts are not supported
//! beyond surfacing the store's own failure.

use std::sync::Arc;

use crate::embedding::{embed_one, EmbedMode, Embedder};
use crate::error::{Error, Result};
use crate::models::{DocumentRecord, NewDocument};
use crate::store::DocumentStore;

#[derive(Clone)]
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
}

impl Ingestor {
    pub fn new(embedder: Arc<dyn Embedder>, store: Arc<dyn DocumentStore>) -> Self {
        Self { embedder, store }
    }

    /// Embed one string and insert one record.
    pub async fn ingest(&self, content: &str, user_id: Option<&str>) -> Result<DocumentRecord> {
        if content.trim().is_empty() {
            return Err(Error::InvalidArgument("content must not be empty".into()));
        }

        let embedding = embed_one(self.embedder.as_ref(), content, EmbedMode::Document).await?;

        let docs = vec![NewDocument {
            content: content.to_string(),
            embedding,
            user_id: user_id.map(str::to_string),
            user_name: None,
            source_ts: None,
        }];

        let mut records = self.store.insert_documents(&docs).await?;
        records
            .pop()
            .ok_or_else(|| Error::Storage("document insert returned no rows".into()))
    }

    /// Embed and insert a batch with one embed call and one write.
    ///
    /// Blank entries are dropped; the pairing between surviving contents
    /// and their `user_names`/`source_ts` entries is by original index,
    /// not post-filter index.
    pub async fn ingest_batch(
        &self,
        contents: &[String],
        user_id: Option<&str>,
        user_names: Option<&[Option<String>]>,
        source_ts: Option<&[Option<f64>]>,
    ) -> Result<Vec<DocumentRecord>> {
        if contents.is_empty() {
            return Err(Error::InvalidArgument("contents must not be empty".into()));
        }

        let surviving: Vec<(usize, &String)> = contents
            .iter()
            .enumerate()
            .filter(|(_, content)| !content.trim().is_empty())
            .collect();

        if surviving.is_empty() {
            return Err(Error::InvalidArgument(
                "no non-blank content to ingest".into(),
            ));
        }

        let texts: Vec<String> = surviving
            .iter()
            .map(|(_, content)| (*content).clone())
            .collect();
        let embeddings = self.embedder.embed(&texts, EmbedMode::Document).await?;
        if embeddings.len() != texts.len() {
            return Err(Error::Upstream(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                embeddings.len()
            )));
        }

        let docs: Vec<NewDocument> = surviving
            .iter()
            .zip(embeddings)
            .map(|((index, content), embedding)| NewDocument {
                content: (*content).clone(),
                embedding,
                user_id: user_id.map(str::to_string),
                user_name: user_names.and_then(|names| names.get(*index).cloned().flatten()),
                source_ts: source_ts.and_then(|ts| ts.get(*index).copied().flatten()),
            })
            .collect();

        let records = self.store.insert_documents(&docs).await?;
        if records.is_empty() {
            return Err(Error::Storage("document insert returned no rows".into()));
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use async_trait::async_trait;

    /// Deterministic embedder: encodes text length and first byte so
    /// tests can verify alignment without a model.
    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        fn model_name(&self) -> &str {
            "fake"
        }

        fn dims(&self) -> usize {
            2
        }

        async fn embed(&self, texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, f32::from(t.as_bytes()[0])])
                .collect())
        }
    }

    fn ingestor() -> (Ingestor, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (Ingestor::new(Arc::new(FakeEmbedder), store.clone()), store)
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[tokio::test]
    async fn test_ingest_single() {
        let (ingestor, _) = ingestor();
        let record = ingestor.ingest("hello world", Some("U1")).await.unwrap();
        assert_eq!(record.content, "hello world");
        assert_eq!(record.user_id.as_deref(), Some("U1"));
        assert!(record.user_name.is_none());
    }

    #[tokio::test]
    async fn test_ingest_rejects_blank_content() {
        let (ingestor, _) = ingestor();
        assert_eq!(ingestor.ingest("", None).await.unwrap_err().status(), 400);
        assert_eq!(
            ingestor.ingest("  \n ", None).await.unwrap_err().status(),
            400
        );
    }

    #[tokio::test]
    async fn test_batch_output_matches_non_blank_entries_by_position() {
        let (ingestor, _) = ingestor();
        let contents = strings(&["alpha", "", "beta", "   ", "gamma"]);

        let records = ingestor
            .ingest_batch(&contents, None, None, None)
            .await
            .unwrap();

        assert_eq!(records.len(), 3);
        let stored: Vec<&str> = records.iter().map(|r| r.content.as_str()).collect();
        assert_eq!(stored, vec!["alpha", "beta", "gamma"]);
    }

    #[tokio::test]
    async fn test_batch_alignment_uses_original_indexes() {
        let (ingestor, _) = ingestor();
        let contents = strings(&["alpha", "", "beta"]);
        let user_names = vec![
            Some("Amy".to_string()),
            Some("Ghost".to_string()),
            Some("Bea".to_string()),
        ];
        let source_ts = vec![Some(1.0), Some(2.0), Some(3.0)];

        let records = ingestor
            .ingest_batch(&contents, Some("owner"), Some(&user_names), Some(&source_ts))
            .await
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].content, "alpha");
        assert_eq!(records[0].user_name.as_deref(), Some("Amy"));
        assert_eq!(records[0].source_ts, Some(1.0));
        // "beta" was at original index 2, so it pairs with "Bea"/3.0,
        // not the dropped entry's annotations.
        assert_eq!(records[1].content, "beta");
        assert_eq!(records[1].user_name.as_deref(), Some("Bea"));
        assert_eq!(records[1].source_ts, Some(3.0));
        assert_eq!(records[1].user_id.as_deref(), Some("owner"));
    }

    #[tokio::test]
    async fn test_batch_rejects_empty_input() {
        let (ingestor, _) = ingestor();
        let err = ingestor
            .ingest_batch(&[], None, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[tokio::test]
    async fn test_batch_rejects_all_blank_input() {
        let (ingestor, _) = ingestor();
        let err = ingestor
            .ingest_batch(&strings(&["", "  "]), None, None, None)
            .await
            .unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[tokio::test]
    async fn test_batch_embeds_and_stores_retrievable_vectors() {
        let (ingestor, store) = ingestor();
        let contents = strings(&["alpha", "beta"]);

        ingestor
            .ingest_batch(&contents, None, None, None)
            .await
            .unwrap();

        // The stored vector for "alpha" must match the fake encoding.
        let query = vec![5.0, f32::from(b'a')];
        let matches = store.match_documents(&query, 0.99, 10, None).await.unwrap();
        assert_eq!(matches[0].content, "alpha");
    }
}
