//! Semantic retrieval over stored documents.
//!
//! Embeds a free-text prompt in query mode and delegates ranking to the
//! store's similarity search. Any failure from the embedding step or the
//! store call surfaces as an upstream error wrapping the underlying
//! message.

use crate::embedding::{embed_one, EmbedMode, Embedder};
use crate::error::{Error, Result};
use crate::models::SimilarityMatch;
use crate::store::DocumentStore;

pub async fn retrieve(
    embedder: &dyn Embedder,
    store: &dyn DocumentStore,
    prompt: &str,
    user_id: Option<&str>,
    match_count: i64,
    match_threshold: f64,
) -> Result<Vec<SimilarityMatch>> {
    let query_vec = embed_one(embedder, prompt, EmbedMode::Query)
        .await
        .map_err(|e| Error::Upstream(format!("error retrieving documents: {e}")))?;

    store
        .match_documents(&query_vec, match_threshold, match_count, user_id)
        .await
        .map_err(|e| Error::Upstream(format!("error retrieving documents: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewDocument;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Maps a few known phrases to fixed unit vectors.
    struct PhraseEmbedder;

    fn phrase_vector(text: &str) -> Vec<f32> {
        match text {
            "red planet" => vec![1.0, 0.0, 0.0],
            "mars" => vec![0.98, 0.199, 0.0],
            "jupiter spot" => vec![0.9, 0.436, 0.0],
            "saturn rings" => vec![0.75, 0.661, 0.0],
            "earth twin" => vec![0.0, 1.0, 0.0],
            other => panic!("unscripted phrase: {other}"),
        }
    }

    #[async_trait]
    impl Embedder for PhraseEmbedder {
        fn model_name(&self) -> &str {
            "phrases"
        }

        fn dims(&self) -> usize {
            3
        }

        async fn embed(
            &self,
            texts: &[String],
            _mode: EmbedMode,
        ) -> crate::error::Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|t| phrase_vector(t)).collect())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        fn model_name(&self) -> &str {
            "failing"
        }

        fn dims(&self) -> usize {
            0
        }

        async fn embed(
            &self,
            _texts: &[String],
            _mode: EmbedMode,
        ) -> crate::error::Result<Vec<Vec<f32>>> {
            Err(Error::Upstream("model unavailable".into()))
        }
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let docs: Vec<NewDocument> = ["mars", "jupiter spot", "saturn rings", "earth twin"]
            .iter()
            .map(|phrase| NewDocument {
                content: phrase.to_string(),
                embedding: phrase_vector(phrase),
                user_id: None,
                user_name: None,
                source_ts: None,
            })
            .collect();
        store.insert_documents(&docs).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_retrieve_caps_and_ranks_matches() {
        let store = seeded_store().await;

        // Three documents clear the 0.7 threshold against "red planet";
        // the cap keeps the best two, ordered by descending similarity.
        let matches = retrieve(&PhraseEmbedder, store.as_ref(), "red planet", None, 2, 0.7)
            .await
            .unwrap();

        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].content, "mars");
        assert_eq!(matches[1].content, "jupiter spot");
        assert!(matches[0].similarity >= matches[1].similarity);
        for m in &matches {
            assert!(m.similarity > 0.7);
        }
    }

    #[tokio::test]
    async fn test_retrieve_threshold_excludes_weak_matches() {
        let store = seeded_store().await;

        let matches = retrieve(&PhraseEmbedder, store.as_ref(), "red planet", None, 10, 0.7)
            .await
            .unwrap();

        let contents: Vec<&str> = matches.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["mars", "jupiter spot", "saturn rings"]);
    }

    #[tokio::test]
    async fn test_embedding_failure_is_wrapped_as_upstream() {
        let store = seeded_store().await;

        let err = retrieve(&FailingEmbedder, store.as_ref(), "red planet", None, 2, 0.7)
            .await
            .unwrap_err();

        assert_eq!(err.status(), 500);
        assert!(err.to_string().contains("model unavailable"));
    }
}
