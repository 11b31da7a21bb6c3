//! Embedding provider abstraction and implementations.
//!
//! Defines the [`Embedder`] trait and concrete implementations:
//! - **[`DisabledEmbedder`]** — returns errors; used when embeddings are
//!   not configured.
//! - **[`OpenAiEmbedder`]** — calls an OpenAI-compatible embeddings API
//!   with batching, retry, and backoff.
//!
//! Both encode modes ([`EmbedMode::Document`] for content being stored,
//! [`EmbedMode::Query`] for search prompts) produce vectors of the same
//! configured dimension — a requirement for similarity comparisons to be
//! valid. Batch input is embedded in one provider invocation, and the
//! output is always plain `Vec<f32>` sequences.
//!
//! # Retry Strategy
//!
//! The OpenAI-compatible provider uses exponential backoff for transient
//! errors:
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use anyhow::bail;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{Error, Result};

/// Whether text is being encoded for storage or for querying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedMode {
    Document,
    Query,
}

/// Trait for embedding providers.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a batch of texts in one provider invocation, returning one
    /// vector per input in input order.
    async fn embed(&self, texts: &[String], mode: EmbedMode) -> Result<Vec<Vec<f32>>>;
}

/// Embed a single text. Convenience wrapper for single-item use cases
/// (e.g. embedding a search prompt).
pub async fn embed_one(embedder: &dyn Embedder, text: &str, mode: EmbedMode) -> Result<Vec<f32>> {
    let vectors = embedder.embed(&[text.to_string()], mode).await?;
    vectors
        .into_iter()
        .next()
        .ok_or_else(|| Error::Upstream("empty embedding response".into()))
}

// ============ Disabled provider ============

/// A no-op embedding provider that always returns errors.
///
/// Used when `embedding.provider = "disabled"` in the configuration.
pub struct DisabledEmbedder;

#[async_trait]
impl Embedder for DisabledEmbedder {
    fn model_name(&self) -> &str {
        "disabled"
    }

    fn dims(&self) -> usize {
        0
    }

    async fn embed(&self, _texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
        Err(Error::Upstream("embedding provider is disabled".into()))
    }
}

// ============ OpenAI-compatible provider ============

/// Embedding provider for OpenAI-compatible APIs.
///
/// Calls `POST <api_base>/embeddings` with the configured model. Requires
/// the `OPENAI_API_KEY` environment variable. The API exposes a single
/// encode path, so both modes embed identically; dimension parity across
/// modes is checked against the configured `dims` on every response.
pub struct OpenAiEmbedder {
    model: String,
    dims: usize,
    api_base: String,
    api_key: String,
    max_retries: u32,
    http: reqwest::Client,
}

impl OpenAiEmbedder {
    /// Create a provider from configuration.
    ///
    /// Fails when `model` or `dims` is unset, or the API key is missing
    /// from the environment.
    pub fn new(config: &EmbeddingConfig) -> anyhow::Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("embedding.model required for OpenAI provider"))?;
        let dims = config
            .dims
            .ok_or_else(|| anyhow::anyhow!("embedding.dims required for OpenAI provider"))?;
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model,
            dims,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            max_retries: config.max_retries,
            http,
        })
    }

    async fn embed_with_retries(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s, 8s, ...
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .http
                .post(format!("{}/embeddings", self.api_base))
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await.map_err(|e| {
                            Error::Upstream(format!("invalid embeddings response: {e}"))
                        })?;
                        let vectors = parse_embeddings_response(&json)?;
                        return self.check_dims(vectors, texts.len());
                    }

                    // Rate limited or server error — retry
                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(Error::Upstream(format!(
                            "embeddings api error {status}: {body_text}"
                        )));
                        continue;
                    }

                    // Client error (not 429) — don't retry
                    let body_text = response.text().await.unwrap_or_default();
                    return Err(Error::Upstream(format!(
                        "embeddings api error {status}: {body_text}"
                    )));
                }
                Err(e) => {
                    last_err = Some(Error::Upstream(format!("embeddings request failed: {e}")));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| Error::Upstream("embedding failed after retries".into())))
    }

    fn check_dims(&self, vectors: Vec<Vec<f32>>, expected_count: usize) -> Result<Vec<Vec<f32>>> {
        if vectors.len() != expected_count {
            return Err(Error::Upstream(format!(
                "embeddings api returned {} vectors for {} inputs",
                vectors.len(),
                expected_count
            )));
        }
        for vector in &vectors {
            if vector.len() != self.dims {
                return Err(Error::Upstream(format!(
                    "embedding dimension mismatch: expected {}, got {}",
                    self.dims,
                    vector.len()
                )));
            }
        }
        Ok(vectors)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, texts: &[String], _mode: EmbedMode) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_with_retries(texts).await
    }
}

/// Parse an OpenAI-style embeddings response.
///
/// Extracts the `data[].embedding` arrays, ordered by `data[].index` so
/// the output matches input order.
fn parse_embeddings_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| Error::Upstream("invalid embeddings response: missing data array".into()))?;

    let mut indexed = Vec::with_capacity(data.len());

    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| {
                Error::Upstream("invalid embeddings response: missing embedding".into())
            })?;

        let vector: Vec<f32> = embedding
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect();

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .unwrap_or(position as u64);
        indexed.push((index, vector));
    }

    indexed.sort_by_key(|(index, _)| *index);
    Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}

/// Create the appropriate [`Embedder`] based on configuration.
pub fn create_embedder(config: &EmbeddingConfig) -> anyhow::Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledEmbedder)),
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config)?)),
        other => bail!("Unknown embedding provider: {}", other),
    }
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors or vectors
/// of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
