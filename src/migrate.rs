use anyhow::{Context, Result};
use sqlx::PgPool;

use crate::config::Config;

pub async fn run_migrations(pool: &PgPool, config: &Config) -> Result<()> {
    let dims = config
        .embedding
        .dims
        .context("embedding.dims must be set before initializing the schema")?;

    sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
        .execute(pool)
        .await?;

    // Create documents table
    sqlx::query(&format!(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id BIGSERIAL PRIMARY KEY,
            content TEXT NOT NULL,
            embedding VECTOR({dims}) NOT NULL,
            user_id TEXT,
            user_name TEXT,
            source_ts DOUBLE PRECISION,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#
    ))
    .execute(pool)
    .await?;

    // Similarity search entry point. Consumed by the retrieval service as
    // a black-box call; similarity is 1 - cosine distance, in [0, 1] for
    // normalized embeddings.
    sqlx::query(&format!(
        r#"
        CREATE OR REPLACE FUNCTION match_documents(
            query_embedding VECTOR({dims}),
            match_threshold DOUBLE PRECISION,
            match_count BIGINT,
            filter_user_id TEXT DEFAULT NULL
        )
        RETURNS TABLE (
            id BIGINT,
            content TEXT,
            user_name TEXT,
            source_ts DOUBLE PRECISION,
            created_at TIMESTAMPTZ,
            similarity DOUBLE PRECISION
        )
        LANGUAGE sql STABLE
        AS $$
            SELECT d.id, d.content, d.user_name, d.source_ts, d.created_at,
                   1 - (d.embedding <=> query_embedding) AS similarity
            FROM documents d
            WHERE (filter_user_id IS NULL OR d.user_id = filter_user_id)
              AND 1 - (d.embedding <=> query_embedding) > match_threshold
            ORDER BY d.embedding <=> query_embedding
            LIMIT match_count
        $$
        "#
    ))
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_documents_user_id ON documents(user_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_embedding \
         ON documents USING ivfflat (embedding vector_cosine_ops)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
