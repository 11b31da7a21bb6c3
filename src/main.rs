//! # Recall CLI (`recall`)
//!
//! The `recall` binary hosts the HTTP API and provides maintenance
//! commands for the document store.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall init` | Create the documents schema and similarity function |
//! | `recall serve` | Start the HTTP API server |
//! | `recall retrieve "<prompt>"` | Run a one-off semantic query |
//!
//! All commands accept a `--config` flag pointing to a TOML configuration
//! file. See `config/recall.example.toml` for a full example. The
//! embedding API key is read from the `OPENAI_API_KEY` environment
//! variable (a `.env` file is honored).

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use recall::config::load_config;
use recall::store::PostgresStore;
use recall::{db, embedding, migrate, retrieve, server};

/// Recall — a conversation extraction and semantic retrieval service.
#[derive(Parser)]
#[command(
    name = "recall",
    about = "Recall — conversation extraction and semantic retrieval service",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the document store schema.
    ///
    /// Creates the pgvector extension, the documents table, the
    /// match_documents function, and supporting indexes. Idempotent —
    /// running it multiple times is safe.
    Init,

    /// Start the HTTP API server.
    ///
    /// Binds to the address in `[server].bind` and serves `/extract`,
    /// `/retrieve`, `/slack/channels`, and `/health`.
    Serve,

    /// Run a one-off semantic query against the store.
    Retrieve {
        /// The search prompt.
        prompt: String,

        /// Only match documents owned by this user.
        #[arg(long)]
        user_id: Option<String>,

        /// Maximum number of matches (defaults to `[retrieval].match_count`).
        #[arg(long)]
        count: Option<i64>,

        /// Minimum similarity (defaults to `[retrieval].match_threshold`).
        #[arg(long)]
        threshold: Option<f64>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("recall=info,tower_http=info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&config).await?;
            migrate::run_migrations(&pool, &config).await?;
            println!("store initialized");
        }
        Commands::Serve => {
            let embedder = embedding::create_embedder(&config.embedding)?;
            let pool = db::connect(&config).await?;
            let store = Arc::new(PostgresStore::new(pool));
            server::run_server(&config, embedder, store).await?;
        }
        Commands::Retrieve {
            prompt,
            user_id,
            count,
            threshold,
        } => {
            let embedder = embedding::create_embedder(&config.embedding)?;
            let pool = db::connect(&config).await?;
            let store = PostgresStore::new(pool);

            let matches = retrieve::retrieve(
                embedder.as_ref(),
                &store,
                &prompt,
                user_id.as_deref(),
                count.unwrap_or(config.retrieval.match_count),
                threshold.unwrap_or(config.retrieval.match_threshold),
            )
            .await?;

            if matches.is_empty() {
                println!("No results.");
            } else {
                for (i, m) in matches.iter().enumerate() {
                    println!("{}. [{:.2}] {}", i + 1, m.similarity, m.content);
                    if let Some(name) = &m.user_name {
                        println!("    from: {name}");
                    }
                    println!("    id: {}", m.id);
                }
            }
        }
    }

    Ok(())
}
