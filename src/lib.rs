//! # Recall
//!
//! A conversation extraction and semantic retrieval service.
//!
//! Recall pulls messages out of chat conversations (Slack today; GitHub
//! and Google are stubs), normalizes and embeds their text, stores the
//! vectors in Postgres/pgvector, and answers similarity queries over the
//! stored documents via an HTTP API.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌─────────────┐
//! │  Extractors  │──▶│   Pipeline     │──▶│  Postgres    │
//! │ Slack/stubs  │   │ Normalize+Embed│   │  pgvector    │
//! └──────────────┘   └───────────────┘   └──────┬──────┘
//!                                               │
//!                          ┌────────────────────┤
//!                          ▼                    ▼
//!                    ┌──────────┐        ┌────────────┐
//!                    │   CLI    │        │    HTTP     │
//!                    │ (recall) │        │  /retrieve  │
//!                    └──────────┘        └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! recall init                    # create schema + match_documents function
//! recall serve                   # start the HTTP API
//! recall retrieve "red planet"   # one-off semantic query
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`slack`] | Slack Web API client |
//! | [`resolver`] | Conversation and identity resolution |
//! | [`extract`] | Per-service extraction dispatch |
//! | [`normalize`] | Message text normalization |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`ingest`] | Batch embed + insert pipeline |
//! | [`retrieve`] | Semantic retrieval |
//! | [`store`] | Document store trait + backends |
//! | [`server`] | HTTP API |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod migrate;
pub mod models;
pub mod normalize;
pub mod resolver;
pub mod retrieve;
pub mod server;
pub mod slack;
pub mod store;
