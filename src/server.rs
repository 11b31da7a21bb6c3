//! HTTP API surface.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/extract` | Extract a conversation page and ingest its messages |
//! | `POST` | `/retrieve` | Semantic search over stored documents |
//! | `POST` | `/slack/channels` | List channels visible to a token |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one schema:
//!
//! ```json
//! { "error": { "code": "not_found", "message": "channel 'x' not found" } }
//! ```
//!
//! Codes map 1:1 to the pipeline error taxonomy: `invalid_argument` (400),
//! `not_found` (404), `permission_denied` (403), `unauthenticated` (401),
//! `rate_limited` (429), `upstream_error` / `storage_error` (500).
//!
//! Ingestion failure during a slack `/extract` is deliberately not an
//! error response: extraction success is independent of ingestion
//! success, so the failure is reported inside the response body as
//! `ingestion_error` with `ingested_count: 0`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support
//! browser-based frontends.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::Error;
use crate::extract;
use crate::ingest::Ingestor;
use crate::models::{
    ExtractionRequest, RawMessage, RetrieveRequest, RetrieveResponse, Service, SlackChannel,
    SlackChannelsRequest, SlackChannelsResponse,
};
use crate::normalize;
use crate::resolver;
use crate::retrieve;
use crate::slack::{HistoryPage, SlackApi, SlackClient};
use crate::store::DocumentStore;

/// Shared application state. The embedder and store are constructed once
/// at process start and injected; Slack clients are built per request
/// from the caller's token.
#[derive(Clone)]
pub struct AppState {
    config: Arc<Config>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(config: Config, embedder: Arc<dyn Embedder>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            config: Arc::new(config),
            embedder,
            store,
        }
    }

    fn ingestor(&self) -> Ingestor {
        Ingestor::new(self.embedder.clone(), self.store.clone())
    }
}

/// Starts the HTTP server on the configured bind address and serves
/// until the process is terminated.
pub async fn run_server(
    config: &Config,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn DocumentStore>,
) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let state = AppState::new(config.clone(), embedder, store);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = router(state).layer(cors);

    info!("listening on http://{bind_addr}");

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/extract", post(handle_extract))
        .route("/retrieve", post(handle_retrieve))
        .route("/slack/channels", post(handle_slack_channels))
        .route("/health", get(handle_health))
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /extract ============

/// Dispatches to the requested service's extractor. For slack, extracted
/// messages are also run through the ingestion pipeline and the response
/// is annotated with the outcome.
async fn handle_extract(
    State(state): State<AppState>,
    Json(request): Json<ExtractionRequest>,
) -> Result<Json<serde_json::Value>, Error> {
    match request.service {
        Service::Slack => handle_extract_slack(&state, &request).await,
        service => Ok(Json(extract::placeholder_payload(service))),
    }
}

async fn handle_extract_slack(
    state: &AppState,
    request: &ExtractionRequest,
) -> Result<Json<serde_json::Value>, Error> {
    let token = request.auth_token.as_deref().ok_or_else(|| {
        Error::InvalidArgument("auth_token is required when service is 'slack'".into())
    })?;
    let api = SlackClient::new(&state.config.slack.api_base, token);

    let page = extract::extract_slack(&api, request).await?;
    info!(
        messages = page.messages.len(),
        has_more = page.has_more,
        "extracted slack conversation page"
    );

    let mut payload = json!({
        "ok": page.ok,
        "messages": &page.messages,
        "has_more": page.has_more,
        "response_metadata": {
            "next_cursor": page.next_cursor.clone().unwrap_or_default(),
        },
        "pin_count": page.pin_count,
    });

    let annotations = ingest_extracted_page(state, &api, request, &page).await;
    if let (Some(object), Some(extra)) = (payload.as_object_mut(), annotations.as_object()) {
        object.extend(extra.clone());
    }

    Ok(Json(payload))
}

/// Run the ingestion pipeline over the page's human, text-bearing
/// messages. Failures never propagate: the extraction already succeeded,
/// so a pipeline error becomes a response annotation.
async fn ingest_extracted_page(
    state: &AppState,
    api: &dyn SlackApi,
    request: &ExtractionRequest,
    page: &HistoryPage,
) -> serde_json::Value {
    let human: Vec<RawMessage> = page
        .messages
        .iter()
        .filter(|m| m.bot_id.is_none())
        .cloned()
        .collect();
    let normalized = normalize::normalize_messages(&human);

    if normalized.is_empty() {
        return json!({ "ingested_count": 0, "ingested_document_ids": [] });
    }

    let user_ids: Vec<String> = normalized.iter().map(|m| m.user_id.clone()).collect();
    let names_by_id = resolver::resolve_user_names(api, &user_ids).await;

    let contents: Vec<String> = normalized.iter().map(|m| m.content.clone()).collect();
    let user_names: Vec<Option<String>> = normalized
        .iter()
        .map(|m| {
            Some(
                names_by_id
                    .get(&m.user_id)
                    .cloned()
                    .unwrap_or_else(|| m.user_id.clone()),
            )
        })
        .collect();
    let source_ts: Vec<Option<f64>> = normalized.iter().map(|m| m.source_ts).collect();

    match state
        .ingestor()
        .ingest_batch(
            &contents,
            request.user_id.as_deref(),
            Some(&user_names),
            Some(&source_ts),
        )
        .await
    {
        Ok(records) => {
            let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
            info!(count = records.len(), "ingested extracted messages");
            json!({ "ingested_count": records.len(), "ingested_document_ids": ids })
        }
        Err(e) => {
            warn!("ingestion failed after successful extraction: {e}");
            json!({ "ingestion_error": e.to_string(), "ingested_count": 0 })
        }
    }
}

// ============ POST /retrieve ============

async fn handle_retrieve(
    State(state): State<AppState>,
    Json(request): Json<RetrieveRequest>,
) -> Result<Json<RetrieveResponse>, Error> {
    let match_count = request
        .match_count
        .unwrap_or(state.config.retrieval.match_count);
    let match_threshold = request
        .match_threshold
        .unwrap_or(state.config.retrieval.match_threshold);

    let matches = retrieve::retrieve(
        state.embedder.as_ref(),
        state.store.as_ref(),
        &request.prompt,
        request.user_id.as_deref(),
        match_count,
        match_threshold,
    )
    .await?;

    Ok(Json(RetrieveResponse {
        count: matches.len(),
        matches,
    }))
}

// ============ POST /slack/channels ============

async fn handle_slack_channels(
    State(state): State<AppState>,
    Json(request): Json<SlackChannelsRequest>,
) -> Result<Json<SlackChannelsResponse>, Error> {
    let api = SlackClient::new(&state.config.slack.api_base, &request.auth_token);

    let conversations = api
        .list_conversations("public_channel,private_channel")
        .await?;

    let channels = conversations
        .into_iter()
        .filter(|c| !c.is_archived)
        .map(|c| SlackChannel {
            id: c.id,
            name: c.name,
            is_private: c.is_private,
            is_archived: c.is_archived,
        })
        .collect();

    Ok(Json(SlackChannelsResponse { channels }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_responses_carry_taxonomy_status() {
        let cases = [
            (Error::InvalidArgument("x".into()), 400),
            (Error::NotFound("x".into()), 404),
            (Error::PermissionDenied("x".into()), 403),
            (Error::Unauthenticated("x".into()), 401),
            (Error::RateLimited("x".into()), 429),
            (Error::Upstream("x".into()), 500),
            (Error::Storage("x".into()), 500),
        ];
        for (err, status) in cases {
            let response = err.into_response();
            assert_eq!(response.status().as_u16(), status);
        }
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let Json(body) = handle_health().await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.version, env!("CARGO_PKG_VERSION"));
    }
}
