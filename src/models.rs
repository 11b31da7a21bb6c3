//! Core data models for the extraction and retrieval pipeline.
//!
//! These types describe the request bodies accepted by the HTTP surface,
//! the messages flowing out of the chat platform, and the documents stored
//! in and retrieved from the document store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upstream service an extraction request targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Service {
    Slack,
    Github,
    Google,
}

impl Service {
    pub fn as_str(&self) -> &'static str {
        match self {
            Service::Slack => "slack",
            Service::Github => "github",
            Service::Google => "google",
        }
    }
}

/// Kind of conversation a name should be resolved against.
///
/// Carried as a plain string in requests and parsed here so an unknown
/// value surfaces as an invalid-argument error rather than a serde reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversationKind {
    Channel,
    Group,
    Im,
}

impl ConversationKind {
    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "channel" => Ok(ConversationKind::Channel),
            "group" => Ok(ConversationKind::Group),
            "im" => Ok(ConversationKind::Im),
            other => Err(Error::InvalidArgument(format!(
                "invalid conversation_kind: '{other}'. Must be 'channel', 'group', or 'im'"
            ))),
        }
    }
}

/// Body of `POST /extract`.
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionRequest {
    pub service: Service,
    /// Owner recorded on ingested documents.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Platform token used for all upstream calls. Required for slack.
    #[serde(default)]
    pub auth_token: Option<String>,
    /// Channel name, private group name, or username/email for a DM.
    #[serde(default)]
    pub conversation_name: Option<String>,
    /// `channel`, `group`, or `im`.
    #[serde(default)]
    pub conversation_kind: Option<String>,
    /// Number of messages to fetch per page.
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Oldest timestamp to include.
    #[serde(default)]
    pub oldest: Option<f64>,
    /// Latest timestamp to include.
    #[serde(default)]
    pub latest: Option<f64>,
    /// Pagination cursor from a previous page.
    #[serde(default)]
    pub cursor: Option<String>,
}

fn default_limit() -> u32 {
    100
}

/// A message as returned by the conversation history API.
///
/// Only the fields the pipeline inspects are typed; everything else is
/// kept in `rest` so `/extract` responses can return the platform payload
/// verbatim.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Rich-text block representation, when the platform provides one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub ts: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_id: Option<String>,
    #[serde(flatten)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

/// Message text after normalization, ready for ingestion.
///
/// `content` is single-line and whitespace-collapsed, never empty.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedMessage {
    pub user_id: String,
    pub content: String,
    pub source_ts: Option<f64>,
}

/// Document fields supplied by the ingestion pipeline. The store assigns
/// `id` and `created_at`.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub content: String,
    pub embedding: Vec<f32>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub source_ts: Option<f64>,
}

/// A stored document row. Insert-only; never mutated after the write.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ts: Option<f64>,
    pub created_at: DateTime<Utc>,
}

/// One ranked similarity-search result. Ephemeral, computed per query.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarityMatch {
    pub id: i64,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ts: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub similarity: f64,
}

/// Body of `POST /retrieve`.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrieveRequest {
    pub prompt: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub match_count: Option<i64>,
    #[serde(default)]
    pub match_threshold: Option<f64>,
}

/// Response of `POST /retrieve`.
#[derive(Debug, Clone, Serialize)]
pub struct RetrieveResponse {
    pub matches: Vec<SimilarityMatch>,
    pub count: usize,
}

/// Body of `POST /slack/channels`.
#[derive(Debug, Clone, Deserialize)]
pub struct SlackChannelsRequest {
    pub auth_token: String,
}

/// A channel visible to the supplied token.
#[derive(Debug, Clone, Serialize)]
pub struct SlackChannel {
    pub id: String,
    pub name: String,
    pub is_private: bool,
    pub is_archived: bool,
}

/// Response of `POST /slack/channels`.
#[derive(Debug, Clone, Serialize)]
pub struct SlackChannelsResponse {
    pub channels: Vec<SlackChannel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_kind_parse() {
        assert_eq!(
            ConversationKind::parse("channel").unwrap(),
            ConversationKind::Channel
        );
        assert_eq!(
            ConversationKind::parse("group").unwrap(),
            ConversationKind::Group
        );
        assert_eq!(ConversationKind::parse("im").unwrap(), ConversationKind::Im);

        let err = ConversationKind::parse("mpim").unwrap_err();
        assert_eq!(err.status(), 400);
    }

    #[test]
    fn test_extraction_request_defaults() {
        let request: ExtractionRequest = serde_json::from_str(r#"{"service": "slack"}"#).unwrap();
        assert_eq!(request.service, Service::Slack);
        assert_eq!(request.limit, 100);
        assert!(request.cursor.is_none());
        assert!(request.oldest.is_none());
    }

    #[test]
    fn test_raw_message_preserves_unknown_fields() {
        let payload = r#"{
            "type": "message",
            "user": "U123ABC",
            "text": "hello",
            "ts": "1712345678.000200",
            "team": "T999"
        }"#;
        let message: RawMessage = serde_json::from_str(payload).unwrap();
        assert_eq!(message.user.as_deref(), Some("U123ABC"));
        assert_eq!(message.ts, "1712345678.000200");

        let back = serde_json::to_value(&message).unwrap();
        assert_eq!(back["type"], "message");
        assert_eq!(back["team"], "T999");
    }
}
