//! Slack Web API client.
//!
//! A thin wrapper over the Slack Web API: every call is a POST to
//! `<api_base>/<method>` with a bearer token, and every response carries
//! the platform's `ok`/`error` envelope. A non-ok envelope is translated
//! into the typed error taxonomy via [`translate_error_code`], so callers
//! never inspect platform error strings.
//!
//! The operations the pipeline depends on are expressed as the
//! [`SlackApi`] trait; [`SlackClient`] is the production implementation
//! and tests substitute scripted fakes.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::models::RawMessage;

/// A conversation (channel, group, or DM) from `conversations.list`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default)]
    pub is_archived: bool,
}

/// A workspace directory member from `users.list`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Member {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub profile: MemberProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MemberProfile {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

/// One page of conversation history, messages in API order.
#[derive(Debug, Clone, Default)]
pub struct HistoryPage {
    pub ok: bool,
    pub messages: Vec<RawMessage>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
    pub pin_count: i64,
}

/// Paging bounds for a history fetch.
#[derive(Debug, Clone, Default)]
pub struct HistoryParams {
    pub limit: u32,
    pub oldest: Option<f64>,
    pub latest: Option<f64>,
    pub cursor: Option<String>,
}

/// The Slack Web API operations the pipeline depends on.
#[async_trait]
pub trait SlackApi: Send + Sync {
    /// `conversations.list` restricted to the given comma-separated types,
    /// archived conversations excluded.
    async fn list_conversations(&self, types: &str) -> Result<Vec<Conversation>>;

    /// `users.list` — the full workspace directory.
    async fn list_users(&self) -> Result<Vec<Member>>;

    /// `conversations.open` for a DM with one user; returns the channel id.
    async fn open_dm(&self, user_id: &str) -> Result<String>;

    /// `conversations.history` — one page.
    async fn fetch_history(&self, channel: &str, params: &HistoryParams) -> Result<HistoryPage>;

    /// `conversations.join`.
    async fn join_conversation(&self, channel: &str) -> Result<()>;
}

/// Map a platform error code to the typed taxonomy.
///
/// Codes with a dedicated HTTP mapping get their own variant; everything
/// else surfaces as an upstream error carrying the reported code.
pub fn translate_error_code(code: &str) -> Error {
    match code {
        "not_authed" | "invalid_auth" | "invalid_token" | "token_revoked" | "account_inactive" => {
            Error::Unauthenticated(format!("slack api error: {code}"))
        }
        "rate_limited" | "ratelimited" => Error::RateLimited(format!("slack api error: {code}")),
        "channel_not_found" | "user_not_found" => {
            Error::NotFound(format!("slack api error: {code}"))
        }
        "not_in_channel" => Error::PermissionDenied(format!("slack api error: {code}")),
        other => Error::Upstream(other.to_string()),
    }
}

/// Production [`SlackApi`] implementation over reqwest.
///
/// Constructed per request from the caller-supplied token; holds no
/// mutable state.
pub struct SlackClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
}

impl SlackClient {
    pub fn new(api_base: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    /// POST one Web API method and unwrap the `ok`/`error` envelope.
    async fn api_post(&self, method: &str, body: serde_json::Value) -> Result<serde_json::Value> {
        let url = format!("{}/{}", self.api_base, method);
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("slack request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let payload = response.text().await.unwrap_or_default();
            return Err(Error::Upstream(format!(
                "slack api returned {status}: {payload}"
            )));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("invalid slack response: {e}")))?;

        if !payload.get("ok").and_then(|v| v.as_bool()).unwrap_or(false) {
            let code = payload
                .get("error")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown_error");
            return Err(translate_error_code(code));
        }

        Ok(payload)
    }
}

#[async_trait]
impl SlackApi for SlackClient {
    async fn list_conversations(&self, types: &str) -> Result<Vec<Conversation>> {
        let payload = self
            .api_post(
                "conversations.list",
                json!({
                    "types": types,
                    "exclude_archived": true,
                    "limit": 1000,
                }),
            )
            .await?;

        let channels = payload.get("channels").cloned().unwrap_or(json!([]));
        serde_json::from_value(channels)
            .map_err(|e| Error::Upstream(format!("invalid conversations.list response: {e}")))
    }

    async fn list_users(&self) -> Result<Vec<Member>> {
        let payload = self.api_post("users.list", json!({ "limit": 1000 })).await?;

        let members = payload.get("members").cloned().unwrap_or(json!([]));
        serde_json::from_value(members)
            .map_err(|e| Error::Upstream(format!("invalid users.list response: {e}")))
    }

    async fn open_dm(&self, user_id: &str) -> Result<String> {
        let payload = self
            .api_post("conversations.open", json!({ "users": user_id }))
            .await?;

        payload
            .pointer("/channel/id")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| Error::Upstream("conversations.open returned no channel id".into()))
    }

    async fn fetch_history(&self, channel: &str, params: &HistoryParams) -> Result<HistoryPage> {
        let mut body = json!({
            "channel": channel,
            "limit": params.limit,
        });
        if let Some(oldest) = params.oldest {
            body["oldest"] = json!(oldest.to_string());
        }
        if let Some(latest) = params.latest {
            body["latest"] = json!(latest.to_string());
        }
        if let Some(cursor) = &params.cursor {
            body["cursor"] = json!(cursor);
        }

        let payload = self.api_post("conversations.history", body).await?;

        let messages = payload.get("messages").cloned().unwrap_or(json!([]));
        let messages: Vec<RawMessage> = serde_json::from_value(messages)
            .map_err(|e| Error::Upstream(format!("invalid conversations.history response: {e}")))?;

        let next_cursor = payload
            .pointer("/response_metadata/next_cursor")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        Ok(HistoryPage {
            ok: true,
            messages,
            has_more: payload
                .get("has_more")
                .and_then(|v| v.as_bool())
                .unwrap_or(false),
            next_cursor,
            pin_count: payload
                .get("pin_count")
                .and_then(|v| v.as_i64())
                .unwrap_or(0),
        })
    }

    async fn join_conversation(&self, channel: &str) -> Result<()> {
        self.api_post("conversations.join", json!({ "channel": channel }))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translate_auth_codes() {
        for code in ["not_authed", "invalid_auth", "invalid_token", "token_revoked"] {
            let err = translate_error_code(code);
            assert_eq!(err.status(), 401, "{code} should map to 401");
        }
    }

    #[test]
    fn test_translate_rate_limit() {
        assert_eq!(translate_error_code("rate_limited").status(), 429);
        assert_eq!(translate_error_code("ratelimited").status(), 429);
    }

    #[test]
    fn test_translate_not_found_and_membership() {
        assert_eq!(translate_error_code("channel_not_found").status(), 404);
        assert_eq!(translate_error_code("not_in_channel").status(), 403);
    }

    #[test]
    fn test_translate_unknown_code_is_upstream() {
        let err = translate_error_code("fatal_error");
        assert_eq!(err.status(), 500);
        assert!(err.to_string().contains("fatal_error"));
    }
}
