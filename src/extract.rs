//! Per-service extraction dispatch.
//!
//! Slack is the one real extractor: it resolves the conversation name,
//! fetches a single history page, and auto-joins once when the caller
//! lacks membership. GitHub and Google are placeholders that return a
//! fixed payload until their extractors exist.

use serde_json::json;

use crate::error::{Error, Result};
use crate::models::{ExtractionRequest, Service};
use crate::resolver;
use crate::slack::{HistoryPage, HistoryParams, SlackApi};

/// Extract one page of messages from the requested Slack conversation.
///
/// Requires `conversation_name` and `conversation_kind` on the request.
pub async fn extract_slack(
    api: &dyn SlackApi,
    request: &ExtractionRequest,
) -> Result<HistoryPage> {
    let name = request.conversation_name.as_deref().ok_or_else(|| {
        Error::InvalidArgument("conversation_name is required when service is 'slack'".into())
    })?;
    let kind = request.conversation_kind.as_deref().ok_or_else(|| {
        Error::InvalidArgument("conversation_kind is required when service is 'slack'".into())
    })?;

    let channel = resolver::resolve_conversation(api, name, kind).await?;

    let params = HistoryParams {
        limit: request.limit,
        oldest: request.oldest,
        latest: request.latest,
        cursor: request.cursor.clone(),
    };

    fetch_with_autojoin(api, &channel, &params).await
}

/// One page fetch. A membership error triggers a single join-and-retry;
/// a failed join is a permission error and nothing loops further.
async fn fetch_with_autojoin(
    api: &dyn SlackApi,
    channel: &str,
    params: &HistoryParams,
) -> Result<HistoryPage> {
    match api.fetch_history(channel, params).await {
        Ok(page) => Ok(page),
        Err(Error::PermissionDenied(_)) => {
            if let Err(join_err) = api.join_conversation(channel).await {
                return Err(Error::PermissionDenied(format!(
                    "not a member of conversation '{channel}' and joining failed: {join_err}"
                )));
            }
            api.fetch_history(channel, params).await
        }
        Err(other) => Err(other),
    }
}

/// Fixed payload for services whose extractors are not implemented.
pub fn placeholder_payload(service: Service) -> serde_json::Value {
    json!({
        "message": "TODO",
        "service": service.as_str(),
    })
}
