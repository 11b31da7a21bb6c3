//! Conversation and identity resolution.
//!
//! [`resolve_conversation`] turns a human-supplied conversation name into
//! a concrete conversation id, short-circuiting when the input already is
//! one. [`resolve_user_names`] builds the user-id → display-name table
//! used to annotate extracted messages; it degrades to an empty table on
//! upstream failure instead of failing the caller.

use std::collections::{HashMap, HashSet};

use crate::error::{Error, Result};
use crate::models::ConversationKind;
use crate::slack::{Member, SlackApi};

/// True when `value` already looks like a conversation id: a leading
/// `C` (channel), `G` (group), or `D` (DM) followed by at least eight
/// uppercase alphanumerics.
pub fn is_conversation_id(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !matches!(first, 'C' | 'G' | 'D') {
        return false;
    }
    let tail = chars.as_str();
    tail.len() >= 8
        && tail
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
}

/// Resolve a conversation name to its id.
///
/// An input matching the id convention is returned unchanged without an
/// upstream call, so resolution is idempotent. Otherwise the name is
/// matched case-insensitively against the listing for the declared kind;
/// for DMs the directory is searched and a DM conversation is opened.
pub async fn resolve_conversation(api: &dyn SlackApi, name: &str, kind: &str) -> Result<String> {
    if is_conversation_id(name) {
        return Ok(name.to_string());
    }

    match ConversationKind::parse(kind)? {
        ConversationKind::Channel => {
            let conversations = api
                .list_conversations("public_channel,private_channel")
                .await?;
            conversations
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name))
                .map(|c| c.id.clone())
                .ok_or_else(|| Error::NotFound(format!("channel '{name}' not found")))
        }
        ConversationKind::Group => {
            let conversations = api.list_conversations("private_channel").await?;
            conversations
                .iter()
                .find(|c| c.name.eq_ignore_ascii_case(name))
                .map(|c| c.id.clone())
                .ok_or_else(|| Error::NotFound(format!("private group '{name}' not found")))
        }
        ConversationKind::Im => {
            let members = api.list_users().await?;
            let user = members
                .iter()
                .find(|m| member_matches(m, name))
                .ok_or_else(|| Error::NotFound(format!("user '{name}' not found")))?;
            api.open_dm(&user.id).await
        }
    }
}

/// Directory match for DM resolution: username, display name, email, or
/// real name, case-insensitively.
fn member_matches(member: &Member, needle: &str) -> bool {
    let matches = |value: &Option<String>| {
        value
            .as_deref()
            .is_some_and(|v| v.eq_ignore_ascii_case(needle))
    };
    matches(&member.name)
        || matches(&member.profile.display_name)
        || matches(&member.profile.email)
        || matches(&member.profile.real_name)
}

/// Build a user-id → name table for the given ids.
///
/// Fetches the directory once and keeps only the requested ids, preferring
/// display name, then real name, then username, then the id itself. Never
/// fails: an upstream error yields an empty table and callers fall back to
/// raw ids.
pub async fn resolve_user_names(
    api: &dyn SlackApi,
    user_ids: &[String],
) -> HashMap<String, String> {
    let wanted: HashSet<&str> = user_ids.iter().map(String::as_str).collect();
    if wanted.is_empty() {
        return HashMap::new();
    }

    let members = match api.list_users().await {
        Ok(members) => members,
        Err(e) => {
            tracing::warn!("user directory lookup failed, falling back to raw ids: {e}");
            return HashMap::new();
        }
    };

    let mut names = HashMap::new();
    for member in members {
        if !wanted.contains(member.id.as_str()) {
            continue;
        }
        let name = preferred_name(&member);
        names.insert(member.id, name);
    }
    names
}

fn preferred_name(member: &Member) -> String {
    let nonempty = |value: &Option<String>| {
        value
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };
    nonempty(&member.profile.display_name)
        .or_else(|| nonempty(&member.profile.real_name))
        .or_else(|| nonempty(&member.name))
        .unwrap_or_else(|| member.id.clone())
}
