//! Message text normalization.
//!
//! Turns raw platform messages into single-line, whitespace-collapsed
//! records. Text is extracted by an ordered sequence of strategies — the
//! rich-text block representation first, then the flat `text` field —
//! each returning an optional result, stopping at the first success.
//! This is deliberately not a full document-object parser: any shape
//! deviation in the block tree degrades to the flat field.

use crate::models::{NormalizedMessage, RawMessage};

/// Normalize a page of raw messages, preserving order.
///
/// Messages lacking a user id, or yielding no text after trimming, are
/// dropped.
pub fn normalize_messages(messages: &[RawMessage]) -> Vec<NormalizedMessage> {
    messages.iter().filter_map(normalize_message).collect()
}

pub fn normalize_message(message: &RawMessage) -> Option<NormalizedMessage> {
    let user_id = message.user.as_deref().filter(|u| !u.is_empty())?;
    let content = extract_text(message)?;
    Some(NormalizedMessage {
        user_id: user_id.to_string(),
        content,
        source_ts: message.ts.parse::<f64>().ok(),
    })
}

/// Extraction strategies in order; first non-empty result wins.
fn extract_text(message: &RawMessage) -> Option<String> {
    block_text(message).or_else(|| flat_text(message))
}

/// First textual leaf at the fixed rich-text nesting depth:
/// `blocks[0].elements[0].elements[*]` where `type` is `"text"`.
fn block_text(message: &RawMessage) -> Option<String> {
    let blocks = message.blocks.as_ref()?;
    let elements = blocks.first()?.get("elements")?.as_array()?;
    let nested = elements.first()?.get("elements")?.as_array()?;
    let leaf = nested
        .iter()
        .find(|el| el.get("type").and_then(|t| t.as_str()) == Some("text"))?;
    let cleaned = collapse_whitespace(leaf.get("text")?.as_str()?);
    (!cleaned.is_empty()).then_some(cleaned)
}

fn flat_text(message: &RawMessage) -> Option<String> {
    let cleaned = collapse_whitespace(message.text.as_deref()?);
    (!cleaned.is_empty()).then_some(cleaned)
}

/// Replace newlines and carriage returns with spaces, collapse runs of
/// whitespace to one space, trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(user: Option<&str>, text: Option<&str>, ts: &str) -> RawMessage {
        RawMessage {
            user: user.map(str::to_string),
            text: text.map(str::to_string),
            ts: ts.to_string(),
            ..Default::default()
        }
    }

    fn rich_text_blocks(leaves: &[serde_json::Value]) -> Vec<serde_json::Value> {
        vec![json!({
            "type": "rich_text",
            "elements": [{
                "type": "rich_text_section",
                "elements": leaves,
            }],
        })]
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("a\nb"), "a b");
        assert_eq!(collapse_whitespace("a\r\nb"), "a b");
        assert_eq!(collapse_whitespace("  a   b  "), "a b");
        assert_eq!(collapse_whitespace("a\t\tb"), "a b");
        assert_eq!(collapse_whitespace("\n \r "), "");
    }

    #[test]
    fn test_block_text_preferred_over_flat_text() {
        let mut msg = message(Some("U1"), Some("fallback"), "1.0");
        msg.blocks = Some(rich_text_blocks(&[
            json!({"type": "emoji", "name": "wave"}),
            json!({"type": "text", "text": "from the  blocks\ntree"}),
        ]));

        let normalized = normalize_message(&msg).unwrap();
        assert_eq!(normalized.content, "from the blocks tree");
    }

    #[test]
    fn test_malformed_blocks_fall_back_to_flat_text() {
        let mut msg = message(Some("U1"), Some("plain\ntext"), "1.0");
        msg.blocks = Some(vec![json!({"type": "rich_text", "elements": "oops"})]);

        let normalized = normalize_message(&msg).unwrap();
        assert_eq!(normalized.content, "plain text");
    }

    #[test]
    fn test_empty_block_leaf_falls_back() {
        let mut msg = message(Some("U1"), Some("flat"), "1.0");
        msg.blocks = Some(rich_text_blocks(&[json!({"type": "text", "text": "  \n "})]));

        let normalized = normalize_message(&msg).unwrap();
        assert_eq!(normalized.content, "flat");
    }

    #[test]
    fn test_message_without_user_is_dropped() {
        assert!(normalize_message(&message(None, Some("hi"), "1.0")).is_none());
        assert!(normalize_message(&message(Some(""), Some("hi"), "1.0")).is_none());
    }

    #[test]
    fn test_message_without_any_text_is_dropped() {
        assert!(normalize_message(&message(Some("U1"), None, "1.0")).is_none());
        assert!(normalize_message(&message(Some("U1"), Some("   \n"), "1.0")).is_none());
    }

    #[test]
    fn test_ts_parsing() {
        let normalized = normalize_message(&message(Some("U1"), Some("hi"), "1712345678.000200"))
            .unwrap();
        assert!((normalized.source_ts.unwrap() - 1712345678.0002).abs() < 1e-6);

        let unparseable = normalize_message(&message(Some("U1"), Some("hi"), "")).unwrap();
        assert!(unparseable.source_ts.is_none());
    }

    #[test]
    fn test_output_shorter_or_equal_and_order_preserved() {
        let messages = vec![
            message(Some("U1"), Some("first"), "1.0"),
            message(None, Some("skipped"), "2.0"),
            message(Some("U2"), Some("second"), "3.0"),
            message(Some("U3"), None, "4.0"),
            message(Some("U4"), Some("third"), "5.0"),
        ];

        let normalized = normalize_messages(&messages);
        assert!(normalized.len() <= messages.len());
        let contents: Vec<&str> = normalized.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }
}
