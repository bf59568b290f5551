//! Wire types for the chat backend's JSON endpoints, plus their conversion
//! into the core types.

use chrono::{DateTime, NaiveDateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::ApiError;
use crate::core::message::{
    ConversationId, ConversationSummary, Message, Role, StoredMessage, string_or_integer,
};

// ============================================================================
// Requests
// ============================================================================

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct WireMessage<'a> {
    pub role: Role,
    pub content: &'a str,
}

/// Body of `POST chat/completion/`.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CompletionBody<'a> {
    pub messages: Vec<WireMessage<'a>>,
    /// Serialized as `null` for a conversation the backend has not seen yet.
    pub chat_id: Option<&'a ConversationId>,
}

impl<'a> CompletionBody<'a> {
    pub fn new(messages: &'a [Message], chat_id: Option<&'a ConversationId>) -> Self {
        Self {
            messages: messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role,
                    content: &m.content,
                })
                .collect(),
            chat_id,
        }
    }
}

// ============================================================================
// Responses
// ============================================================================

/// One row of `GET chats/`.
#[derive(Deserialize, Debug)]
pub struct WireSummary {
    pub id: ConversationId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

impl From<WireSummary> for ConversationSummary {
    fn from(wire: WireSummary) -> Self {
        let title = wire
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| String::from("Untitled"));
        ConversationSummary {
            id: wire.id,
            title,
            created_at: wire.created_at.unwrap_or_default(),
        }
    }
}

/// One row of `GET chats/{id}/messages/`.
#[derive(Deserialize, Debug)]
pub struct WireStoredMessage {
    #[serde(deserialize_with = "string_or_integer")]
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub content: String,
    pub created_at: String,
}

/// Converts a message list, skipping roles that don't belong in a transcript.
pub fn into_stored_messages(wire: Vec<WireStoredMessage>) -> Result<Vec<StoredMessage>, ApiError> {
    let total = wire.len();
    let mut messages = Vec::with_capacity(total);
    for row in wire {
        let Some(role) = Role::from_wire(&row.role) else {
            debug!("Skipping stored message {} with role '{}'", row.id, row.role);
            continue;
        };
        let created_at = parse_timestamp(&row.created_at).ok_or_else(|| {
            ApiError::Parse(format!(
                "message {} has an unreadable timestamp '{}'",
                row.id, row.created_at
            ))
        })?;
        messages.push(StoredMessage {
            id: row.id,
            role,
            content: row.content,
            created_at,
        });
    }
    if messages.len() != total {
        debug!("Kept {} of {} stored messages", messages.len(), total);
    }
    Ok(messages)
}

/// Accepts RFC 3339 timestamps, and naive ones (read as UTC) as some
/// backends drop the offset.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    warn!("Unrecognized timestamp: {raw}");
    None
}

#[derive(Deserialize, Debug, Default)]
struct ErrorBody {
    detail: Option<String>,
    error: Option<String>,
}

/// Pulls a human-readable message out of an error response body. The
/// backend uses either `{"detail": ..}` or `{"error": ..}`.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: Some(msg), ..
        })
        | Ok(ErrorBody {
            error: Some(msg), ..
        }) => msg,
        _ if body.trim().is_empty() => String::from("no details"),
        _ => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_completion_body_shape() {
        let messages = vec![Message::user("hello"), Message::assistant("hi")];
        let id = ConversationId::new("12");

        let json = serde_json::to_value(CompletionBody::new(&messages, Some(&id))).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "messages": [
                    {"role": "user", "content": "hello"},
                    {"role": "assistant", "content": "hi"}
                ],
                "chat_id": "12"
            })
        );

        let json = serde_json::to_value(CompletionBody::new(&messages[..1], None)).unwrap();
        assert_eq!(json["chat_id"], serde_json::Value::Null);
    }

    #[test]
    fn test_summary_with_integer_id() {
        let rows: Vec<WireSummary> = serde_json::from_str(
            r#"[{"id": 5, "title": "Trip plans", "created_at": "2025-04-15 10:00"},
                {"id": "6", "title": ""}]"#,
        )
        .unwrap();
        let summaries: Vec<ConversationSummary> = rows.into_iter().map(Into::into).collect();
        assert_eq!(summaries[0].id.as_str(), "5");
        assert_eq!(summaries[0].created_at, "2025-04-15 10:00");
        assert_eq!(summaries[1].title, "Untitled");
    }

    #[test]
    fn test_stored_messages_skip_system_role() {
        let rows: Vec<WireStoredMessage> = serde_json::from_str(
            r#"[{"id": 1, "role": "system", "content": "be brief", "created_at": "2025-04-15T10:00:00Z"},
                {"id": 2, "role": "user", "content": "hi", "created_at": "2025-04-15T10:00:01.250000+08:00"}]"#,
        )
        .unwrap();
        let messages = into_stored_messages(rows).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].id, "2");
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(
            messages[0].created_at,
            Utc.with_ymd_and_hms(2025, 4, 15, 2, 0, 1).unwrap() + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn test_unreadable_timestamp_is_parse_error() {
        let rows = vec![WireStoredMessage {
            id: "1".to_string(),
            role: "user".to_string(),
            content: "hi".to_string(),
            created_at: "yesterday".to_string(),
        }];
        assert!(matches!(into_stored_messages(rows), Err(ApiError::Parse(_))));
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2025, 4, 15, 10, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2025-04-15T10:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-04-15T10:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-04-15 10:00"), Some(expected));
        assert_eq!(parse_timestamp("not a date"), None);
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"detail": "not found"}"#), "not found");
        assert_eq!(error_message(r#"{"error": "please log in"}"#), "please log in");
        assert_eq!(error_message("Bad Gateway\n"), "Bad Gateway");
        assert_eq!(error_message(""), "no details");
    }
}
