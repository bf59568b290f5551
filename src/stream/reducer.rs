//! # Delta Reducer
//!
//! Interprets event payloads as frames. Payload schema:
//!
//! ```text
//! { "content"?: string, "chatId" | "chat_id"?: string | integer, "error"?: string }
//! ```
//!
//! A malformed payload is dropped and logged; it never aborts the stream.

use log::{debug, info, warn};
use serde::Deserialize;

use crate::core::message::ConversationId;
use crate::stream::event::Event;

/// One decoded protocol unit. Transient: folded into the draft or the
/// conversation id by the state machine, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Content(String),
    IdAssignment(ConversationId),
    Done,
    /// The backend reported a generation failure in-band.
    ServerError(String),
}

#[derive(Deserialize, Debug, Default)]
struct DeltaPayload {
    #[serde(default)]
    content: Option<String>,
    #[serde(default, rename = "chatId", alias = "chat_id")]
    chat_id: Option<ConversationId>,
    #[serde(default)]
    error: Option<String>,
}

/// Per-stream reducer state.
#[derive(Debug)]
pub struct DeltaReducer {
    id_bound: bool,
    deltas: usize,
    malformed: usize,
}

impl DeltaReducer {
    /// `id_already_bound` is true when the conversation had an id before the
    /// stream opened; any id in the stream is then ignored.
    pub fn new(id_already_bound: bool) -> Self {
        Self {
            id_bound: id_already_bound,
            deltas: 0,
            malformed: 0,
        }
    }

    pub fn reduce_event(&mut self, event: Event<'_>) -> Vec<Frame> {
        match event {
            Event::Ignore => Vec::new(),
            Event::Sentinel => vec![Frame::Done],
            Event::Payload(payload) => self.reduce(payload),
        }
    }

    /// Parses a non-sentinel payload into zero or more frames, in the order
    /// content, id assignment, error.
    pub fn reduce(&mut self, payload: &str) -> Vec<Frame> {
        let parsed: DeltaPayload = match serde_json::from_str(payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.malformed += 1;
                warn!(
                    "Dropping malformed payload #{} ({}): {}",
                    self.malformed, e, payload
                );
                return Vec::new();
            }
        };

        let mut frames = Vec::new();

        if let Some(text) = parsed.content
            && !text.is_empty()
        {
            self.deltas += 1;
            frames.push(Frame::Content(text));
        }

        if let Some(id) = parsed.chat_id
            && !id.as_str().is_empty()
        {
            if self.id_bound {
                debug!("Ignoring conversation id {id}: already bound");
            } else {
                info!("Stream assigned conversation id {id}");
                self.id_bound = true;
                frames.push(Frame::IdAssignment(id));
            }
        }

        if let Some(message) = parsed.error {
            warn!("Backend reported an error mid-stream: {message}");
            frames.push(Frame::ServerError(message));
        }

        if frames.is_empty() {
            debug!("Payload carried nothing actionable: {payload}");
        }
        frames
    }

    pub fn delta_count(&self) -> usize {
        self.deltas
    }

    pub fn malformed_count(&self) -> usize {
        self.malformed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(text: &str) -> Frame {
        Frame::Content(text.to_string())
    }

    #[test]
    fn test_content_is_appended_verbatim() {
        let mut reducer = DeltaReducer::new(false);
        assert_eq!(reducer.reduce(r#"{"content":"  spaced  "}"#), vec![content("  spaced  ")]);
        assert_eq!(reducer.reduce(r#"{"content":"  spaced  "}"#), vec![content("  spaced  ")]);
        assert_eq!(reducer.delta_count(), 2);
    }

    #[test]
    fn test_draft_is_concatenation_of_content_fields() {
        let payloads = [
            r#"{"content":"The"}"#,
            r#"{"content":" quick"}"#,
            r#"{"content":""}"#,
            r#"{"content":" fox\n"}"#,
        ];
        let mut reducer = DeltaReducer::new(true);
        let mut draft = String::new();
        for (n, payload) in payloads.iter().enumerate() {
            for frame in reducer.reduce(payload) {
                if let Frame::Content(text) = frame {
                    draft.push_str(&text);
                }
            }
            let expected: String = payloads[..=n]
                .iter()
                .map(|p| serde_json::from_str::<serde_json::Value>(p).unwrap()["content"]
                    .as_str()
                    .unwrap()
                    .to_string())
                .collect();
            assert_eq!(draft, expected);
        }
    }

    #[test]
    fn test_id_assignment_is_first_writer_wins() {
        let mut reducer = DeltaReducer::new(false);
        assert_eq!(
            reducer.reduce(r#"{"chatId":"a"}"#),
            vec![Frame::IdAssignment(ConversationId::new("a"))]
        );
        assert!(reducer.reduce(r#"{"chatId":"b"}"#).is_empty());
    }

    #[test]
    fn test_id_ignored_when_bound_before_stream() {
        let mut reducer = DeltaReducer::new(true);
        assert_eq!(
            reducer.reduce(r#"{"content":"x","chat_id":12}"#),
            vec![content("x")]
        );
    }

    #[test]
    fn test_snake_case_integer_id_is_accepted() {
        let mut reducer = DeltaReducer::new(false);
        assert_eq!(
            reducer.reduce(r#"{"content":"Hi","chat_id":7}"#),
            vec![content("Hi"), Frame::IdAssignment(ConversationId::new("7"))]
        );
    }

    #[test]
    fn test_malformed_payload_is_dropped_and_counted() {
        let mut reducer = DeltaReducer::new(false);
        assert!(reducer.reduce("not-json").is_empty());
        assert!(reducer.reduce("[1,2,3]").is_empty());
        assert_eq!(reducer.malformed_count(), 2);
        assert_eq!(reducer.reduce(r#"{"content":"ok"}"#), vec![content("ok")]);
    }

    #[test]
    fn test_error_field_becomes_server_error() {
        let mut reducer = DeltaReducer::new(false);
        assert_eq!(
            reducer.reduce(r#"{"error":"model unavailable"}"#),
            vec![Frame::ServerError("model unavailable".to_string())]
        );
    }

    #[test]
    fn test_reduce_event_maps_sentinel_and_ignore() {
        let mut reducer = DeltaReducer::new(false);
        assert_eq!(reducer.reduce_event(Event::Sentinel), vec![Frame::Done]);
        assert!(reducer.reduce_event(Event::Ignore).is_empty());
        assert_eq!(
            reducer.reduce_event(Event::Payload(r#"{"content":"a"}"#)),
            vec![content("a")]
        );
    }

    #[test]
    fn test_unknown_fields_are_tolerated() {
        let mut reducer = DeltaReducer::new(false);
        assert_eq!(
            reducer.reduce(r#"{"content":"a","usage":{"tokens":3}}"#),
            vec![content("a")]
        );
    }
}
