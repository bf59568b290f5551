//! # Conversation State Machine
//!
//! Owns the conversation id, the committed transcript, and the in-flight
//! draft. Every change goes through a transition; an illegal transition
//! returns an error and leaves the conversation untouched.
//!
//! ```text
//!            submit            stream_opened
//!   Idle ───────────► Submitting ───────────► Generating ──┐ delta / bind_id
//!    ▲                    │                      │  ▲      │
//!    │        fail        │                      │  └──────┘
//!    ├────────────────────┘      complete / fail │
//!    └───────────────────────────────────────────┘
//! ```
//!
//! `reset` and `load` are only legal from `Idle`.

use std::fmt;

use log::{debug, info, warn};

use crate::core::message::{ConversationId, Message, StoredMessage};

/// Incremented by every accepted submit; stream results carry it so late
/// arrivals from an abandoned turn can be recognised.
pub type TurnId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Phase {
    #[default]
    Idle,
    Submitting {
        turn: TurnId,
    },
    Generating {
        turn: TurnId,
    },
}

impl Phase {
    fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Submitting { .. } => "submitting",
            Phase::Generating { .. } => "generating",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// `submit` with nothing but whitespace.
    EmptyInput,
    /// Operation not allowed in the current phase.
    Illegal { op: &'static str, phase: Phase },
    /// `bind_id` after an id is already bound.
    IdAlreadyBound(ConversationId),
}

impl fmt::Display for TransitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransitionError::EmptyInput => write!(f, "message is empty"),
            TransitionError::Illegal { op, phase } => {
                write!(f, "cannot {op} while {}", phase.name())
            }
            TransitionError::IdAlreadyBound(id) => {
                write!(f, "conversation already bound to {id}")
            }
        }
    }
}

impl std::error::Error for TransitionError {}

/// Why a turn ended without committing a reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnError {
    /// Connection failure, non-success status, mid-stream read failure, or
    /// an in-band server error.
    Transport(String),
    /// Credential missing, expired, or rejected.
    Auth(String),
    /// The body ended before the terminal marker.
    Truncated(String),
    /// The user walked away from the turn.
    Abandoned,
}

impl TurnError {
    /// Only transport and auth failures are shown to the user as errors.
    pub fn is_user_visible(&self) -> bool {
        matches!(self, TurnError::Transport(_) | TurnError::Auth(_))
    }
}

impl fmt::Display for TurnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnError::Transport(msg) => write!(f, "request failed: {msg}"),
            TurnError::Auth(msg) => write!(f, "authentication required: {msg}"),
            TurnError::Truncated(msg) => write!(f, "response incomplete: {msg}"),
            TurnError::Abandoned => write!(f, "generation abandoned"),
        }
    }
}

impl std::error::Error for TurnError {}

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    id: Option<ConversationId>,
    transcript: Vec<Message>,
    draft: String,
    phase: Phase,
    turns_started: TurnId,
    /// Set when the current turn bound the id, so a failed turn can undo it.
    id_bound_this_turn: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(&self) -> Option<&ConversationId> {
        self.id.as_ref()
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase == Phase::Idle
    }

    /// Idle, unbound, and empty: nothing the user would lose by loading.
    pub fn is_pristine(&self) -> bool {
        self.is_idle() && self.id.is_none() && self.transcript.is_empty()
    }

    /// The turn currently in `Submitting` or `Generating`, if any.
    pub fn active_turn(&self) -> Option<TurnId> {
        match self.phase {
            Phase::Idle => None,
            Phase::Submitting { turn } | Phase::Generating { turn } => Some(turn),
        }
    }

    fn illegal(&self, op: &'static str) -> TransitionError {
        TransitionError::Illegal {
            op,
            phase: self.phase,
        }
    }

    /// Appends the user message optimistically and opens a new turn.
    pub fn submit(&mut self, text: &str) -> Result<TurnId, TransitionError> {
        if !self.is_idle() {
            return Err(self.illegal("submit"));
        }
        let text = text.trim();
        if text.is_empty() {
            return Err(TransitionError::EmptyInput);
        }

        self.transcript.push(Message::user(text));
        self.draft.clear();
        self.id_bound_this_turn = false;
        self.turns_started += 1;
        let turn = self.turns_started;
        self.phase = Phase::Submitting { turn };
        debug!("Turn {turn} submitted ({} bytes)", text.len());
        Ok(turn)
    }

    pub fn stream_opened(&mut self) -> Result<(), TransitionError> {
        match self.phase {
            Phase::Submitting { turn } => {
                self.phase = Phase::Generating { turn };
                Ok(())
            }
            _ => Err(self.illegal("open a stream")),
        }
    }

    /// Appends to the draft and returns it for republishing.
    pub fn delta(&mut self, text: &str) -> Result<&str, TransitionError> {
        if !matches!(self.phase, Phase::Generating { .. }) {
            return Err(self.illegal("apply a delta"));
        }
        self.draft.push_str(text);
        Ok(&self.draft)
    }

    pub fn bind_id(&mut self, id: ConversationId) -> Result<(), TransitionError> {
        if !matches!(self.phase, Phase::Generating { .. }) {
            return Err(self.illegal("bind an id"));
        }
        if let Some(existing) = &self.id {
            return Err(TransitionError::IdAlreadyBound(existing.clone()));
        }
        info!("Conversation bound to {id}");
        self.id = Some(id);
        self.id_bound_this_turn = true;
        Ok(())
    }

    /// Commits a non-empty draft as the assistant reply and returns to Idle.
    pub fn complete(&mut self) -> Result<Option<&Message>, TransitionError> {
        if !matches!(self.phase, Phase::Generating { .. }) {
            return Err(self.illegal("complete"));
        }
        self.phase = Phase::Idle;
        self.id_bound_this_turn = false;

        let draft = std::mem::take(&mut self.draft);
        if draft.is_empty() {
            debug!("Turn completed with an empty reply, nothing committed");
            return Ok(None);
        }
        self.transcript.push(Message::assistant(draft));
        Ok(self.transcript.last())
    }

    /// Ends the turn without committing anything. The user message stays.
    pub fn fail(&mut self, error: &TurnError) -> Result<(), TransitionError> {
        let Some(turn) = self.active_turn() else {
            return Err(self.illegal("fail"));
        };
        warn!(
            "Turn {turn} failed ({error}), discarding {} draft bytes",
            self.draft.len()
        );
        self.draft.clear();
        if self.id_bound_this_turn {
            if let Some(id) = self.id.take() {
                debug!("Discarding id {id} bound during the failed turn");
            }
            self.id_bound_this_turn = false;
        }
        self.phase = Phase::Idle;
        Ok(())
    }

    /// Starts a new, unbound, empty conversation.
    pub fn reset(&mut self) -> Result<(), TransitionError> {
        if !self.is_idle() {
            return Err(self.illegal("reset"));
        }
        self.transcript.clear();
        self.draft.clear();
        self.id = None;
        Ok(())
    }

    /// Replaces the transcript with stored messages in creation order.
    pub fn load(
        &mut self,
        id: ConversationId,
        mut messages: Vec<StoredMessage>,
    ) -> Result<(), TransitionError> {
        if !self.is_idle() {
            return Err(self.illegal("load"));
        }
        messages.sort_by_key(|m| m.created_at);
        info!("Loaded conversation {id} ({} messages)", messages.len());
        self.transcript = messages.into_iter().map(Message::from).collect();
        self.draft.clear();
        self.id = Some(id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Role;
    use chrono::{TimeZone, Utc};

    fn generating(text: &str) -> Conversation {
        let mut conversation = Conversation::new();
        conversation.submit(text).unwrap();
        conversation.stream_opened().unwrap();
        conversation
    }

    fn stored(id: &str, role: Role, content: &str, minute: u32) -> StoredMessage {
        StoredMessage {
            id: id.to_string(),
            role,
            content: content.to_string(),
            created_at: Utc.with_ymd_and_hms(2025, 4, 15, 10, minute, 0).unwrap(),
        }
    }

    fn roles_and_content(conversation: &Conversation) -> Vec<(Role, &str)> {
        conversation
            .transcript()
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect()
    }

    #[test]
    fn test_submit_appends_user_message_and_enters_submitting() {
        let mut conversation = Conversation::new();
        let turn = conversation.submit("  hello  ").unwrap();
        assert_eq!(conversation.phase(), Phase::Submitting { turn });
        assert_eq!(roles_and_content(&conversation), vec![(Role::User, "hello")]);
        assert_eq!(conversation.draft(), "");
    }

    #[test]
    fn test_submit_rejects_blank_input() {
        let mut conversation = Conversation::new();
        assert_eq!(conversation.submit(" \n\t "), Err(TransitionError::EmptyInput));
        assert!(conversation.transcript().is_empty());
        assert!(conversation.is_idle());
    }

    #[test]
    fn test_submit_rejected_while_not_idle() {
        let mut conversation = Conversation::new();
        conversation.submit("first").unwrap();
        assert!(conversation.submit("second").is_err());

        conversation.stream_opened().unwrap();
        assert!(conversation.submit("third").is_err());
        assert_eq!(roles_and_content(&conversation), vec![(Role::User, "first")]);
    }

    #[test]
    fn test_turn_ids_increase_per_submit() {
        let mut conversation = generating("one");
        let first = conversation.active_turn().unwrap();
        conversation.complete().unwrap();
        let second = conversation.submit("two").unwrap();
        assert!(second > first);
    }

    #[test]
    fn test_hello_scenario() {
        let mut conversation = generating("hello");
        assert_eq!(conversation.delta("Hi").unwrap(), "Hi");
        assert_eq!(conversation.delta(" there").unwrap(), "Hi there");
        conversation.bind_id(ConversationId::new("c1")).unwrap();
        let committed = conversation.complete().unwrap().cloned();

        assert_eq!(committed.map(|m| m.content), Some("Hi there".to_string()));
        assert_eq!(
            roles_and_content(&conversation),
            vec![(Role::User, "hello"), (Role::Assistant, "Hi there")]
        );
        assert_eq!(conversation.id(), Some(&ConversationId::new("c1")));
        assert!(conversation.is_idle());
        assert_eq!(conversation.draft(), "");
    }

    #[test]
    fn test_duplicate_complete_does_not_touch_transcript() {
        let mut conversation = generating("hello");
        conversation.delta("reply").unwrap();
        conversation.complete().unwrap();
        let before = conversation.transcript().to_vec();

        assert!(conversation.complete().is_err());
        assert_eq!(conversation.transcript(), before.as_slice());
    }

    #[test]
    fn test_complete_with_empty_draft_commits_nothing() {
        let mut conversation = generating("hello");
        assert_eq!(conversation.complete().unwrap(), None);
        assert_eq!(conversation.transcript().len(), 1);
    }

    #[test]
    fn test_bind_id_is_first_writer_wins() {
        let mut conversation = generating("hello");
        conversation.bind_id(ConversationId::new("a")).unwrap();
        assert_eq!(
            conversation.bind_id(ConversationId::new("b")),
            Err(TransitionError::IdAlreadyBound(ConversationId::new("a")))
        );
        conversation.complete().unwrap();
        assert_eq!(conversation.id(), Some(&ConversationId::new("a")));
    }

    #[test]
    fn test_delta_and_bind_illegal_outside_generating() {
        let mut conversation = Conversation::new();
        assert!(conversation.delta("x").is_err());
        assert!(conversation.bind_id(ConversationId::new("a")).is_err());

        conversation.submit("hi").unwrap();
        assert!(conversation.delta("x").is_err());
        assert_eq!(conversation.draft(), "");
    }

    #[test]
    fn test_fail_discards_draft_but_keeps_user_message() {
        let mut conversation = generating("hello");
        conversation.delta("partial").unwrap();
        conversation
            .fail(&TurnError::Transport("reset".to_string()))
            .unwrap();

        assert!(conversation.is_idle());
        assert_eq!(conversation.draft(), "");
        assert_eq!(roles_and_content(&conversation), vec![(Role::User, "hello")]);
    }

    #[test]
    fn test_fail_from_submitting() {
        let mut conversation = Conversation::new();
        conversation.submit("hello").unwrap();
        conversation.fail(&TurnError::Auth("expired".to_string())).unwrap();
        assert!(conversation.is_idle());
    }

    #[test]
    fn test_fail_discards_id_bound_during_turn() {
        let mut conversation = generating("hello");
        conversation.bind_id(ConversationId::new("c9")).unwrap();
        conversation
            .fail(&TurnError::Transport("reset".to_string()))
            .unwrap();
        assert_eq!(conversation.id(), None);
    }

    #[test]
    fn test_fail_keeps_id_bound_by_earlier_turn() {
        let mut conversation = generating("hello");
        conversation.bind_id(ConversationId::new("c1")).unwrap();
        conversation.complete().unwrap();

        conversation.submit("again").unwrap();
        conversation.stream_opened().unwrap();
        conversation.fail(&TurnError::Abandoned).unwrap();
        assert_eq!(conversation.id(), Some(&ConversationId::new("c1")));
    }

    #[test]
    fn test_fail_illegal_when_idle() {
        let mut conversation = Conversation::new();
        assert!(conversation.fail(&TurnError::Abandoned).is_err());
    }

    #[test]
    fn test_reset_after_completed_turn() {
        let mut conversation = generating("hello");
        conversation.delta("hi").unwrap();
        conversation.bind_id(ConversationId::new("c1")).unwrap();
        conversation.complete().unwrap();

        conversation.reset().unwrap();
        assert!(conversation.transcript().is_empty());
        assert_eq!(conversation.id(), None);
        assert!(conversation.is_pristine());
    }

    #[test]
    fn test_reset_and_load_rejected_while_generating() {
        let mut conversation = generating("hello");
        conversation.delta("partial").unwrap();
        assert!(conversation.reset().is_err());
        assert!(conversation.load(ConversationId::new("c2"), Vec::new()).is_err());
        assert_eq!(conversation.draft(), "partial");
        assert_eq!(conversation.transcript().len(), 1);
    }

    #[test]
    fn test_load_sorts_by_creation_time_and_replaces_everything() {
        let mut conversation = generating("old");
        conversation.delta("old reply").unwrap();
        conversation.bind_id(ConversationId::new("c1")).unwrap();
        conversation.complete().unwrap();

        conversation
            .load(
                ConversationId::new("c2"),
                vec![
                    stored("3", Role::User, "second question", 2),
                    stored("1", Role::User, "first question", 0),
                    stored("2", Role::Assistant, "first answer", 1),
                ],
            )
            .unwrap();

        assert_eq!(conversation.id(), Some(&ConversationId::new("c2")));
        let ids: Vec<&str> = conversation.transcript().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(conversation.draft(), "");
    }

    #[test]
    fn test_transition_error_display() {
        let conversation = generating("hello");
        let err = conversation.clone().reset().unwrap_err();
        assert_eq!(err.to_string(), "cannot reset while generating");
    }
}
