//! # Actions
//!
//! Everything that can happen in Parley becomes an `Action`.
//! User presses Enter? That's `Action::Submit(text)`.
//! A delta arrives on the stream? That's `Action::Delta { turn, text }`.
//!
//! The `update()` function applies an action to the state and returns the
//! `Effect` the runtime should carry out. No I/O here.
//!
//! ```text
//! State + Action  →  update()  →  New State + Effect
//! ```
//!
//! Stream-originated actions carry the `TurnId` they belong to. Anything
//! tagged with a turn that is no longer active (abandoned, failed, or
//! superseded) is dropped here, so a late chunk can never leak into the
//! next turn's draft.

use log::{debug, info, warn};

use crate::core::conversation::{TurnError, TurnId};
use crate::core::message::{ConversationId, ConversationSummary, Message, StoredMessage};
use crate::core::state::App;

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Submit(String),
    StreamOpened {
        turn: TurnId,
    },
    Delta {
        turn: TurnId,
        text: String,
    },
    BindId {
        turn: TurnId,
        id: ConversationId,
    },
    Complete {
        turn: TurnId,
    },
    Fail {
        turn: TurnId,
        error: TurnError,
    },
    /// User walked away from the running turn (Esc).
    Abandon,
    DismissError,
    NewConversation,
    OpenConversation(ConversationId),
    ConversationLoaded {
        id: ConversationId,
        messages: Vec<StoredMessage>,
    },
    ConversationLoadFailed {
        id: ConversationId,
        error: String,
    },
    HistoryLoaded(Vec<ConversationSummary>),
    HistoryFailed {
        error: String,
        auth: bool,
    },
    Quit,
}

/// Everything the runtime needs to open a response stream for one turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnRequest {
    pub turn: TurnId,
    /// Full transcript including the message just submitted.
    pub messages: Vec<Message>,
    pub conversation_id: Option<ConversationId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    SpawnTurn(TurnRequest),
    RefreshHistory,
    LoadConversation(ConversationId),
    AbortTurn,
    Quit,
}

pub fn update(app: &mut App, action: Action) -> Effect {
    match action {
        Action::Submit(text) => match app.conversation.submit(&text) {
            Ok(turn) => {
                app.error = None;
                app.pending_load = None;
                app.status_message = String::from("Sending...");
                Effect::SpawnTurn(TurnRequest {
                    turn,
                    messages: app.conversation.transcript().to_vec(),
                    conversation_id: app.conversation.id().cloned(),
                })
            }
            Err(e) => {
                debug!("Submit rejected: {e}");
                app.status_message = format!("Not sent: {e}");
                Effect::None
            }
        },

        Action::StreamOpened { turn } => {
            if is_current(app, turn, "StreamOpened") {
                match app.conversation.stream_opened() {
                    Ok(()) => app.status_message = String::from("Generating..."),
                    Err(e) => warn!("StreamOpened for turn {turn} rejected: {e}"),
                }
            }
            Effect::None
        }

        Action::Delta { turn, text } => {
            if is_current(app, turn, "Delta")
                && let Err(e) = app.conversation.delta(&text)
            {
                warn!("Delta for turn {turn} rejected: {e}");
            }
            Effect::None
        }

        Action::BindId { turn, id } => {
            if is_current(app, turn, "BindId")
                && let Err(e) = app.conversation.bind_id(id)
            {
                debug!("Id assignment for turn {turn} ignored: {e}");
            }
            Effect::None
        }

        Action::Complete { turn } => {
            if !is_current(app, turn, "Complete") {
                return Effect::None;
            }
            match app.conversation.complete() {
                Ok(committed) => {
                    info!(
                        "Turn {turn} complete ({} reply bytes)",
                        committed.map(|m| m.content.len()).unwrap_or(0)
                    );
                    app.auth_required = false;
                    app.status_message = String::from("Ready");
                    Effect::RefreshHistory
                }
                Err(e) => {
                    warn!("Complete for turn {turn} rejected: {e}");
                    Effect::None
                }
            }
        }

        Action::Fail { turn, error } => {
            if !is_current(app, turn, "Fail") {
                return Effect::None;
            }
            if let Err(e) = app.conversation.fail(&error) {
                warn!("Fail for turn {turn} rejected: {e}");
                return Effect::None;
            }
            if matches!(error, TurnError::Auth(_)) {
                app.auth_required = true;
            }
            if error.is_user_visible() {
                app.error = Some(error.to_string());
            }
            app.status_message = match error {
                TurnError::Truncated(_) => String::from("Response incomplete, reply discarded"),
                TurnError::Abandoned => String::from("Generation abandoned"),
                TurnError::Auth(_) => String::from("Sign-in required"),
                TurnError::Transport(_) => String::from("Request failed"),
            };
            Effect::None
        }

        Action::Abandon => {
            let Some(turn) = app.conversation.active_turn() else {
                return Effect::None;
            };
            info!("Abandoning turn {turn}");
            if let Err(e) = app.conversation.fail(&TurnError::Abandoned) {
                warn!("Abandon rejected: {e}");
                return Effect::None;
            }
            app.status_message = String::from("Generation abandoned");
            Effect::AbortTurn
        }

        Action::DismissError => {
            app.error = None;
            Effect::None
        }

        Action::NewConversation => {
            match app.conversation.reset() {
                Ok(()) => {
                    app.pending_load = None;
                    app.error = None;
                    app.history.select(None);
                    app.status_message = String::from("New conversation");
                }
                Err(e) => {
                    debug!("New conversation rejected: {e}");
                    app.status_message = format!("Not now: {e}");
                }
            }
            Effect::None
        }

        Action::OpenConversation(id) => {
            if !app.conversation.is_idle() {
                app.status_message = String::from("Not now: a reply is still generating");
                return Effect::None;
            }
            app.status_message = format!("Opening conversation {id}...");
            app.pending_load = Some(id.clone());
            Effect::LoadConversation(id)
        }

        Action::ConversationLoaded { id, messages } => {
            if app.pending_load.as_ref() != Some(&id) {
                debug!("Ignoring stale load result for conversation {id}");
                return Effect::None;
            }
            app.pending_load = None;
            match app.conversation.load(id.clone(), messages) {
                Ok(()) => {
                    app.error = None;
                    app.history.select(Some(&id));
                    let title = app
                        .history
                        .find(&id)
                        .map(|entry| entry.title.clone())
                        .unwrap_or_else(|| id.to_string());
                    app.status_message = format!("Opened: {title}");
                }
                Err(e) => {
                    warn!("Loading conversation {id} rejected: {e}");
                }
            }
            Effect::None
        }

        Action::ConversationLoadFailed { id, error } => {
            if app.pending_load.as_ref() == Some(&id) {
                app.pending_load = None;
            }
            warn!("Failed to load conversation {id}: {error}");
            app.status_message = format!("Load failed: {error}");
            Effect::None
        }

        Action::HistoryLoaded(entries) => {
            let first_refresh = app.history.replace(entries);
            if !(first_refresh && app.auto_open_latest && app.pending_load.is_none()) {
                return Effect::None;
            }
            if !app.conversation.is_pristine() {
                debug!("Skipping auto-open: conversation already in use");
                return Effect::None;
            }
            match app.history.latest().map(|entry| entry.id.clone()) {
                Some(id) => {
                    info!("Auto-opening latest conversation {id}");
                    app.status_message = format!("Opening conversation {id}...");
                    app.pending_load = Some(id.clone());
                    Effect::LoadConversation(id)
                }
                None => Effect::None,
            }
        }

        Action::HistoryFailed { error, auth } => {
            app.history.refresh_failed(&error);
            if auth {
                app.auth_required = true;
                app.status_message = String::from("Sign-in required to list conversations");
            }
            Effect::None
        }

        Action::Quit => Effect::Quit,
    }
}

/// Stale-result guard: only the active turn may touch the conversation.
fn is_current(app: &App, turn: TurnId, action: &str) -> bool {
    let active = app.conversation.active_turn();
    if active == Some(turn) {
        true
    } else {
        debug!("Ignoring stale {action} for turn {turn} (active: {active:?})");
        false
    }
}
