//! # Runtime
//!
//! Carries out the effects `update()` asks for. Each effect that needs I/O
//! becomes one tokio task, and each task reports back with actions on the
//! same channel the UI loop drains:
//!
//! ```text
//! SpawnTurn ──► submit ──► StreamOpened ──► Delta/BindId ... ──► Complete | Fail
//! RefreshHistory ──► HistoryLoaded | HistoryFailed
//! LoadConversation ──► ConversationLoaded | ConversationLoadFailed
//! ```
//!
//! A turn task always finishes with exactly one `Complete` or `Fail`,
//! unless it is aborted, in which case `update()` has already moved on.

use std::sync::{Arc, mpsc};

use log::{debug, info, warn};
use tokio::task::{AbortHandle, JoinHandle};

use crate::api::{ApiError, ChatBackend, SubmitRequest};
use crate::core::action::{Action, Effect, TurnRequest};
use crate::core::conversation::TurnError;
use crate::core::message::ConversationId;
use crate::stream::{self, StreamChunk, StreamError, StreamOutcome};

impl From<ApiError> for TurnError {
    fn from(error: ApiError) -> Self {
        match error {
            ApiError::Auth(msg) => TurnError::Auth(msg),
            other => TurnError::Transport(other.to_string()),
        }
    }
}

impl From<StreamError> for TurnError {
    fn from(error: StreamError) -> Self {
        match error {
            StreamError::Transport(msg) => TurnError::Transport(msg),
            StreamError::Server(msg) => TurnError::Transport(format!("server error: {msg}")),
            // Only happens when the UI is gone; the result is never read.
            StreamError::ChannelClosed => TurnError::Abandoned,
        }
    }
}

fn send(tx: &mpsc::Sender<Action>, action: Action) -> bool {
    if tx.send(action).is_err() {
        warn!("Failed to send action: receiver dropped");
        return false;
    }
    true
}

/// Runs one turn to completion and returns its final action.
pub async fn run_turn(
    backend: &dyn ChatBackend,
    request: &TurnRequest,
    tx: &mpsc::Sender<Action>,
) -> Action {
    let turn = request.turn;
    info!(
        "Turn {turn}: submitting {} messages via {}",
        request.messages.len(),
        backend.name()
    );

    let body = match backend
        .submit(SubmitRequest {
            messages: &request.messages,
            conversation_id: request.conversation_id.as_ref(),
        })
        .await
    {
        Ok(body) => body,
        Err(e) => {
            warn!("Turn {turn}: submission failed: {e}");
            return Action::Fail {
                turn,
                error: e.into(),
            };
        }
    };

    if !send(tx, Action::StreamOpened { turn }) {
        return Action::Fail {
            turn,
            error: TurnError::Abandoned,
        };
    }

    let id_already_bound = request.conversation_id.is_some();
    let outcome = stream::consume(body, id_already_bound, |chunk| {
        let action = match chunk {
            StreamChunk::Content(text) => Action::Delta { turn, text },
            StreamChunk::ConversationId(id) => Action::BindId { turn, id },
        };
        send(tx, action)
    })
    .await;

    match outcome {
        Ok(StreamOutcome::Completed) => Action::Complete { turn },
        Ok(StreamOutcome::Truncated(reason)) => {
            warn!("Turn {turn}: response truncated: {reason}");
            Action::Fail {
                turn,
                error: TurnError::Truncated(reason),
            }
        }
        Err(e) => {
            warn!("Turn {turn}: stream failed: {e}");
            Action::Fail {
                turn,
                error: e.into(),
            }
        }
    }
}

pub fn spawn_turn(
    backend: Arc<dyn ChatBackend>,
    request: TurnRequest,
    tx: mpsc::Sender<Action>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let last = run_turn(backend.as_ref(), &request, &tx).await;
        debug!("Turn {} finished: {:?}", request.turn, last);
        send(&tx, last);
    })
}

pub fn spawn_history_refresh(
    backend: Arc<dyn ChatBackend>,
    tx: mpsc::Sender<Action>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let action = match backend.list_conversations().await {
            Ok(entries) => Action::HistoryLoaded(entries),
            Err(e) => Action::HistoryFailed {
                auth: matches!(e, ApiError::Auth(_)),
                error: e.to_string(),
            },
        };
        send(&tx, action);
    })
}

pub fn spawn_conversation_load(
    backend: Arc<dyn ChatBackend>,
    id: ConversationId,
    tx: mpsc::Sender<Action>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let action = match backend.list_messages(&id).await {
            Ok(messages) => Action::ConversationLoaded { id, messages },
            Err(e) => Action::ConversationLoadFailed {
                id,
                error: e.to_string(),
            },
        };
        send(&tx, action);
    })
}

/// Owns the backend and the handle of the turn in flight.
pub struct Runtime {
    backend: Arc<dyn ChatBackend>,
    tx: mpsc::Sender<Action>,
    active_turn: Option<AbortHandle>,
}

impl Runtime {
    pub fn new(backend: Arc<dyn ChatBackend>, tx: mpsc::Sender<Action>) -> Self {
        Self {
            backend,
            tx,
            active_turn: None,
        }
    }

    /// Carries out an effect. Returns `true` when the app should quit.
    pub fn execute(&mut self, effect: Effect) -> bool {
        match effect {
            Effect::None => {}
            Effect::SpawnTurn(request) => {
                let handle = spawn_turn(self.backend.clone(), request, self.tx.clone());
                self.active_turn = Some(handle.abort_handle());
            }
            Effect::RefreshHistory => {
                spawn_history_refresh(self.backend.clone(), self.tx.clone());
            }
            Effect::LoadConversation(id) => {
                spawn_conversation_load(self.backend.clone(), id, self.tx.clone());
            }
            Effect::AbortTurn => self.abort_turn(),
            Effect::Quit => {
                self.abort_turn();
                return true;
            }
        }
        false
    }

    fn abort_turn(&mut self) {
        if let Some(handle) = self.active_turn.take() {
            debug!("Aborting turn task");
            handle.abort();
        }
    }
}
