//! # Application State
//!
//! Core business state for Parley. This module contains domain logic only -
//! no TUI-specific types. Presentation state lives in the `tui` module.
//!
//! ```text
//! App
//! ├── conversation: Conversation     // id, transcript, draft, phase
//! ├── history: History               // conversation summaries
//! ├── status_message: String         // status bar text
//! ├── error: Option<String>          // last user-visible failure
//! ├── auth_required: bool            // backend rejected our credential
//! ├── pending_load: Option<ConversationId> // load we are still waiting for
//! └── auto_open_latest: bool         // open newest conversation on first refresh
//! ```
//!
//! State changes only happen through `update(state, action)` in action.rs.
//! This keeps things predictable, so no surprise mutations.

use crate::core::config::ResolvedConfig;
use crate::core::conversation::Conversation;
use crate::core::history::History;
use crate::core::message::ConversationId;

pub struct App {
    pub conversation: Conversation,
    pub history: History,
    pub status_message: String,
    pub error: Option<String>,
    pub auth_required: bool,
    /// Only a load result for this id may replace the transcript.
    pub pending_load: Option<ConversationId>,
    pub auto_open_latest: bool,
}

impl App {
    pub fn new(auto_open_latest: bool) -> Self {
        Self {
            conversation: Conversation::new(),
            history: History::new(),
            status_message: String::from("Welcome to Parley!"),
            error: None,
            auth_required: false,
            pending_load: None,
            auto_open_latest,
        }
    }

    pub fn from_config(config: &ResolvedConfig) -> Self {
        Self::new(config.auto_open_latest)
    }

    pub fn is_generating(&self) -> bool {
        !self.conversation.is_idle()
    }
}
