//! # History Synchronizer
//!
//! Read-only cache of conversation summaries, replaced wholesale on every
//! successful refresh. A failed refresh leaves the cache exactly as it was.
//!
//! Also tracks a selection cursor for the history overlay.

use log::{debug, info, warn};

use crate::core::message::{ConversationId, ConversationSummary};

#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<ConversationSummary>,
    selected: usize,
    loaded_once: bool,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ConversationSummary] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Swaps in a fresh list, ordered as the backend sent it (most recent
    /// first). Returns `true` for the first successful refresh of the session.
    pub fn replace(&mut self, entries: Vec<ConversationSummary>) -> bool {
        info!("History refreshed: {} conversations", entries.len());
        self.entries = entries;
        self.selected = self.selected.min(self.entries.len().saturating_sub(1));
        !std::mem::replace(&mut self.loaded_once, true)
    }

    pub fn refresh_failed(&self, error: &str) {
        warn!(
            "History refresh failed, keeping {} cached entries: {}",
            self.entries.len(),
            error
        );
    }

    /// Most recent conversation, if the backend listed any.
    pub fn latest(&self) -> Option<&ConversationSummary> {
        self.entries.first()
    }

    pub fn find(&self, id: &ConversationId) -> Option<&ConversationSummary> {
        self.entries.iter().find(|entry| &entry.id == id)
    }

    pub fn selected_index(&self) -> usize {
        self.selected
    }

    pub fn selected(&self) -> Option<&ConversationSummary> {
        self.entries.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if !self.entries.is_empty() {
            self.selected = (self.selected + 1).min(self.entries.len() - 1);
        }
    }

    pub fn select_previous(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Puts the cursor on `id` if it is listed, otherwise on the newest entry.
    pub fn select(&mut self, id: Option<&ConversationId>) {
        self.selected = id
            .and_then(|id| self.entries.iter().position(|entry| &entry.id == id))
            .unwrap_or(0);
        debug!("History cursor at {}", self.selected);
    }
}
