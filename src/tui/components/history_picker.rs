//! # History Picker Component
//!
//! Overlay listing recent conversations from the backend. Opened with
//! Ctrl+O, dismissed with Esc.
//!
//! Follows the persistent state + transient wrapper pattern:
//! - `HistoryPickerState` lives in `TuiState`
//! - `HistoryPicker` is created each frame with the history as a prop
//!
//! The list itself and the selection live in [`History`], which the
//! refresh tasks replace while the overlay is open.

use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Padding, Paragraph};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::core::history::History;
use crate::core::message::ConversationId;
use crate::tui::event::TuiEvent;

/// Events emitted by the history picker.
#[derive(Debug, Clone, PartialEq)]
pub enum PickerEvent {
    Open(ConversationId),
    CreateNew,
    Dismiss,
}

#[derive(Default)]
pub struct HistoryPickerState {
    list_state: ListState,
}

impl HistoryPickerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle a key event against the shared history list.
    pub fn handle_event(&mut self, event: &TuiEvent, history: &mut History) -> Option<PickerEvent> {
        match event {
            TuiEvent::Escape => Some(PickerEvent::Dismiss),
            TuiEvent::ScrollUp => {
                history.select_previous();
                None
            }
            TuiEvent::ScrollDown => {
                history.select_next();
                None
            }
            TuiEvent::Submit => history
                .selected()
                .map(|summary| PickerEvent::Open(summary.id.clone())),
            TuiEvent::InputChar('n') | TuiEvent::NewConversation => Some(PickerEvent::CreateNew),
            _ => None,
        }
    }
}

/// Transient render wrapper for the history overlay.
pub struct HistoryPicker<'a> {
    pub history: &'a History,
    /// Conversation shown behind the overlay, marked in the list.
    pub current: Option<&'a ConversationId>,
    pub state: &'a mut HistoryPickerState,
}

impl HistoryPicker<'_> {
    pub fn render(&mut self, frame: &mut Frame, area: Rect) {
        let overlay = centered_rect(80, 70, area);
        frame.render_widget(Clear, overlay);

        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title(" Conversations ")
            .title_alignment(Alignment::Left)
            .title_bottom(Line::from(" n New  Enter Open  Esc Back ").centered())
            .padding(Padding::horizontal(1));

        if self.history.is_empty() {
            let empty = Paragraph::new("No conversations yet.")
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center)
                .block(block);
            frame.render_widget(empty, overlay);
            return;
        }

        let inner_width = overlay.width.saturating_sub(4) as usize;
        let selected = self.history.selected_index();

        let items: Vec<ListItem> = self
            .history
            .entries()
            .iter()
            .enumerate()
            .map(|(i, summary)| {
                let marker = if self.current == Some(&summary.id) { "* " } else { "  " };
                // Layout: "* <title>   2024-01-15 10:30"
                let fixed_width = marker.len() + 2 + summary.created_at.width();
                let title_width = inner_width.saturating_sub(fixed_width);
                let title = truncate_str(&summary.title, title_width);
                let padding = title_width.saturating_sub(title.width());

                let style = if i == selected {
                    Style::default()
                        .fg(Color::White)
                        .add_modifier(Modifier::BOLD | Modifier::REVERSED)
                } else {
                    Style::default().fg(Color::Gray)
                };

                ListItem::new(Line::from(vec![
                    Span::styled(marker, style),
                    Span::styled(format!("{title}{}", " ".repeat(padding)), style),
                    Span::styled("  ", style),
                    Span::styled(summary.created_at.as_str(), style),
                ]))
            })
            .collect();

        self.state.list_state.select(Some(selected));
        let list = List::new(items).block(block);
        frame.render_stateful_widget(list, overlay, &mut self.state.list_state);
    }
}

/// Truncate to `max_width` display columns, adding "..." if needed.
fn truncate_str(s: &str, max_width: usize) -> String {
    if s.width() <= max_width {
        return s.to_string();
    }
    if max_width <= 3 {
        return ".".repeat(max_width);
    }
    let mut out = String::new();
    let mut used = 0;
    for c in s.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > max_width - 3 {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push_str("...");
    out
}

/// Compute a centered rect using percentage of the outer rect.
fn centered_rect(percent_x: u16, percent_y: u16, outer: Rect) -> Rect {
    let [_, center_v, _] = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .areas(outer);
    let [_, center, _] = Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .areas(center_v);
    center
}
