//! # TitleBar Component
//!
//! Top status bar: which conversation is open, what the app is doing, and
//! whether there is unread content below the scroll position.
//!
//! Stateless: every field is a prop set by the parent each frame.

use crate::tui::component::Component;
use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};

const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

pub struct TitleBar {
    /// `None` for a conversation the backend has not assigned an id yet.
    pub conversation: Option<String>,
    pub status_message: String,
    pub has_unseen_content: bool,
    /// Some(frame) while a reply is generating.
    pub spinner_frame: Option<usize>,
    pub auth_required: bool,
}

impl TitleBar {
    fn conversation_label(&self) -> String {
        match &self.conversation {
            Some(id) => format!("#{id}"),
            None => String::from("new conversation"),
        }
    }
}

impl Component for TitleBar {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::raw(format!("Parley ({})", self.conversation_label()))];

        if let Some(tick) = self.spinner_frame {
            spans.push(Span::styled(
                format!(" {}", SPINNER[tick % SPINNER.len()]),
                Style::default().fg(Color::Green),
            ));
        }
        if !self.status_message.is_empty() {
            spans.push(Span::raw(format!(" | {}", self.status_message)));
        }
        if self.auth_required {
            spans.push(Span::styled(
                " | set PARLEY_TOKEN or auth.token",
                Style::default().fg(Color::Yellow),
            ));
        }
        if self.has_unseen_content {
            spans.push(Span::raw(" | ↓ New"));
        }

        frame.render_widget(Line::from(spans), area);
    }
}
