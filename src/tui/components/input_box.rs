//! # InputBox Component
//!
//! Multi-line text input. The buffer and cursor are internal state; the
//! `busy` flag is a prop from the application state and only changes the
//! title, since the core decides whether a submit is accepted.
//!
//! Submitting does not clear the buffer. The parent clears it once the
//! message has actually been taken, so text typed during a generation is
//! not lost when the submit is rejected.

use ratatui::Frame;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, BorderType, Paragraph};
use unicode_width::UnicodeWidthStr;

use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

/// Border (2) + padding (2) consumed horizontally by the bordered block
const HORIZONTAL_OVERHEAD: u16 = 4;
/// Top + bottom borders consumed vertically
const VERTICAL_OVERHEAD: u16 = 2;
/// Maximum visible content lines before older lines scroll out of view
const MAX_VISIBLE_LINES: u16 = 5;

/// High-level events emitted by the InputBox
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Submit(String),
    ContentChanged,
}

pub struct InputBox {
    buffer: String,
    /// Byte offset into `buffer`, always on a char boundary.
    cursor: usize,
    /// Prop: a reply is generating.
    pub busy: bool,
}

impl Default for InputBox {
    fn default() -> Self {
        Self::new()
    }
}

fn wrap_options(width: u16) -> textwrap::Options<'static> {
    textwrap::Options::new(width.max(1) as usize)
        .break_words(true)
        .word_separator(textwrap::WordSeparator::AsciiSpace)
}

/// Wraps `text`, keeping the empty line textwrap drops after a trailing newline.
fn wrapped_lines(text: &str, width: u16) -> Vec<String> {
    let mut lines: Vec<String> = textwrap::wrap(text, wrap_options(width))
        .into_iter()
        .map(|line| line.into_owned())
        .collect();
    if lines.is_empty() || (text.ends_with('\n') && lines.last().is_some_and(|l| !l.is_empty())) {
        lines.push(String::new());
    }
    lines
}

fn prev_char_boundary(text: &str, pos: usize) -> usize {
    text[..pos]
        .char_indices()
        .next_back()
        .map(|(i, _)| i)
        .unwrap_or(0)
}

fn next_char_boundary(text: &str, pos: usize) -> usize {
    text[pos..]
        .chars()
        .next()
        .map(|c| pos + c.len_utf8())
        .unwrap_or(text.len())
}

impl InputBox {
    pub fn new() -> Self {
        Self {
            buffer: String::new(),
            cursor: 0,
            busy: false,
        }
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }

    /// Required height for the current buffer, clamped to the visible maximum.
    pub fn calculate_height(&self, width: u16) -> u16 {
        let inner = width.saturating_sub(HORIZONTAL_OVERHEAD);
        let lines = wrapped_lines(&self.buffer, inner).len() as u16;
        lines.clamp(1, MAX_VISIBLE_LINES) + VERTICAL_OVERHEAD
    }

    /// Line and column of the cursor within the wrapped buffer.
    fn cursor_line_col(&self, inner: u16) -> (u16, u16) {
        let prefix = &self.buffer[..self.cursor];
        let before = wrapped_lines(prefix, inner);
        let line = before.len().saturating_sub(1) as u16;
        // textwrap drops trailing spaces, the cursor sits after them
        let trailing = prefix.len() - prefix.trim_end_matches(' ').len();
        let col = before.last().map(|l| l.width()).unwrap_or(0) + trailing;
        (line, (col as u16).min(inner.saturating_sub(1)))
    }
}

impl Component for InputBox {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        let inner = area.width.saturating_sub(HORIZONTAL_OVERHEAD);
        let lines = wrapped_lines(&self.buffer, inner);
        let (cursor_line, cursor_col) = self.cursor_line_col(inner);

        // Keep the cursor line in view
        let scroll = cursor_line.saturating_sub(MAX_VISIBLE_LINES - 1);
        let end = (scroll + MAX_VISIBLE_LINES).min(lines.len() as u16);
        let start = scroll.min(end);
        let visible = lines[start as usize..end as usize].join("\n");

        let title = if self.busy {
            "Message (Esc abandons the reply)"
        } else {
            "Message"
        };
        let block = Block::bordered()
            .border_type(BorderType::Rounded)
            .title(title)
            .padding(ratatui::widgets::Padding::horizontal(1));

        let input = Paragraph::new(visible)
            .block(block)
            .style(Style::default().fg(Color::Green));
        frame.render_widget(input, area);

        let cursor_row = (cursor_line - scroll).min(area.height.saturating_sub(VERTICAL_OVERHEAD + 1));
        frame.set_cursor_position((area.x + 2 + cursor_col, area.y + 1 + cursor_row));
    }
}

impl EventHandler for InputBox {
    type Event = InputEvent;

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::InputChar(c) => {
                self.buffer.insert(self.cursor, *c);
                self.cursor += c.len_utf8();
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Paste(text) => {
                let text = text.replace("\r\n", "\n");
                self.buffer.insert_str(self.cursor, &text);
                self.cursor += text.len();
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Backspace if self.cursor > 0 => {
                let prev = prev_char_boundary(&self.buffer, self.cursor);
                self.buffer.drain(prev..self.cursor);
                self.cursor = prev;
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Delete if self.cursor < self.buffer.len() => {
                let next = next_char_boundary(&self.buffer, self.cursor);
                self.buffer.drain(self.cursor..next);
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::CursorLeft if self.cursor > 0 => {
                self.cursor = prev_char_boundary(&self.buffer, self.cursor);
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::CursorRight if self.cursor < self.buffer.len() => {
                self.cursor = next_char_boundary(&self.buffer, self.cursor);
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::CursorHome => {
                self.cursor = self.buffer[..self.cursor]
                    .rfind('\n')
                    .map(|i| i + 1)
                    .unwrap_or(0);
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::CursorEnd => {
                self.cursor = self.buffer[self.cursor..]
                    .find('\n')
                    .map(|i| self.cursor + i)
                    .unwrap_or(self.buffer.len());
                Some(InputEvent::ContentChanged)
            }
            TuiEvent::Submit if !self.buffer.trim().is_empty() => {
                Some(InputEvent::Submit(self.buffer.clone()))
            }
            _ => None,
        }
    }
}
