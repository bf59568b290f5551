//! # Transcript Component
//!
//! Scrollable view of the committed messages plus the live draft.
//!
//! Follows the persistent state + transient wrapper pattern:
//! - `TranscriptState` lives in `TuiState` (scroll offset, stick-to-bottom)
//! - `Transcript` is created each frame with borrowed props and state
//!
//! While `stick_to_bottom` is set, every frame scrolls to the end so
//! streaming deltas stay in view. Scrolling up detaches; scrolling back to
//! the end (or End) re-attaches.

use std::ops::Range;

use ratatui::Frame;
use ratatui::layout::{Alignment, Position, Rect, Size};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Paragraph, Wrap};
use tui_scrollview::{ScrollView, ScrollViewState, ScrollbarVisibility};

use crate::core::message::{Message, Role};
use crate::tui::component::{Component, EventHandler};
use crate::tui::event::TuiEvent;

pub struct TranscriptState {
    pub scroll_state: ScrollViewState,
    pub stick_to_bottom: bool,
    pub has_unseen_content: bool,
    layout: LayoutCache,
    content_height: u16,
    viewport_height: u16,
}

impl Default for TranscriptState {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptState {
    pub fn new() -> Self {
        Self {
            scroll_state: ScrollViewState::default(),
            stick_to_bottom: true,
            has_unseen_content: false,
            layout: LayoutCache::default(),
            content_height: 0,
            viewport_height: 0,
        }
    }

    fn max_offset(&self) -> u16 {
        self.content_height.saturating_sub(self.viewport_height)
    }

    /// Re-attach when the user has scrolled all the way down.
    fn repin_if_at_bottom(&mut self) {
        let current = self.scroll_state.offset();
        if current.y >= self.max_offset() {
            self.stick_to_bottom = true;
            self.scroll_state.set_offset(Position {
                x: current.x,
                y: self.max_offset(),
            });
        }
    }
}

impl EventHandler for TranscriptState {
    type Event = ();

    fn handle_event(&mut self, event: &TuiEvent) -> Option<Self::Event> {
        match event {
            TuiEvent::ScrollUp => {
                self.scroll_state.scroll_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollDown => {
                self.scroll_state.scroll_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollPageUp => {
                self.scroll_state.scroll_page_up();
                self.stick_to_bottom = false;
            }
            TuiEvent::ScrollPageDown => {
                self.scroll_state.scroll_page_down();
                self.repin_if_at_bottom();
            }
            TuiEvent::ScrollToBottom => {
                self.stick_to_bottom = true;
            }
            _ => return None,
        }
        Some(())
    }
}

/// Bubble heights of committed messages, measured once per message and width.
///
/// Committed messages never change, so a height stays valid for as long as
/// the message at that index has the same id. Heights and offsets saturate
/// at `u16::MAX`, the tallest canvas the scroll view can hold.
#[derive(Debug, Default)]
struct LayoutCache {
    ids: Vec<String>,
    heights: Vec<u16>,
    prefix_heights: Vec<u16>,
    content_width: u16,
}

impl LayoutCache {
    /// Number of leading heights still valid for `messages` at `content_width`.
    fn reusable_count(&self, messages: &[Message], content_width: u16) -> usize {
        if self.content_width != content_width {
            return 0;
        }
        self.ids
            .iter()
            .zip(messages)
            .take_while(|(id, message)| **id == message.id)
            .count()
    }

    fn update(&mut self, messages: &[Message], content_width: u16) {
        let reusable = self.reusable_count(messages, content_width);
        self.ids.truncate(reusable);
        self.heights.truncate(reusable);
        for message in &messages[reusable..] {
            self.ids.push(message.id.clone());
            self.heights.push(bubble_height(&committed_bubble(message), content_width));
        }
        self.content_width = content_width;
        self.prefix_heights = self
            .heights
            .iter()
            .scan(0u16, |acc, &h| {
                *acc = acc.saturating_add(h);
                Some(*acc)
            })
            .collect();
    }

    fn total_height(&self) -> u16 {
        self.prefix_heights.last().copied().unwrap_or(0)
    }

    /// Messages overlapping the viewport, padded by half a screen each way.
    fn visible_range(&self, scroll_offset: u16, viewport_height: u16) -> Range<usize> {
        let buffer = viewport_height / 2;
        let buffered_start = scroll_offset.saturating_sub(buffer);
        let buffered_end = scroll_offset
            .saturating_add(viewport_height)
            .saturating_add(buffer);

        let start = self
            .prefix_heights
            .partition_point(|&end| end <= buffered_start);
        let end = self
            .prefix_heights
            .partition_point(|&end| end < buffered_end)
            .saturating_add(1)
            .min(self.prefix_heights.len());
        start..end.max(start)
    }
}

pub struct Transcript<'a> {
    pub messages: &'a [Message],
    /// Present while a turn is active, even if nothing has arrived yet.
    pub draft: Option<&'a str>,
    pub state: &'a mut TranscriptState,
}

fn role_style(role: Role) -> Style {
    match role {
        Role::User => Style::default().fg(Color::Cyan),
        Role::Assistant => Style::default().fg(Color::Green),
    }
}

fn bubble<'a>(title: &'a str, content: &'a str, style: Style) -> Paragraph<'a> {
    Paragraph::new(content)
        .block(
            Block::bordered()
                .title(title)
                .border_style(style.add_modifier(Modifier::DIM))
                .title_style(style),
        )
        .style(style)
        .wrap(Wrap { trim: false })
}

fn committed_bubble(message: &Message) -> Paragraph<'_> {
    bubble(
        message.role.label(),
        message.content.trim(),
        role_style(message.role),
    )
}

fn bubble_height(paragraph: &Paragraph, width: u16) -> u16 {
    u16::try_from(paragraph.line_count(width)).unwrap_or(u16::MAX)
}

impl Component for Transcript<'_> {
    fn render(&mut self, frame: &mut Frame, area: Rect) {
        if self.messages.is_empty() && self.draft.is_none() {
            let hint = Paragraph::new(
                "Type a message and press Enter.\nCtrl+O history  Ctrl+N new conversation  Ctrl+C quit",
            )
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
            let top = area.height / 2;
            frame.render_widget(
                hint,
                Rect::new(area.x, area.y + top.saturating_sub(1), area.width, 2.min(area.height)),
            );
            self.state.has_unseen_content = false;
            return;
        }

        // One column for the scrollbar
        let content_width = area.width.saturating_sub(1);

        let layout = &mut self.state.layout;
        layout.update(self.messages, content_width);
        let committed_height = layout.total_height();

        // The draft grows with every delta, so it is measured each frame
        let draft = self.draft.map(|draft| {
            let shown = if draft.is_empty() { "..." } else { draft };
            let paragraph = bubble(
                "assistant (typing)",
                shown,
                role_style(Role::Assistant).add_modifier(Modifier::ITALIC),
            );
            let height = bubble_height(&paragraph, content_width);
            (paragraph, height)
        });
        let draft_height = draft.as_ref().map(|(_, h)| *h).unwrap_or(0);

        self.state.content_height = committed_height.saturating_add(draft_height);
        self.state.viewport_height = area.height;

        if self.state.stick_to_bottom {
            let bottom = self.state.max_offset();
            self.state.scroll_state.set_offset(Position { x: 0, y: bottom });
        }

        let scroll_offset = self.state.scroll_state.offset().y;
        let layout = &self.state.layout;
        let visible = layout.visible_range(scroll_offset, area.height);

        let mut scroll_view = ScrollView::new(Size::new(content_width, self.state.content_height))
            .vertical_scrollbar_visibility(ScrollbarVisibility::Automatic)
            .horizontal_scrollbar_visibility(ScrollbarVisibility::Never);

        let mut y_offset = match visible.start {
            0 => 0,
            start => layout.prefix_heights[start - 1],
        };
        for i in visible {
            let height = layout.heights[i];
            scroll_view.render_widget(
                committed_bubble(&self.messages[i]),
                Rect::new(0, y_offset, content_width, height),
            );
            y_offset = y_offset.saturating_add(height);
        }

        if let Some((paragraph, height)) = draft {
            scroll_view.render_widget(
                paragraph,
                Rect::new(0, committed_height, content_width, height),
            );
        }

        frame.render_stateful_widget(scroll_view, area, &mut self.state.scroll_state);

        let current_offset = self.state.scroll_state.offset().y;
        self.state.has_unseen_content = current_offset < self.state.max_offset();
    }
}
