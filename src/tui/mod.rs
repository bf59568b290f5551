//! # TUI Adapter
//!
//! The ratatui-specific layer. Handles terminal I/O, renders the UI,
//! and translates keyboard events into core::Action values.
//!
//! This is the only module that knows about ratatui and crossterm.
//!
//! ## Redraw Strategy
//!
//! - **Generating**: draws every ~80ms so the spinner moves and deltas show
//!   up promptly.
//! - **Idle**: sleeps up to 500ms, only redraws on events, resizes, or
//!   actions arriving from background tasks.
//!
//! A `SteadyBlock` cursor style is used instead of a blinking cursor because
//! ratatui's `set_cursor_position` resets the terminal's blink timer on every
//! `draw()` call, making blinking cursors appear erratic during continuous redraws.

mod component;
mod components;
mod event;
mod ui;

use log::{debug, info};
use std::io::stdout;
use std::sync::{Arc, mpsc};
use std::time::{Duration, Instant};

use crossterm::cursor::{Hide, SetCursorStyle, Show};
use crossterm::event::{
    DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::execute;

use crate::api::{ChatBackend, HttpBackend};
use crate::core::action::{Action, Effect, update};
use crate::core::config::ResolvedConfig;
use crate::core::state::App;
use crate::runtime::Runtime;
use crate::tui::component::EventHandler;
use crate::tui::components::{HistoryPickerState, InputBox, InputEvent, PickerEvent, TranscriptState};
use crate::tui::event::{TuiEvent, poll_event_immediate, poll_event_timeout};

/// TUI-specific presentation state (not part of core business logic)
pub struct TuiState {
    pub transcript: TranscriptState,
    pub input_box: InputBox,
    /// History overlay (None = hidden)
    pub history: Option<HistoryPickerState>,
}

impl Default for TuiState {
    fn default() -> Self {
        Self::new()
    }
}

impl TuiState {
    pub fn new() -> Self {
        Self {
            transcript: TranscriptState::new(),
            input_box: InputBox::new(),
            history: None,
        }
    }
}

struct TerminalModeGuard;

impl TerminalModeGuard {
    fn new() -> std::io::Result<Self> {
        // Kitty keyboard protocol lets us tell Shift+Enter from Enter; terminals
        // without it ignore the request
        execute!(
            stdout(),
            EnableMouseCapture,
            EnableBracketedPaste,
            Show,
            SetCursorStyle::SteadyBlock,
            PushKeyboardEnhancementFlags(
                KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                    | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
            )
        )?;
        info!("Terminal modes enabled (mouse, bracketed paste, keyboard enhancement)");
        Ok(Self)
    }
}

impl Drop for TerminalModeGuard {
    fn drop(&mut self) {
        let _ = execute!(
            stdout(),
            PopKeyboardEnhancementFlags,
            DisableMouseCapture,
            DisableBracketedPaste,
            Hide
        );
    }
}

/// Applies an action and carries out its effect. Returns `true` on quit.
fn dispatch(app: &mut App, tui: &mut TuiState, runtime: &mut Runtime, action: Action) -> bool {
    // Decided before `update` consumes the pending load it checks against
    let replaces_transcript = app.conversation.is_idle()
        && match &action {
            Action::NewConversation => true,
            Action::ConversationLoaded { id, .. } => app.pending_load.as_ref() == Some(id),
            _ => false,
        };
    let effect = update(app, action);
    if matches!(effect, Effect::SpawnTurn(_)) {
        // The submitted text is now part of the transcript
        tui.input_box.clear();
    }
    if replaces_transcript {
        tui.transcript = TranscriptState::new();
    }
    runtime.execute(effect)
}

/// Routes one terminal event. Returns `true` on quit.
fn handle_event(
    app: &mut App,
    tui: &mut TuiState,
    runtime: &mut Runtime,
    event: TuiEvent,
) -> bool {
    match event {
        TuiEvent::Resize => false,
        // Ctrl+C always quits, overlay or not
        TuiEvent::ForceQuit => dispatch(app, tui, runtime, Action::Quit),
        _ if tui.history.is_some() => {
            let Some(picker) = tui.history.as_mut() else {
                return false;
            };
            let Some(picked) = picker.handle_event(&event, &mut app.history) else {
                return false;
            };
            tui.history = None;
            match picked {
                PickerEvent::Open(id) => dispatch(app, tui, runtime, Action::OpenConversation(id)),
                PickerEvent::CreateNew => dispatch(app, tui, runtime, Action::NewConversation),
                PickerEvent::Dismiss => false,
            }
        }
        TuiEvent::OpenHistory => {
            app.history.select(app.conversation.id());
            tui.history = Some(HistoryPickerState::new());
            runtime.execute(Effect::RefreshHistory)
        }
        TuiEvent::NewConversation => dispatch(app, tui, runtime, Action::NewConversation),
        TuiEvent::Escape if app.is_generating() => dispatch(app, tui, runtime, Action::Abandon),
        TuiEvent::Escape => dispatch(app, tui, runtime, Action::DismissError),
        TuiEvent::ScrollUp
        | TuiEvent::ScrollDown
        | TuiEvent::ScrollPageUp
        | TuiEvent::ScrollPageDown
        | TuiEvent::ScrollToBottom => {
            tui.transcript.handle_event(&event);
            false
        }
        _ => match tui.input_box.handle_event(&event) {
            Some(InputEvent::Submit(text)) => dispatch(app, tui, runtime, Action::Submit(text)),
            Some(InputEvent::ContentChanged) | None => false,
        },
    }
}

pub fn run(config: ResolvedConfig) -> std::io::Result<()> {
    let backend: Arc<dyn ChatBackend> =
        Arc::new(HttpBackend::from_config(&config).map_err(std::io::Error::other)?);
    info!("Using backend {} at {}", backend.name(), config.base_url);

    let mut app = App::from_config(&config);
    let mut tui = TuiState::new();

    // Channel for actions from background tasks
    let (tx, rx) = mpsc::channel();
    let mut runtime = Runtime::new(backend, tx);
    runtime.execute(Effect::RefreshHistory);

    let mut terminal = ratatui::init();
    let _terminal_mode_guard = TerminalModeGuard::new();

    let start_time = Instant::now();
    let mut needs_redraw = true;

    'main: loop {
        let animating = app.is_generating();
        if animating {
            needs_redraw = true;
        }

        if needs_redraw {
            let spinner_frame = (start_time.elapsed().as_secs_f32() * 12.0) as usize;
            terminal.draw(|f| ui::draw_ui(f, &app, &mut tui, spinner_frame))?;
            needs_redraw = false;
        }

        let timeout = if animating {
            Duration::from_millis(80)
        } else {
            Duration::from_millis(500)
        };
        let first_event = poll_event_timeout(timeout);
        if first_event.is_some() {
            needs_redraw = true;
        }

        // Process first event + drain all pending events before the next draw
        for event in first_event
            .into_iter()
            .chain(std::iter::from_fn(poll_event_immediate))
        {
            if handle_event(&mut app, &mut tui, &mut runtime, event) {
                break 'main;
            }
        }

        // Actions from background tasks (stream deltas, history, loads)
        while let Ok(action) = rx.try_recv() {
            needs_redraw = true;
            debug!("Event loop received: {:?}", action);
            if dispatch(&mut app, &mut tui, &mut runtime, action) {
                break 'main;
            }
        }
    }

    ratatui::restore();
    Ok(())
}
