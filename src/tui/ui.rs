use crate::core::state::App;
use crate::tui::TuiState;
use crate::tui::component::Component;
use crate::tui::components::{HistoryPicker, TitleBar, Transcript};

use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::widgets::{Block, Paragraph, Wrap};

/// Height of the error banner shown above the input while `app.error` is set.
const ERROR_HEIGHT: u16 = 4;

pub fn draw_ui(frame: &mut Frame, app: &App, tui: &mut TuiState, spinner_frame: usize) {
    use Constraint::{Length, Min};

    let input_height = tui.input_box.calculate_height(frame.area().width);
    let error_height = if app.error.is_some() { ERROR_HEIGHT } else { 0 };
    let [title_area, main_area, error_area, input_area] = Layout::vertical([
        Length(1),
        Min(0),
        Length(error_height),
        Length(input_height),
    ])
    .areas(frame.area());

    let draft = app
        .conversation
        .active_turn()
        .map(|_| app.conversation.draft());
    Transcript {
        messages: app.conversation.transcript(),
        draft,
        state: &mut tui.transcript,
    }
    .render(frame, main_area);

    if let Some(error) = &app.error {
        draw_error(frame, error_area, error);
    }

    TitleBar {
        conversation: app.conversation.id().map(|id| id.to_string()),
        status_message: app.status_message.clone(),
        has_unseen_content: tui.transcript.has_unseen_content,
        spinner_frame: app.is_generating().then_some(spinner_frame),
        auth_required: app.auth_required,
    }
    .render(frame, title_area);

    tui.input_box.busy = app.is_generating();
    tui.input_box.render(frame, input_area);

    if let Some(picker) = tui.history.as_mut() {
        HistoryPicker {
            history: &app.history,
            current: app.conversation.id(),
            state: picker,
        }
        .render(frame, frame.area());
    }
}

fn draw_error(frame: &mut Frame, area: Rect, error: &str) {
    let paragraph = Paragraph::new(error)
        .block(Block::bordered().title("Error (Esc to dismiss)"))
        .style(Style::default().fg(Color::Red))
        .wrap(Wrap { trim: true });
    frame.render_widget(paragraph, area);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::action::{Action, update};
    use crate::core::conversation::TurnError;
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;

    fn screen(app: &App, tui: &mut TuiState) -> String {
        let backend = TestBackend::new(60, 20);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| draw_ui(f, app, tui, 0)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect()
    }

    #[test]
    fn test_streaming_turn_renders_draft_and_spinner() {
        let mut app = App::new(false);
        update(&mut app, Action::Submit("hello".to_string()));
        update(&mut app, Action::StreamOpened { turn: 1 });
        update(
            &mut app,
            Action::Delta {
                turn: 1,
                text: "Hi the".to_string(),
            },
        );

        let text = screen(&app, &mut TuiState::new());
        assert!(text.contains("hello"));
        assert!(text.contains("Hi the"));
        assert!(text.contains("Generating..."));
        assert!(text.contains("Esc abandons"));
    }

    #[test]
    fn test_error_banner() {
        let mut app = App::new(false);
        update(&mut app, Action::Submit("hello".to_string()));
        update(
            &mut app,
            Action::Fail {
                turn: 1,
                error: TurnError::Transport("connection refused".to_string()),
            },
        );

        let text = screen(&app, &mut TuiState::new());
        assert!(text.contains("connection refused"));
        assert!(text.contains("Esc to dismiss"));
    }

    #[test]
    fn test_history_overlay() {
        let app = App::new(false);
        let mut tui = TuiState::new();
        tui.history = Some(Default::default());
        assert!(screen(&app, &mut tui).contains("No conversations yet."));
    }
}
