//! # TUI Components
//!
//! UI components for the terminal interface. Two patterns:
//!
//! ### Stateless Components (Props-Based Rendering)
//!
//! Receive all data as struct fields, built fresh each frame:
//! - `TitleBar`: conversation id, status, spinner, auth hint
//!
//! ### Stateful Components (Event-Driven)
//!
//! Keep local presentation state in `TuiState` and emit events:
//! - `InputBox`: multi-line text input
//! - `Transcript`: scrollable committed messages plus the live draft
//! - `HistoryPicker`: conversation list overlay
//!
//! Components receive external data as "props", never by reaching into
//! `App` themselves. Each file holds the state, event, rendering and tests
//! for one component.
//!
//! ```text
//! components/
//! ├── mod.rs            (this file)
//! ├── title_bar.rs      (top status bar)
//! ├── transcript.rs     (message view)
//! ├── input_box.rs      (text input)
//! └── history_picker.rs (Ctrl+O overlay)
//! ```

mod title_bar;
pub use title_bar::TitleBar;

pub mod history_picker;
pub mod input_box;
pub mod transcript;
pub use history_picker::{HistoryPicker, HistoryPickerState, PickerEvent};
pub use input_box::{InputBox, InputEvent};
pub use transcript::{Transcript, TranscriptState};
