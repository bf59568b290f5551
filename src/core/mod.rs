//! # Core Application Logic
//!
//! This module contains Parley's business logic.
//! It knows nothing about any specific UI technology or transport.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • Conversation (FSM)   │
//!                    │  • History (summaries)  │
//!                    │  • State (app data)     │
//!                    │  • Action (events)      │
//!                    │  • update() (reducer)   │
//!                    │                         │
//!                    │  No network. No UI.     │
//!                    └───────────┬─────────────┘
//!                                │
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!     ┌────────────┐      ┌────────────┐      ┌────────────┐
//!     │    TUI     │      │  Runtime   │      │  Stream    │
//!     │  Adapter   │      │  (tokio    │      │  consumer  │
//!     │ (ratatui)  │      │   tasks)   │      │            │
//!     └────────────┘      └────────────┘      └────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`message`]: Transcript messages, conversation ids, history entries
//! - [`conversation`]: The conversation state machine
//! - [`history`]: The conversation summary cache
//! - [`state`]: The `App` struct, all application state in one place
//! - [`action`]: The `Action` enum and `update()`
//! - [`config`]: Settings with defaults → file → env → CLI layering

pub mod action;
pub mod config;
pub mod conversation;
pub mod history;
pub mod message;
pub mod state;
