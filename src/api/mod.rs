//! # Backend API
//!
//! The seam between Parley and the chat backend. `ChatBackend` is the
//! trait the runtime talks to; `HttpBackend` is the reqwest implementation
//! of the backend's REST + event-stream endpoints.
//!
//! ```text
//! runtime ──► ChatBackend::submit ──► ByteStream ──► stream::consume
//!         ──► ChatBackend::list_conversations / list_messages
//! ```

pub mod auth;
pub mod client;
pub mod types;

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::core::message::{ConversationId, ConversationSummary, Message, StoredMessage};

pub use auth::{FileToken, StaticToken, TokenSource};
pub use client::HttpBackend;

/// Errors that can occur while talking to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No credential, or the backend rejected it (HTTP 401/403).
    Auth(String),
    /// Network-level failure (timeout, DNS, connection refused, reset).
    Network(String),
    /// The backend answered with a non-success status.
    Api { status: u16, message: String },
    /// The backend's response could not be understood.
    Parse(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Auth(msg) => write!(f, "auth error: {msg}"),
            ApiError::Network(msg) => write!(f, "network error: {msg}"),
            ApiError::Api { status, message } => {
                write!(f, "API error (HTTP {status}): {message}")
            }
            ApiError::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for ApiError {}

/// A response body, chunk by chunk, as the network delivers it.
pub type ByteStream = BoxStream<'static, Result<Bytes, ApiError>>;

/// Everything the backend needs to generate the next reply.
pub struct SubmitRequest<'a> {
    pub messages: &'a [Message],
    /// `None` asks the backend to start a new conversation.
    pub conversation_id: Option<&'a ConversationId>,
}

#[async_trait]
pub trait ChatBackend: Send + Sync {
    /// Returns the name of the backend, for logs.
    fn name(&self) -> &str;

    /// Opens a generation and returns its event-stream body once the
    /// response headers arrive.
    async fn submit(&self, request: SubmitRequest<'_>) -> Result<ByteStream, ApiError>;

    /// Conversation summaries, most recent first.
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ApiError>;

    /// Stored messages of one conversation, in whatever order the backend
    /// returns them.
    async fn list_messages(&self, id: &ConversationId) -> Result<Vec<StoredMessage>, ApiError>;
}
