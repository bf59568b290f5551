//! reqwest implementation of [`ChatBackend`].
//!
//! Endpoints, relative to the configured base URL:
//!
//! - `POST chat/completion/`: event-stream body, see `stream`
//! - `GET chats/`: conversation summaries, newest first
//! - `GET chats/{id}/messages/`: stored messages of one conversation
//!
//! Every request carries `Authorization: Bearer <token>`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use log::{debug, info, warn};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::types::{
    CompletionBody, WireStoredMessage, WireSummary, error_message, into_stored_messages,
};
use super::{ApiError, ByteStream, ChatBackend, FileToken, StaticToken, SubmitRequest, TokenSource};
use crate::core::config::ResolvedConfig;
use crate::core::message::{ConversationId, ConversationSummary, StoredMessage};

pub struct HttpBackend {
    base_url: String,
    client: reqwest::Client,
    tokens: Arc<dyn TokenSource>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            tokens,
        }
    }

    /// Like [`HttpBackend::new`] with a bounded connect time. The body of a
    /// generation may legitimately take minutes, so only connecting is timed.
    pub fn with_connect_timeout(
        base_url: impl Into<String>,
        tokens: Arc<dyn TokenSource>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            tokens,
        })
    }

    pub fn from_config(config: &ResolvedConfig) -> Result<Self, ApiError> {
        // A token file, when configured, wins over a fixed token.
        let tokens: Arc<dyn TokenSource> = match &config.token_file {
            Some(path) => Arc::new(FileToken::new(path.clone())),
            None => Arc::new(StaticToken::new(config.token.clone())),
        };
        Self::with_connect_timeout(config.base_url.clone(), tokens, config.request_timeout)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Attaches the bearer token; fails before any I/O when there is none.
    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        let token = self.tokens.token()?;
        Ok(request.bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, ApiError> {
        let response = self
            .authorized(request)?
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let status = response.status();
        debug!("{what}: HTTP {status}");
        if status.is_success() {
            return Ok(response);
        }

        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unknown error".to_string());
        let message = error_message(&body);
        warn!("{what} failed: {status} - {message}");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(ApiError::Auth(format!("HTTP {}: {message}", status.as_u16())))
        } else {
            Err(ApiError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let response = self.send(self.client.get(self.url(path)), path).await?;
        let body = response
            .text()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        serde_json::from_str(&body).map_err(|e| {
            warn!("Unexpected response from {path}: {e}");
            ApiError::Parse(e.to_string())
        })
    }
}

#[async_trait]
impl ChatBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn submit(&self, request: SubmitRequest<'_>) -> Result<ByteStream, ApiError> {
        let body = CompletionBody::new(request.messages, request.conversation_id);
        info!(
            "Completion request: {} messages, chat_id={:?}",
            body.messages.len(),
            request.conversation_id.map(|id| id.as_str())
        );

        let builder = self
            .client
            .post(self.url("chat/completion/"))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .json(&body);
        let response = self.send(builder, "chat/completion/").await?;

        Ok(response
            .bytes_stream()
            .map_err(|e| ApiError::Network(e.to_string()))
            .boxed())
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ApiError> {
        let rows: Vec<WireSummary> = self.get_json("chats/").await?;
        Ok(rows.into_iter().map(ConversationSummary::from).collect())
    }

    async fn list_messages(&self, id: &ConversationId) -> Result<Vec<StoredMessage>, ApiError> {
        let rows: Vec<WireStoredMessage> =
            self.get_json(&format!("chats/{}/messages/", id.as_str())).await?;
        into_stored_messages(rows)
    }
}
