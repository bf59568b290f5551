//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use futures::stream;

use crate::api::{ApiError, ByteStream, ChatBackend, SubmitRequest};
use crate::core::message::{ConversationId, ConversationSummary, StoredMessage};

/// A backend that replays a canned response body, or fails every call.
pub struct ScriptedBackend {
    chunks: Vec<Bytes>,
    failure: Option<ApiError>,
}

impl ScriptedBackend {
    pub fn streaming(chunks: &[&str]) -> Self {
        Self {
            chunks: chunks
                .iter()
                .map(|c| Bytes::copy_from_slice(c.as_bytes()))
                .collect(),
            failure: None,
        }
    }

    /// Replays chunks verbatim, including bytes that are not valid UTF-8.
    pub fn raw(chunks: &[&'static [u8]]) -> Self {
        Self {
            chunks: chunks.iter().map(|c| Bytes::from_static(c)).collect(),
            failure: None,
        }
    }

    pub fn failing(error: ApiError) -> Self {
        Self {
            chunks: Vec::new(),
            failure: Some(error),
        }
    }

    fn check(&self) -> Result<(), ApiError> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ChatBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn submit(&self, _request: SubmitRequest<'_>) -> Result<ByteStream, ApiError> {
        self.check()?;
        let chunks: Vec<Result<Bytes, ApiError>> = self.chunks.iter().cloned().map(Ok).collect();
        Ok(stream::iter(chunks).boxed())
    }

    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>, ApiError> {
        self.check()?;
        Ok(Vec::new())
    }

    async fn list_messages(&self, _id: &ConversationId) -> Result<Vec<StoredMessage>, ApiError> {
        self.check()?;
        Ok(Vec::new())
    }
}
