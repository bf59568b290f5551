//! # Response Stream Consumer
//!
//! Pulls a chat response body apart in three stages and hands the results
//! to the caller in parse order:
//!
//! ```text
//! bytes ──► decoder::lines ──► event::parse_line ──► DeltaReducer ──► emit(StreamChunk)
//!          (line framing)      (data:/[DONE])       (JSON, id once)
//! ```
//!
//! [`consume`] is a sequential pull loop: each `.await` suspends until the
//! next chunk or the end of the body, and no two chunks are processed in
//! parallel.

pub mod decoder;
pub mod event;
pub mod reducer;

use std::fmt;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use log::{debug, info, warn};

use crate::core::message::ConversationId;
use decoder::DecodeError;
use reducer::{DeltaReducer, Frame};

/// What the consumer forwards to the state machine, one per frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamChunk {
    Content(String),
    ConversationId(ConversationId),
}

/// How a stream that did not fail ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The terminal sentinel was seen.
    Completed,
    /// The body ended (or became undecodable) before the sentinel.
    Truncated(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// Reading the body failed.
    Transport(String),
    /// The backend sent an in-band error payload.
    Server(String),
    /// The receiver of emitted chunks went away.
    ChannelClosed,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Transport(msg) => write!(f, "stream interrupted: {msg}"),
            StreamError::Server(msg) => write!(f, "server error: {msg}"),
            StreamError::ChannelClosed => write!(f, "channel closed"),
        }
    }
}

impl std::error::Error for StreamError {}

/// Consumes a response body until the sentinel, the end of the body, or an
/// error. `emit` returns `false` when nobody is listening any more.
///
/// Anything after the sentinel is never read.
pub async fn consume<S, E, F>(
    source: S,
    id_already_bound: bool,
    mut emit: F,
) -> Result<StreamOutcome, StreamError>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin + Send + 'static,
    E: fmt::Display + Send + 'static,
    F: FnMut(StreamChunk) -> bool,
{
    let mut lines = decoder::lines(source);
    let mut reducer = DeltaReducer::new(id_already_bound);
    let mut line_count = 0usize;
    let mut content_len = 0usize;

    while let Some(line) = lines.next().await {
        let line = match line {
            Ok(line) => line,
            Err(DecodeError::Transport(msg)) => {
                warn!("Stream failed after {line_count} lines: {msg}");
                return Err(StreamError::Transport(msg));
            }
            Err(e @ DecodeError::InvalidUtf8 { .. }) => {
                warn!("Treating undecodable stream as ended: {e}");
                return Ok(StreamOutcome::Truncated(e.to_string()));
            }
        };
        line_count += 1;

        if !line.is_empty() {
            debug!("SSE line: {line}");
        }

        for frame in reducer.reduce_event(event::parse_line(&line)) {
            let chunk = match frame {
                Frame::Done => {
                    info!(
                        "Stream complete: {} lines, {} deltas, {} content bytes, {} malformed",
                        line_count,
                        reducer.delta_count(),
                        content_len,
                        reducer.malformed_count()
                    );
                    return Ok(StreamOutcome::Completed);
                }
                Frame::ServerError(message) => return Err(StreamError::Server(message)),
                Frame::Content(text) => {
                    content_len += text.len();
                    StreamChunk::Content(text)
                }
                Frame::IdAssignment(id) => StreamChunk::ConversationId(id),
            };

            if !emit(chunk) {
                warn!("Chunk emit failed: receiver dropped");
                return Err(StreamError::ChannelClosed);
            }
        }
    }

    info!(
        "Stream ended without sentinel: {} lines, {} deltas",
        line_count,
        reducer.delta_count()
    );
    Ok(StreamOutcome::Truncated(
        "response ended before the terminal marker".to_string(),
    ))
}
