//! # Frame Decoder
//!
//! Turns a sequence of raw byte chunks into complete text lines.
//!
//! ```text
//! chunks:  "data: {\"con"  "tent\":\"Hi\"}\nda"  "ta: [DONE]\n"
//!                 │                │                  │
//!                 ▼                ▼                  ▼
//! buffer:  data: {"con   →  (line emitted) da  →  (line emitted)
//! lines:                    data: {"content":"Hi"}    data: [DONE]
//! ```
//!
//! A chunk boundary never implies a line boundary. Bytes are buffered and
//! only decoded as UTF-8 once a whole line is available, so multi-byte
//! characters split across chunks come out intact.

use std::fmt;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};
use log::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The byte source failed mid-read. Anything still buffered is discarded.
    Transport(String),
    /// A complete line was not valid UTF-8 (1-based line number).
    InvalidUtf8 { line: usize },
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Transport(msg) => write!(f, "transport error: {msg}"),
            DecodeError::InvalidUtf8 { line } => write!(f, "line {line} is not valid UTF-8"),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Incremental line splitter with a single carry-over buffer.
///
/// `scanned` marks how much of the buffer is known to hold no `\n`, so a
/// long line arriving in many chunks is searched once, not once per chunk.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: BytesMut,
    scanned: usize,
    lines_decoded: usize,
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a chunk. Call `next_line` until it returns `None` to drain it.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Pops the next complete line, without its `\n` or `\r\n` terminator.
    pub fn next_line(&mut self) -> Option<Result<String, DecodeError>> {
        let Some(offset) = self.buffer[self.scanned..].iter().position(|&b| b == b'\n') else {
            self.scanned = self.buffer.len();
            return None;
        };
        let end = self.scanned + offset;
        self.scanned = 0;
        let line = self.buffer.split_to(end + 1);
        Some(self.decode(&line[..end]))
    }

    /// Flushes whatever is left as a final, unterminated line.
    pub fn finish(&mut self) -> Option<Result<String, DecodeError>> {
        if self.buffer.is_empty() {
            return None;
        }
        self.scanned = 0;
        let rest = self.buffer.split();
        Some(self.decode(&rest))
    }

    /// Drops buffered bytes, returning how many were thrown away.
    pub fn discard(&mut self) -> usize {
        let dropped = self.buffer.len();
        self.buffer.clear();
        self.scanned = 0;
        dropped
    }

    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    fn decode(&mut self, raw: &[u8]) -> Result<String, DecodeError> {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        self.lines_decoded += 1;
        std::str::from_utf8(raw)
            .map(str::to_owned)
            .map_err(|_| DecodeError::InvalidUtf8 {
                line: self.lines_decoded,
            })
    }
}

struct LineState<S> {
    source: S,
    decoder: LineDecoder,
    finished: bool,
}

/// Adapts a byte-chunk stream into a lazy stream of lines.
///
/// Each pull suspends until a full line is available or the source ends.
/// The sequence stops after the first error.
pub fn lines<S, E>(source: S) -> Pin<Box<dyn Stream<Item = Result<String, DecodeError>> + Send>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let state = LineState {
        source,
        decoder: LineDecoder::new(),
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if state.finished {
                return None;
            }

            if let Some(line) = state.decoder.next_line() {
                state.finished = line.is_err();
                return Some((line, state));
            }

            match state.source.next().await {
                Some(Ok(chunk)) => {
                    debug!("Raw chunk received: {} bytes", chunk.len());
                    state.decoder.push(&chunk);
                }
                Some(Err(e)) => {
                    let dropped = state.decoder.discard();
                    warn!("Stream read failed ({e}), discarding {dropped} buffered bytes");
                    state.finished = true;
                    return Some((Err(DecodeError::Transport(e.to_string())), state));
                }
                None => {
                    state.finished = true;
                    if state.decoder.buffered_len() > 0 {
                        debug!(
                            "Source ended with {} unterminated bytes, flushing as final line",
                            state.decoder.buffered_len()
                        );
                    }
                    return state.decoder.finish().map(|line| (line, state));
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    const WELL_FORMED: &str = "data: {\"content\":\"Hi\"}\n\ndata: {\"content\":\" th\u{e9}re\"}\r\n\ndata: {\"chatId\":\"c1\"}\n\ndata: [DONE]\n";

    fn chunked(parts: &[&[u8]]) -> stream::Iter<std::vec::IntoIter<Result<Bytes, Infallible>>> {
        let owned: Vec<Result<Bytes, Infallible>> =
            parts.iter().map(|p| Ok(Bytes::copy_from_slice(p))).collect();
        stream::iter(owned)
    }

    fn collect_lines(parts: &[&[u8]]) -> Vec<Result<String, DecodeError>> {
        tokio_test::block_on(lines(chunked(parts)).collect::<Vec<_>>())
    }

    fn ok_lines(parts: &[&[u8]]) -> Vec<String> {
        collect_lines(parts)
            .into_iter()
            .map(|line| line.expect("well-formed stream"))
            .collect()
    }

    #[test]
    fn test_decoder_splits_complete_lines() {
        let mut decoder = LineDecoder::new();
        decoder.push(b"one\ntwo\r\nthr");
        assert_eq!(decoder.next_line(), Some(Ok("one".to_string())));
        assert_eq!(decoder.next_line(), Some(Ok("two".to_string())));
        assert_eq!(decoder.next_line(), None);
        assert_eq!(decoder.buffered_len(), 3);

        decoder.push(b"ee\n");
        assert_eq!(decoder.next_line(), Some(Ok("three".to_string())));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_long_line_across_many_chunks_decodes_once() {
        let mut decoder = LineDecoder::new();
        let piece = "a".repeat(1024);
        for _ in 0..256 {
            decoder.push(piece.as_bytes());
            assert_eq!(decoder.next_line(), None);
            // Already searched bytes are not searched again
            assert_eq!(decoder.scanned, decoder.buffered_len());
        }
        decoder.push(b"\r\nnext");

        let line = decoder.next_line().expect("line complete").expect("valid utf-8");
        assert_eq!(line.len(), 256 * 1024);
        assert_eq!(decoder.scanned, 0);
        assert_eq!(decoder.buffered_len(), 4);
        assert_eq!(decoder.next_line(), None);
        assert_eq!(decoder.finish(), Some(Ok("next".to_string())));
    }

    #[test]
    fn test_decoder_flushes_unterminated_tail() {
        let mut decoder = LineDecoder::new();
        decoder.push(b"data: [DONE]");
        assert_eq!(decoder.next_line(), None);
        assert_eq!(decoder.finish(), Some(Ok("data: [DONE]".to_string())));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_every_two_and_three_way_split_yields_same_lines() {
        let bytes = WELL_FORMED.as_bytes();
        let expected = ok_lines(&[bytes]);
        assert_eq!(expected.len(), 7);

        for i in 0..=bytes.len() {
            assert_eq!(ok_lines(&[&bytes[..i], &bytes[i..]]), expected, "split at {i}");
            for j in i..=bytes.len() {
                assert_eq!(
                    ok_lines(&[&bytes[..i], &bytes[i..j], &bytes[j..]]),
                    expected,
                    "split at {i}/{j}"
                );
            }
        }
    }

    #[test]
    fn test_byte_at_a_time_matches_whole_stream() {
        let bytes = WELL_FORMED.as_bytes();
        let singles: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(ok_lines(&singles), ok_lines(&[bytes]));
    }

    #[test]
    fn test_multibyte_char_split_across_chunks() {
        let text = "data: caf\u{e9}\n".as_bytes();
        // The é is two bytes; cut between them.
        let cut = text.len() - 2;
        assert_eq!(ok_lines(&[&text[..cut], &text[cut..]]), vec!["data: caf\u{e9}"]);
    }

    #[test]
    fn test_read_error_ends_sequence_and_discards_partial_line() {
        let source = stream::iter(vec![
            Ok(Bytes::from_static(b"data: first\ndata: par")),
            Err("connection reset"),
            Ok(Bytes::from_static(b"tial\n")),
        ]);
        let lines: Vec<_> = tokio_test::block_on(lines(source).collect());
        assert_eq!(
            lines,
            vec![
                Ok("data: first".to_string()),
                Err(DecodeError::Transport("connection reset".to_string())),
            ]
        );
    }

    #[test]
    fn test_invalid_utf8_ends_sequence() {
        let lines = collect_lines(&[b"ok\n\xff\xfe\nnever\n"]);
        assert_eq!(
            lines,
            vec![Ok("ok".to_string()), Err(DecodeError::InvalidUtf8 { line: 2 })]
        );
    }

    #[test]
    fn test_empty_source_yields_nothing() {
        assert!(collect_lines(&[]).is_empty());
    }
}
