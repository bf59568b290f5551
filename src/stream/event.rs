//! # Event Parser
//!
//! Classifies one decoded line of the event stream. JSON is left untouched
//! here so malformed payloads are handled in exactly one place (the reducer).

/// Marker every data line starts with. The space after the colon is optional.
pub const DATA_PREFIX: &str = "data:";

/// Terminal payload marking the end of a generation.
pub const SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event<'a> {
    /// Blank line, comment, or a field we don't interpret (`event:`, `id:`, `retry:`).
    Ignore,
    /// Prefix-stripped, trimmed payload; candidate JSON.
    Payload(&'a str),
    Sentinel,
}

pub fn parse_line(line: &str) -> Event<'_> {
    if line.trim().is_empty() {
        return Event::Ignore;
    }

    let Some(rest) = line.strip_prefix(DATA_PREFIX) else {
        return Event::Ignore;
    };

    match rest.trim() {
        "" => Event::Ignore,
        SENTINEL => Event::Sentinel,
        payload => Event::Payload(payload),
    }
}
