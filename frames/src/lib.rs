//! Shared wire model for the résumé chat relay.
//!
//! This crate owns the representation used by both `server` and `client`:
//! the relay request body, the error body, and the `data:` line framing of
//! the event stream. It also carries the incremental decoders used on both
//! sides of the relay, since the upstream completion API speaks the same
//! line protocol the relay re-emits.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix of every payload line in the event stream.
pub const DATA_PREFIX: &str = "data:";

/// Payload of the terminal sentinel line.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Error returned by [`decode_line`].
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The payload after `data:` was not valid JSON.
    #[error("malformed event payload: {0}")]
    Json(#[from] serde_json::Error),
}

// =============================================================================
// LOCALE
// =============================================================================

/// The two locales the chat understands. English is the default.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Locale {
    #[default]
    En,
    Ja,
}

impl Locale {
    /// Resolve a language tag. Anything other than `ja` falls back to English.
    #[must_use]
    pub fn from_tag(tag: Option<&str>) -> Self {
        match tag.map(str::trim) {
            Some("ja") => Self::Ja,
            _ => Self::En,
        }
    }

    /// Two-letter tag sent on the wire and persisted by clients.
    #[must_use]
    pub fn as_tag(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Ja => "ja",
        }
    }
}

// =============================================================================
// REQUEST / RESPONSE BODIES
// =============================================================================

/// One prior turn carried in [`RelayRequest::messages`].
///
/// `role` stays a plain string so unknown roles from older clients do not
/// reject the whole request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Body of `POST /api/chat`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<HistoryMessage>,
}

impl RelayRequest {
    /// Language tag resolved to a [`Locale`].
    #[must_use]
    pub fn locale(&self) -> Locale {
        Locale::from_tag(self.language.as_deref())
    }
}

/// JSON body of every non-streaming failure response.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// =============================================================================
// STREAM EVENTS
// =============================================================================

/// A single event in the relay's response stream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamEvent {
    /// A text fragment to append to the in-progress reply.
    Content(String),
    /// No further events follow.
    Done,
}

/// The `data:` payload carrying `event`. The server wraps it in an SSE
/// event; the payload itself never contains a raw newline.
#[must_use]
pub fn event_payload(event: &StreamEvent) -> String {
    match event {
        StreamEvent::Content(text) => serde_json::json!({ "content": text }).to_string(),
        StreamEvent::Done => DONE_SENTINEL.to_owned(),
    }
}

/// Return the payload of a `data:` line, or `None` for any other line
/// (blank separators, comments, `event:` fields).
#[must_use]
pub fn data_payload(line: &str) -> Option<&str> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let rest = line.strip_prefix(DATA_PREFIX)?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Decode one complete line of the relay stream.
///
/// Returns `Ok(None)` for lines that carry no event: non-data lines, JSON
/// objects without a string `content`, and empty fragments.
///
/// # Errors
///
/// Returns [`CodecError::Json`] when a data line's payload is not JSON.
pub fn decode_line(line: &str) -> Result<Option<StreamEvent>, CodecError> {
    let Some(payload) = data_payload(line) else {
        return Ok(None);
    };
    if payload.trim() == DONE_SENTINEL {
        return Ok(Some(StreamEvent::Done));
    }

    let value: Value = serde_json::from_str(payload)?;
    Ok(value
        .get("content")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(|text| StreamEvent::Content(text.to_owned())))
}

// =============================================================================
// INCREMENTAL DECODERS
// =============================================================================

/// Splits a byte stream into complete lines, buffering partial lines across
/// reads.
///
/// Splitting happens on raw bytes before UTF-8 decoding, so a multi-byte
/// character cut across two reads is reassembled intact.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read and return every line it completed, without the
    /// trailing newline.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            lines.push(String::from_utf8_lossy(&self.buffer[start..end]).into_owned());
            start = end + 1;
        }
        self.buffer.drain(..start);
        lines
    }

    /// Flush the unterminated tail left after the stream ended.
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let tail = String::from_utf8_lossy(&self.buffer).into_owned();
        self.buffer.clear();
        Some(tail)
    }

    /// Bytes held back waiting for a newline.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

/// Turns relay stream bytes into [`StreamEvent`]s.
///
/// Malformed data lines are dropped and counted; they never stop decoding.
#[derive(Debug, Default)]
pub struct EventDecoder {
    lines: LineDecoder,
    dropped: usize,
}

impl EventDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one read and return the events it completed, in order.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let lines = self.lines.push(chunk);
        lines
            .iter()
            .filter_map(|line| self.decode(line))
            .collect()
    }

    /// Decode whatever unterminated line remains once the stream has ended.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        let tail = self.lines.finish()?;
        self.decode(&tail)
    }

    /// Number of malformed data lines skipped so far.
    #[must_use]
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn decode(&mut self, line: &str) -> Option<StreamEvent> {
        match decode_line(line) {
            Ok(event) => event,
            Err(_) => {
                self.dropped += 1;
                None
            }
        }
    }
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
