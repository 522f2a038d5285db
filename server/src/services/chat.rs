//! Chat relay service: user message, system prompt, upstream stream,
//! re-framed event stream.
//!
//! DESIGN
//! ======
//! Each request is independent: validate, compose the prompt (profile read
//! fresh), open one upstream stream, and re-emit every non-empty delta as a
//! `data:` line as soon as it arrives. Nothing is buffered or retried.
//!
//! Failures before the first byte become a JSON error response. Once the
//! stream is open an upstream failure can only be signalled by ending the
//! body with an error, so no `[DONE]` line is written in that case.

use axum::response::sse::Event;
use futures::StreamExt;
use futures::stream::BoxStream;
use tracing::{error, info};
use uuid::Uuid;

use frames::{HistoryMessage, RelayRequest, StreamEvent, event_payload};

use crate::config::RelayConfig;
use crate::llm::types::{ChatRequest, DeltaStream, LlmError, Message};
use crate::services::prompt;
use crate::state::AppState;

/// SSE events bound for the client. An `Err` item aborts the body.
pub type RelayStream = BoxStream<'static, Result<Event, LlmError>>;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Message is required")]
    MissingMessage,
    #[error("invalid request body: {0}")]
    InvalidBody(String),
    #[error("LLM not configured")]
    LlmNotConfigured,
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),
}

impl ChatError {
    /// Text returned to the caller. Upstream details stay in the logs.
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::MissingMessage => "Message is required",
            Self::InvalidBody(_) => "Invalid request body",
            Self::LlmNotConfigured | Self::Llm(_) => "Failed to process request",
        }
    }

    /// `true` for caller mistakes (4xx), `false` for relay failures (5xx).
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::MissingMessage | Self::InvalidBody(_))
    }
}

// =============================================================================
// RELAY
// =============================================================================

/// Parse and validate a raw request body.
///
/// # Errors
///
/// Returns [`ChatError::InvalidBody`] for non-JSON bodies and
/// [`ChatError::MissingMessage`] when `message` is absent or blank.
pub fn parse_request(body: &[u8]) -> Result<RelayRequest, ChatError> {
    let request: RelayRequest = serde_json::from_slice(body).map_err(|e| ChatError::InvalidBody(e.to_string()))?;
    if request
        .message
        .as_deref()
        .is_none_or(|m| m.trim().is_empty())
    {
        return Err(ChatError::MissingMessage);
    }
    Ok(request)
}

/// Validate the request, open the upstream stream, and return the encoded
/// event stream.
///
/// # Errors
///
/// Returns a [`ChatError`] when the body is invalid, no LLM is configured,
/// or the upstream rejects the request before streaming.
pub async fn open_relay(state: &AppState, body: &[u8]) -> Result<RelayStream, ChatError> {
    let request = parse_request(body)?;
    let message = request.message.as_deref().unwrap_or_default();
    let locale = request.locale();
    let request_id = Uuid::new_v4();

    info!(
        %request_id,
        language = locale.as_tag(),
        message_len = message.len(),
        history_len = request.messages.len(),
        "chat request accepted"
    );

    let Some(llm) = state.llm.as_ref() else {
        error!(%request_id, "chat request rejected: LLM not configured");
        return Err(ChatError::LlmNotConfigured);
    };

    let config = &state.config;
    let system = prompt::system_prompt(&config.persona, &config.profile_path, locale).await;
    let upstream = build_upstream_request(config, system, message, &request.messages);

    let deltas = llm.stream_chat(&upstream).await.map_err(|e| {
        error!(%request_id, error = %e, "upstream request failed");
        ChatError::Llm(e)
    })?;

    Ok(relay_events(request_id, deltas))
}

/// System turn, optional prior turns, then the user's message.
#[must_use]
pub fn build_upstream_request(
    config: &RelayConfig,
    system: String,
    message: &str,
    history: &[HistoryMessage],
) -> ChatRequest {
    let mut messages = vec![Message::system(system)];
    if config.forward_history {
        messages.extend(history_turns(history, config.history_limit));
    }
    messages.push(Message::user(message));
    ChatRequest { messages, max_tokens: config.max_tokens, temperature: config.temperature }
}

/// Most recent `limit` user/assistant turns with text, oldest first.
fn history_turns(history: &[HistoryMessage], limit: usize) -> Vec<Message> {
    let usable: Vec<Message> = history
        .iter()
        .filter(|m| !m.content.trim().is_empty())
        .filter_map(|m| match m.role.as_str() {
            "user" => Some(Message::user(m.content.as_str())),
            "assistant" => Some(Message::assistant(m.content.as_str())),
            _ => None,
        })
        .collect();
    let skip = usable.len().saturating_sub(limit);
    usable.into_iter().skip(skip).collect()
}

struct RelayState {
    request_id: Uuid,
    deltas: DeltaStream,
    fragments: usize,
}

/// Re-frame upstream deltas as content events, closing with `[DONE]` only
/// when the upstream finished normally.
pub fn relay_events(request_id: Uuid, deltas: DeltaStream) -> RelayStream {
    let state = RelayState { request_id, deltas, fragments: 0 };

    futures::stream::unfold(Some(state), |state| async move {
        let mut st = state?;
        loop {
            match st.deltas.next().await {
                Some(Ok(text)) if text.is_empty() => {}
                Some(Ok(text)) => {
                    st.fragments += 1;
                    return Some((Ok(sse_event(&StreamEvent::Content(text))), Some(st)));
                }
                Some(Err(e)) => {
                    error!(request_id = %st.request_id, fragments = st.fragments, error = %e, "upstream stream failed");
                    return Some((Err(e), None));
                }
                None => {
                    info!(request_id = %st.request_id, fragments = st.fragments, "chat stream complete");
                    return Some((Ok(sse_event(&StreamEvent::Done)), None));
                }
            }
        }
    })
    .boxed()
}

fn sse_event(event: &StreamEvent) -> Event {
    Event::default().data(event_payload(event))
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
