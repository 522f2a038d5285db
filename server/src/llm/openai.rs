//! OpenAI-compatible streaming chat-completions client.
//!
//! Serves both Azure `OpenAI` deployments and plain `OpenAI`-compatible base
//! URLs; the two differ only in URL shape and auth header. Responses are
//! read as a `data:` line stream and reduced to ordered text deltas.

use std::collections::VecDeque;
use std::fmt::Display;
use std::time::Duration;

use frames::{DONE_SENTINEL, LineDecoder, data_payload};
use futures::{Stream, StreamExt};
use serde::Serialize;
use serde_json::Value;

use super::config::{LlmTimeouts, UpstreamEndpoint};
use super::types::{ChatRequest, DeltaStream, LlmError, Message};

pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: UpstreamEndpoint,
}

impl OpenAiClient {
    /// Build a client with connect and total-request deadlines.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::HttpClientBuild`] if the HTTP client fails to build.
    pub fn new(api_key: String, endpoint: UpstreamEndpoint, timeouts: LlmTimeouts) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| LlmError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, api_key, endpoint })
    }

    /// Open a streaming completion and return its text deltas.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError::ApiRequest`] when the request cannot be sent and
    /// [`LlmError::ApiResponse`] when the provider answers with a non-2xx status.
    pub async fn stream_chat(&self, model: &str, request: &ChatRequest) -> Result<DeltaStream, LlmError> {
        let body = CcRequest {
            model,
            messages: &request.messages,
            stream: true,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let builder = self.http.post(completions_url(&self.endpoint)).json(&body);
        let builder = match &self.endpoint {
            UpstreamEndpoint::Azure { .. } => builder.header("api-key", &self.api_key),
            UpstreamEndpoint::OpenAi { .. } => builder.bearer_auth(&self.api_key),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| LlmError::ApiRequest(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ApiResponse { status: status.as_u16(), body: text });
        }

        Ok(delta_stream(response.bytes_stream()))
    }
}

pub(crate) fn completions_url(endpoint: &UpstreamEndpoint) -> String {
    match endpoint {
        UpstreamEndpoint::Azure { endpoint, deployment, api_version } => {
            format!("{endpoint}/openai/deployments/{deployment}/chat/completions?api-version={api_version}")
        }
        UpstreamEndpoint::OpenAi { base_url } => format!("{base_url}/chat/completions"),
    }
}

// =============================================================================
// CHAT COMPLETIONS WIRE TYPES
// =============================================================================

#[derive(Serialize)]
pub(crate) struct CcRequest<'a> {
    pub(crate) model: &'a str,
    pub(crate) messages: &'a [Message],
    pub(crate) stream: bool,
    pub(crate) temperature: f32,
    pub(crate) max_tokens: u32,
}

// =============================================================================
// STREAM PARSING
// =============================================================================

/// What a single upstream line contributes.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum StreamLine {
    Delta(String),
    Done,
    Skip,
}

/// Interpret one line of the upstream stream.
///
/// Chunks without text (role announcements, content-filter results, empty
/// `choices`) are skipped. An `error` object inside the stream is fatal.
pub(crate) fn parse_stream_line(line: &str) -> Result<StreamLine, LlmError> {
    let Some(payload) = data_payload(line) else {
        return Ok(StreamLine::Skip);
    };
    let payload = payload.trim();
    if payload.is_empty() {
        return Ok(StreamLine::Skip);
    }
    if payload == DONE_SENTINEL {
        return Ok(StreamLine::Done);
    }

    let root: Value = serde_json::from_str(payload).map_err(|e| LlmError::ApiParse(e.to_string()))?;
    if let Some(error) = root.get("error") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| error.to_string(), str::to_owned);
        return Err(LlmError::ApiStream(message));
    }

    let text = root
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)
        .unwrap_or("");
    if text.is_empty() {
        Ok(StreamLine::Skip)
    } else {
        Ok(StreamLine::Delta(text.to_owned()))
    }
}

struct DeltaState<S> {
    bytes: std::pin::Pin<Box<S>>,
    lines: LineDecoder,
    pending: VecDeque<Result<String, LlmError>>,
    finished: bool,
}

impl<S> DeltaState<S> {
    /// Queue the deltas carried by freshly completed lines. Stops at the
    /// first terminal line.
    fn absorb(&mut self, lines: Vec<String>) {
        for line in lines {
            match parse_stream_line(&line) {
                Ok(StreamLine::Delta(text)) => self.pending.push_back(Ok(text)),
                Ok(StreamLine::Skip) => {}
                Ok(StreamLine::Done) => {
                    self.finished = true;
                    return;
                }
                Err(e) => {
                    self.pending.push_back(Err(e));
                    self.finished = true;
                    return;
                }
            }
        }
    }
}

/// Reduce an upstream byte stream to text deltas.
///
/// A transport error surfaces as a single trailing `Err` item.
pub(crate) fn delta_stream<S, B, E>(bytes: S) -> DeltaStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DeltaState { bytes: Box::pin(bytes), lines: LineDecoder::new(), pending: VecDeque::new(), finished: false };

    futures::stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.finished {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    let lines = st.lines.push(chunk.as_ref());
                    st.absorb(lines);
                }
                Some(Err(e)) => {
                    st.pending.push_back(Err(LlmError::ApiRequest(e.to_string())));
                    st.finished = true;
                }
                None => {
                    let tail = st.lines.finish().into_iter().collect();
                    st.absorb(tail);
                    st.finished = true;
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
#[path = "openai_test.rs"]
mod tests;
