//! Chat relay route.
//!
//! `POST /api/chat` answers with `text/event-stream` framing once the upstream
//! stream is open. Validation and upstream-open failures return a JSON
//! `{"error": ...}` body instead.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONNECTION;
use axum::response::sse::Sse;
use axum::response::{IntoResponse, Json, Response};

use frames::ErrorBody;

use crate::services::chat::{self, ChatError};
use crate::state::AppState;

/// `POST /api/chat`: stream an assistant reply about the profile subject.
pub async fn relay_chat(State(state): State<AppState>, body: Bytes) -> Result<Response, ChatError> {
    let stream = chat::open_relay(&state, &body).await?;
    Ok(([(CONNECTION, "keep-alive")], Sse::new(stream)).into_response())
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = chat_error_to_status(&self);
        (status, Json(ErrorBody { error: self.public_message().to_string() })).into_response()
    }
}

pub(crate) fn chat_error_to_status(err: &ChatError) -> StatusCode {
    if err.is_client_error() { StatusCode::BAD_REQUEST } else { StatusCode::INTERNAL_SERVER_ERROR }
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
