//! Conversation state: ordered messages plus the single in-flight reply.
//!
//! DESIGN
//! ======
//! Messages are stored in insertion order, which is also display order. At
//! most one assistant message is in progress at a time and it is always the
//! last element. Every mutation is keyed by the reply id so late fragments
//! for a finished reply are ignored instead of corrupting a newer one.

#[cfg(test)]
#[path = "chat_test.rs"]
mod chat_test;

use std::time::{SystemTime, UNIX_EPOCH};

use frames::{HistoryMessage, Locale, RelayRequest};
use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single message in the conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message identifier (UUID string).
    pub id: String,
    pub role: Role,
    /// Append-only while the message is the in-progress reply.
    pub content: String,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl ChatMessage {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self { id: uuid::Uuid::new_v4().to_string(), role, content: content.into(), timestamp: now_ms() }
    }
}

/// Where the current send is in its lifecycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SendPhase {
    #[default]
    Idle,
    /// Request issued, no response body yet.
    Sending,
    /// Response body open, fragments arriving.
    Streaming,
}

/// Everything the network side needs to carry out one accepted send.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingReply {
    /// Id of the placeholder assistant message.
    pub reply_id: String,
    pub request: RelayRequest,
}

/// Conversation state for one chat session.
#[derive(Clone, Debug, Default)]
pub struct ChatState {
    messages: Vec<ChatMessage>,
    phase: SendPhase,
    in_progress: Option<String>,
}

impl ChatState {
    /// Start a conversation with an assistant greeting.
    #[must_use]
    pub fn with_greeting(greeting: &str) -> Self {
        Self { messages: vec![ChatMessage::new(Role::Assistant, greeting)], ..Self::default() }
    }

    /// Append the user's message and an empty assistant placeholder.
    ///
    /// Returns `None` without touching the conversation when a send is
    /// already in flight or `text` is blank.
    pub fn begin_send(&mut self, text: &str, locale: Locale, include_history: bool) -> Option<PendingReply> {
        let text = text.trim();
        if self.is_loading() || text.is_empty() {
            return None;
        }

        let history = if include_history { self.history() } else { Vec::new() };

        self.messages.push(ChatMessage::new(Role::User, text));
        let placeholder = ChatMessage::new(Role::Assistant, String::new());
        let reply_id = placeholder.id.clone();
        self.messages.push(placeholder);
        self.phase = SendPhase::Sending;
        self.in_progress = Some(reply_id.clone());

        Some(PendingReply {
            reply_id,
            request: RelayRequest {
                message: Some(text.to_owned()),
                language: Some(locale.as_tag().to_owned()),
                messages: history,
            },
        })
    }

    /// Record that the response body is open.
    pub fn mark_streaming(&mut self, reply_id: &str) -> bool {
        if self.is_current(reply_id) && self.phase == SendPhase::Sending {
            self.phase = SendPhase::Streaming;
            return true;
        }
        false
    }

    /// Append a fragment to the in-progress reply.
    pub fn append_fragment(&mut self, reply_id: &str, text: &str) -> bool {
        if !self.is_current(reply_id) {
            return false;
        }
        match self.messages.iter_mut().rev().find(|m| m.id == reply_id) {
            Some(message) => {
                message.content.push_str(text);
                true
            }
            None => false,
        }
    }

    /// Close the in-progress reply. Returns `false` if it was already closed.
    pub fn finish(&mut self, reply_id: &str) -> bool {
        if !self.is_current(reply_id) {
            return false;
        }
        self.in_progress = None;
        self.phase = SendPhase::Idle;
        true
    }

    /// Close the in-progress reply as failed. Partial content is kept; an
    /// empty reply gets `failure_text`.
    pub fn fail(&mut self, reply_id: &str, failure_text: &str) -> bool {
        if !self.is_current(reply_id) {
            return false;
        }
        if let Some(message) = self.messages.iter_mut().rev().find(|m| m.id == reply_id) {
            if message.content.is_empty() {
                failure_text.clone_into(&mut message.content);
            }
        }
        self.in_progress = None;
        self.phase = SendPhase::Idle;
        true
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.in_progress.is_some()
    }

    #[must_use]
    pub fn phase(&self) -> SendPhase {
        self.phase
    }

    #[must_use]
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Content of a message by id.
    #[must_use]
    pub fn content_of(&self, id: &str) -> Option<&str> {
        self.messages.iter().find(|m| m.id == id).map(|m| m.content.as_str())
    }

    fn is_current(&self, reply_id: &str) -> bool {
        self.in_progress.as_deref() == Some(reply_id)
    }

    /// Prior turns in wire form, skipping empty messages.
    fn history(&self) -> Vec<HistoryMessage> {
        self.messages
            .iter()
            .filter(|m| !m.content.is_empty())
            .map(|m| HistoryMessage {
                id: Some(m.id.clone()),
                role: m.role.as_str().to_owned(),
                content: m.content.clone(),
                timestamp: Some(m.timestamp),
            })
            .collect()
    }
}

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}
