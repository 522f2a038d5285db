//! Chat client: drives one send from user text to a finished reply.
//!
//! DESIGN
//! ======
//! The conversation lives behind a short-lived mutex that is never held
//! across an await. A send appends the user message and the assistant
//! placeholder before any I/O, then decodes the relay body incrementally and
//! appends every content event to the placeholder by id.
//!
//! Concurrent sends are ignored, not queued. An in-flight send can be ended
//! with [`ChatClient::abort`]; dropping the send future has the same effect.
//! Either way the reply is closed as failed and the client is idle again.

#[cfg(test)]
#[path = "chat_client_test.rs"]
mod chat_client_test;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::StreamExt;
use futures::future::{AbortHandle, Abortable};
use tracing::{debug, warn};

use frames::{EventDecoder, Locale, StreamEvent};

use super::api::RelayTransport;
use crate::state::chat::{ChatMessage, ChatState, PendingReply};
use crate::state::locale::{LocaleStore, LocaleStrings};

/// How a call to [`ChatClient::send_message`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank text, or another send was already in flight.
    Ignored,
    /// The relay sent its end-of-stream sentinel.
    Done,
    /// The body ended without a sentinel.
    Ended,
    /// Transport failure or abort.
    Failed,
}

/// Incremental change to the conversation, for renderers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatUpdate {
    Fragment { id: String, text: String },
    Finished { id: String },
    /// `content` is the final text of the failed reply.
    Failed { id: String, content: String },
}

type Renderer = Box<dyn Fn(&ChatUpdate) + Send + Sync>;

pub struct ChatClient {
    state: Mutex<ChatState>,
    transport: Arc<dyn RelayTransport>,
    locale_store: Arc<dyn LocaleStore>,
    include_history: bool,
    renderer: Option<Renderer>,
    abort: Mutex<Option<AbortHandle>>,
}

impl ChatClient {
    /// New conversation greeted in the stored locale.
    pub fn new(transport: Arc<dyn RelayTransport>, locale_store: Arc<dyn LocaleStore>) -> Self {
        let locale = locale_store.load().unwrap_or_default();
        let greeting = LocaleStrings::for_locale(locale).greeting;
        Self {
            state: Mutex::new(ChatState::with_greeting(greeting)),
            transport,
            locale_store,
            include_history: false,
            renderer: None,
            abort: Mutex::new(None),
        }
    }

    /// Send prior turns with each request.
    #[must_use]
    pub fn with_history(mut self, include_history: bool) -> Self {
        self.include_history = include_history;
        self
    }

    /// Receive every conversation update as it is applied.
    #[must_use]
    pub fn on_update(mut self, renderer: impl Fn(&ChatUpdate) + Send + Sync + 'static) -> Self {
        self.renderer = Some(Box::new(renderer));
        self
    }

    #[must_use]
    pub fn locale(&self) -> Locale {
        self.locale_store.load().unwrap_or_default()
    }

    /// Persist a new locale. Later sends and failure texts use it.
    ///
    /// # Errors
    ///
    /// Returns the store's I/O error if the choice could not be saved.
    pub fn set_locale(&self, locale: Locale) -> std::io::Result<()> {
        self.locale_store.save(locale)
    }

    #[must_use]
    pub fn strings(&self) -> &'static LocaleStrings {
        LocaleStrings::for_locale(self.locale())
    }

    /// Snapshot of the conversation.
    #[must_use]
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.lock_state().messages().to_vec()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.lock_state().is_loading()
    }

    /// Send `text` and stream the reply into the conversation.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let locale = self.locale();
        let failure = LocaleStrings::for_locale(locale).failure;

        let Some(pending) = self.lock_state().begin_send(text, locale, self.include_history) else {
            return SendOutcome::Ignored;
        };
        let mut in_flight = InFlight { client: self, reply_id: &pending.reply_id, failure, settled: false };

        let (handle, registration) = AbortHandle::new_pair();
        *self.lock_abort() = Some(handle);

        let outcome = match Abortable::new(self.stream_reply(&pending, failure), registration).await {
            Ok(outcome) => outcome,
            Err(_) => {
                debug!(reply_id = %pending.reply_id, "send aborted");
                self.fail(&pending.reply_id, failure);
                SendOutcome::Failed
            }
        };

        self.lock_abort().take();
        in_flight.settled = true;
        outcome
    }

    /// End the in-flight send, if any, as failed.
    pub fn abort(&self) {
        if let Some(handle) = self.lock_abort().take() {
            handle.abort();
        }
    }

    async fn stream_reply(&self, pending: &PendingReply, failure: &str) -> SendOutcome {
        let id = pending.reply_id.as_str();

        let mut body = match self.transport.open(&pending.request).await {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "chat relay unavailable");
                self.fail(id, failure);
                return SendOutcome::Failed;
            }
        };
        self.lock_state().mark_streaming(id);

        let mut decoder = EventDecoder::new();
        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    warn!(error = %e, "chat stream interrupted");
                    self.fail(id, failure);
                    return SendOutcome::Failed;
                }
            };
            for event in decoder.push(&chunk) {
                if self.apply(id, event) {
                    log_dropped(&decoder);
                    return SendOutcome::Done;
                }
            }
        }

        let done = decoder.finish().is_some_and(|event| self.apply(id, event));
        log_dropped(&decoder);
        self.finish(id);
        if done { SendOutcome::Done } else { SendOutcome::Ended }
    }

    /// Apply one event. Returns `true` on the sentinel.
    fn apply(&self, id: &str, event: StreamEvent) -> bool {
        match event {
            StreamEvent::Content(text) => {
                if self.lock_state().append_fragment(id, &text) {
                    self.emit(&ChatUpdate::Fragment { id: id.to_owned(), text });
                }
                false
            }
            StreamEvent::Done => {
                self.finish(id);
                true
            }
        }
    }

    fn finish(&self, id: &str) {
        if self.lock_state().finish(id) {
            self.emit(&ChatUpdate::Finished { id: id.to_owned() });
        }
    }

    fn fail(&self, id: &str, failure: &str) {
        let content = {
            let mut state = self.lock_state();
            if !state.fail(id, failure) {
                return;
            }
            state.content_of(id).unwrap_or_default().to_owned()
        };
        self.emit(&ChatUpdate::Failed { id: id.to_owned(), content });
    }

    fn emit(&self, update: &ChatUpdate) {
        if let Some(renderer) = &self.renderer {
            renderer(update);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_abort(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.abort.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn log_dropped(decoder: &EventDecoder) {
    if decoder.dropped() > 0 {
        debug!(dropped = decoder.dropped(), "ignored malformed stream lines");
    }
}

/// Closes the reply as failed if the send future is dropped mid-flight.
struct InFlight<'a> {
    client: &'a ChatClient,
    reply_id: &'a str,
    failure: &'static str,
    settled: bool,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.client.lock_abort().take();
            self.client.fail(self.reply_id, self.failure);
        }
    }
}
