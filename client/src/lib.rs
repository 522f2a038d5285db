//! Streaming chat client for the résumé relay.
//!
//! `state` holds the conversation and locale model with no I/O; `net` owns
//! the relay transport and the [`net::chat_client::ChatClient`] that drives a
//! send from request to final message.

pub mod net;
pub mod state;

pub use net::chat_client::{ChatClient, ChatUpdate, SendOutcome};
pub use state::chat::{ChatMessage, Role};
pub use state::locale::{FileLocaleStore, LocaleStore, LocaleStrings, MemoryLocaleStore};
