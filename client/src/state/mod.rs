//! Conversation and locale state.

pub mod chat;
pub mod locale;
