//! Domain services used by the HTTP routes.

pub mod chat;
pub mod prompt;
