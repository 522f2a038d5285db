//! Relay transport and the streaming chat driver.

pub mod api;
pub mod chat_client;

pub use api::{ByteStream, HttpRelay, RelayTransport, TransportError};
