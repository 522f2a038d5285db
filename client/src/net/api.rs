//! Relay transport: opens `POST /api/chat` and exposes the raw body.
//!
//! ERROR HANDLING
//! ==============
//! Anything that prevents a readable body (connect failure, non-2xx status)
//! is a [`TransportError`] from [`RelayTransport::open`]. Read failures after
//! that surface as `Err` items on the byte stream.

#[cfg(test)]
#[path = "api_test.rs"]
mod api_test;

use std::time::Duration;

use futures::StreamExt;
use futures::stream::BoxStream;

use frames::RelayRequest;

/// Raw response body chunks, exactly as read from the socket.
pub type ByteStream = BoxStream<'static, Result<Vec<u8>, TransportError>>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("relay returned status {0}")]
    Status(u16),
    #[error("body read failed: {0}")]
    Body(String),
    #[error("http client build failed: {0}")]
    ClientBuild(String),
}

/// Opens a chat relay stream.
#[async_trait::async_trait]
pub trait RelayTransport: Send + Sync {
    /// Send `request` and return the response body once the relay accepts it.
    async fn open(&self, request: &RelayRequest) -> Result<ByteStream, TransportError>;
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP transport against a running relay.
#[derive(Clone)]
pub struct HttpRelay {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRelay {
    /// # Errors
    ///
    /// Returns [`TransportError::ClientBuild`] if the HTTP client cannot be
    /// constructed.
    pub fn new(base_url: &str) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| TransportError::ClientBuild(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_owned() })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /healthz`.
    ///
    /// # Errors
    ///
    /// Returns an error if the relay is unreachable or not healthy.
    pub async fn ping(&self) -> Result<(), TransportError> {
        let response = self
            .http
            .get(health_url(&self.base_url))
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;
        check_status(response.status().as_u16())
    }
}

#[async_trait::async_trait]
impl RelayTransport for HttpRelay {
    async fn open(&self, request: &RelayRequest) -> Result<ByteStream, TransportError> {
        let response = self
            .http
            .post(chat_url(&self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| TransportError::Request(e.to_string()))?;

        check_status(response.status().as_u16())?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map(|b| b.to_vec()).map_err(|e| TransportError::Body(e.to_string())))
            .boxed())
    }
}

pub(crate) fn chat_url(base_url: &str) -> String {
    format!("{}/api/chat", base_url.trim_end_matches('/'))
}

pub(crate) fn health_url(base_url: &str) -> String {
    format!("{}/healthz", base_url.trim_end_matches('/'))
}

pub(crate) fn check_status(status: u16) -> Result<(), TransportError> {
    if (200..300).contains(&status) { Ok(()) } else { Err(TransportError::Status(status)) }
}
