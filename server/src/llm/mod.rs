//! LLM: streaming chat-completion adapter for the relay.
//!
//! DESIGN
//! ======
//! Uses environment variables instead of config files. `LlmClient` wraps one
//! `OpenAI`-compatible streaming client; `LLM_PROVIDER` only decides URL shape
//! and authentication (Azure deployment or plain `OpenAI` base URL).

pub mod config;
pub mod openai;
pub mod types;

use config::{LlmConfig, LlmProviderKind};
pub use types::LlmStream;
use types::{ChatRequest, DeltaStream, LlmError};

// =============================================================================
// CLIENT
// =============================================================================

/// Concrete LLM client used in production.
///
/// Configured from environment variables by [`LlmClient::from_env`].
pub struct LlmClient {
    inner: openai::OpenAiClient,
    provider: LlmProviderKind,
    model: String,
}

impl LlmClient {
    /// Build an LLM client from environment variables. See
    /// [`LlmConfig::from_env`] for the variables read.
    ///
    /// # Errors
    ///
    /// Returns an error if required variables are missing or the HTTP client
    /// fails.
    pub fn from_env() -> Result<Self, LlmError> {
        let config = LlmConfig::from_env()?;
        Self::from_config(config)
    }

    /// Build an LLM client from a parsed typed config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn from_config(config: LlmConfig) -> Result<Self, LlmError> {
        let inner = openai::OpenAiClient::new(config.api_key, config.endpoint, config.timeouts)?;
        Ok(Self { inner, provider: config.provider, model: config.model })
    }

    /// Return the configured model or deployment name.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Return the configured provider label (`azure` or `openai`).
    #[must_use]
    pub fn provider(&self) -> &'static str {
        self.provider.as_str()
    }
}

#[async_trait::async_trait]
impl LlmStream for LlmClient {
    async fn stream_chat(&self, request: &ChatRequest) -> Result<DeltaStream, LlmError> {
        self.inner.stream_chat(&self.model, request).await
    }
}
