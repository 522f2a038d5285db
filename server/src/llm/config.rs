//! LLM configuration parsed from environment variables.

use super::types::LlmError;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o";
pub const DEFAULT_AZURE_DEPLOYMENT: &str = "gpt-4";
pub const DEFAULT_AZURE_API_VERSION: &str = "2024-02-15-preview";
pub const DEFAULT_LLM_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_LLM_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    Azure,
    OpenAi,
}

impl LlmProviderKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Azure => "azure",
            Self::OpenAi => "openai",
        }
    }
}

/// Where chat-completion requests are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamEndpoint {
    /// Azure `OpenAI`: `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=..`,
    /// authenticated with an `api-key` header.
    Azure { endpoint: String, deployment: String, api_version: String },
    /// Any `OpenAI`-compatible base URL, authenticated with a bearer token.
    OpenAi { base_url: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LlmTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmConfig {
    pub provider: LlmProviderKind,
    pub api_key: String,
    pub model: String,
    pub endpoint: UpstreamEndpoint,
    pub timeouts: LlmTimeouts,
}

impl LlmConfig {
    /// Build typed LLM config from environment variables.
    ///
    /// Provider selection:
    /// - `LLM_PROVIDER`: `azure` (default) or `openai`
    ///
    /// Azure (required: `AZURE_OPENAI_API_KEY`, `AZURE_OPENAI_ENDPOINT`):
    /// - `AZURE_OPENAI_DEPLOYMENT_NAME`: default `gpt-4`, also used as the model
    /// - `AZURE_OPENAI_API_VERSION`: default `2024-02-15-preview`
    ///
    /// `OpenAI` (required: `LLM_API_KEY_ENV`, naming the env var containing the key):
    /// - `LLM_MODEL`: default `gpt-4o`
    /// - `LLM_OPENAI_BASE_URL`: default `OpenAI` API base URL
    ///
    /// Both:
    /// - `LLM_REQUEST_TIMEOUT_SECS`: default 120
    /// - `LLM_CONNECT_TIMEOUT_SECS`: default 10
    pub fn from_env() -> Result<Self, LlmError> {
        let provider = parse_provider(std::env::var("LLM_PROVIDER").ok().as_deref())?;
        let timeouts = LlmTimeouts {
            request_secs: env_parse_u64("LLM_REQUEST_TIMEOUT_SECS", DEFAULT_LLM_REQUEST_TIMEOUT_SECS),
            connect_secs: env_parse_u64("LLM_CONNECT_TIMEOUT_SECS", DEFAULT_LLM_CONNECT_TIMEOUT_SECS),
        };

        match provider {
            LlmProviderKind::Azure => {
                let api_key = required_env("AZURE_OPENAI_API_KEY")
                    .map_err(|var| LlmError::MissingApiKey { var })?;
                let endpoint = required_env("AZURE_OPENAI_ENDPOINT")
                    .map_err(|var| LlmError::MissingConfig { var })?
                    .trim_end_matches('/')
                    .to_string();
                let deployment = std::env::var("AZURE_OPENAI_DEPLOYMENT_NAME")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_AZURE_DEPLOYMENT.to_string());
                let api_version = std::env::var("AZURE_OPENAI_API_VERSION")
                    .ok()
                    .filter(|v| !v.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_AZURE_API_VERSION.to_string());

                Ok(Self {
                    provider,
                    api_key,
                    model: deployment.clone(),
                    endpoint: UpstreamEndpoint::Azure { endpoint, deployment, api_version },
                    timeouts,
                })
            }
            LlmProviderKind::OpenAi => {
                let key_var =
                    required_env("LLM_API_KEY_ENV").map_err(|var| LlmError::MissingApiKey { var })?;
                let api_key = required_env(&key_var).map_err(|var| LlmError::MissingApiKey { var })?;
                let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_OPENAI_MODEL.to_string());
                let base_url = std::env::var("LLM_OPENAI_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string())
                    .trim_end_matches('/')
                    .to_string();

                Ok(Self { provider, api_key, model, endpoint: UpstreamEndpoint::OpenAi { base_url }, timeouts })
            }
        }
    }
}

fn required_env(key: &str) -> Result<String, String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| key.to_string())
}

fn env_parse_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(default)
}

fn parse_provider(raw: Option<&str>) -> Result<LlmProviderKind, LlmError> {
    match raw.unwrap_or("azure") {
        "azure" => Ok(LlmProviderKind::Azure),
        "openai" => Ok(LlmProviderKind::OpenAi),
        other => Err(LlmError::ConfigParse(format!("unknown LLM_PROVIDER: {other}"))),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
