//! Relay configuration parsed from environment variables.
//!
//! Everything here has a default, so a bare environment still boots. The
//! upstream credentials live in [`crate::llm::config`] instead.

use std::path::PathBuf;

use crate::services::prompt::Persona;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_PROFILE_PATH: &str = "profile.md";
pub const DEFAULT_SUBJECT: &str = "Tamanna Akter";
pub const DEFAULT_SUBJECT_JA: &str = "タマンナ・アクテール";
pub const DEFAULT_SUBJECT_TITLE: &str = "Full Stack Developer";
pub const DEFAULT_MAX_TOKENS: u32 = 1000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub port: u16,
    /// Profile document, re-read on every request.
    pub profile_path: PathBuf,
    pub persona: Persona,
    pub max_tokens: u32,
    pub temperature: f32,
    /// Forward the client's prior turns upstream. Off by default.
    pub forward_history: bool,
    pub history_limit: usize,
    /// Optional static site served at `/`.
    pub website_dir: Option<PathBuf>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            profile_path: PathBuf::from(DEFAULT_PROFILE_PATH),
            persona: Persona {
                name: DEFAULT_SUBJECT.into(),
                name_ja: DEFAULT_SUBJECT_JA.into(),
                title: DEFAULT_SUBJECT_TITLE.into(),
            },
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            forward_history: false,
            history_limit: DEFAULT_HISTORY_LIMIT,
            website_dir: None,
        }
    }
}

impl RelayConfig {
    /// Build relay config from environment variables.
    ///
    /// - `PORT`: default 3000
    /// - `PROFILE_PATH`: default `profile.md`
    /// - `PROFILE_SUBJECT`, `PROFILE_SUBJECT_JA`, `PROFILE_SUBJECT_TITLE`
    /// - `CHAT_MAX_TOKENS`: default 1000
    /// - `CHAT_TEMPERATURE`: default 0.7
    /// - `CHAT_FORWARD_HISTORY`: default false
    /// - `CHAT_HISTORY_LIMIT`: default 10
    /// - `WEBSITE_DIR`: unset by default
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let name = env_string("PROFILE_SUBJECT").unwrap_or(defaults.persona.name);
        // The stock Japanese rendering only applies to the stock subject.
        let name_ja = env_string("PROFILE_SUBJECT_JA").unwrap_or_else(|| {
            if name == DEFAULT_SUBJECT { DEFAULT_SUBJECT_JA.to_string() } else { name.clone() }
        });
        let title = env_string("PROFILE_SUBJECT_TITLE").unwrap_or(defaults.persona.title);

        Self {
            port: env_parse("PORT", defaults.port),
            profile_path: env_string("PROFILE_PATH").map_or(defaults.profile_path, PathBuf::from),
            persona: Persona { name, name_ja, title },
            max_tokens: env_parse("CHAT_MAX_TOKENS", defaults.max_tokens),
            temperature: env_parse("CHAT_TEMPERATURE", defaults.temperature),
            forward_history: env_bool("CHAT_FORWARD_HISTORY").unwrap_or(defaults.forward_history),
            history_limit: env_parse("CHAT_HISTORY_LIMIT", defaults.history_limit),
            website_dir: env_string("WEBSITE_DIR").map(PathBuf::from),
        }
    }
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
