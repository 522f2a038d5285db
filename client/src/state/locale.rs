//! Locale selection: display strings per locale and the persisted choice.
//!
//! TRADE-OFFS
//! ==========
//! Persistence is best-effort: a store that cannot be read yields `None` and
//! the caller falls back to English. Only `en` and `ja` are accepted from
//! storage; anything else is treated as unset.

#[cfg(test)]
#[path = "locale_test.rs"]
mod locale_test;

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use frames::Locale;

/// User-visible strings for one locale.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LocaleStrings {
    pub title: &'static str,
    pub prompt_label: &'static str,
    /// First assistant message of a new conversation.
    pub greeting: &'static str,
    /// Reply text when the relay could not be reached.
    pub failure: &'static str,
}

const EN: LocaleStrings = LocaleStrings {
    title: "Chat with Tamanna's AI",
    prompt_label: "You",
    greeting: "Hello! I'm here to answer any questions you have about Tamanna Akter. Feel free to ask about her background, skills, experience, projects, or anything else you'd like to know about her professional profile!",
    failure: "Sorry, I encountered an error. Please try again.",
};

const JA: LocaleStrings = LocaleStrings {
    title: "タマンナのAIとチャット",
    prompt_label: "あなた",
    greeting: "こんにちは！タマンナ・アクテールについてのご質問にお答えします。経歴、スキル、経験、プロジェクトなど、職業プロフィールについてお気軽にお尋ねください！",
    failure: "申し訳ありません。エラーが発生しました。もう一度お試しください。",
};

impl LocaleStrings {
    #[must_use]
    pub fn for_locale(locale: Locale) -> &'static Self {
        match locale {
            Locale::En => &EN,
            Locale::Ja => &JA,
        }
    }
}

/// Parse a persisted locale value. Unknown values are treated as unset.
#[must_use]
pub fn parse_stored(value: &str) -> Option<Locale> {
    match value.trim() {
        "en" => Some(Locale::En),
        "ja" => Some(Locale::Ja),
        _ => None,
    }
}

/// Read/write access to the single persisted locale value.
pub trait LocaleStore: Send + Sync {
    /// The saved locale, if one was saved and is recognized.
    fn load(&self) -> Option<Locale>;

    /// Persist `locale`.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the value could not be written.
    fn save(&self, locale: Locale) -> std::io::Result<()>;
}

/// In-process store, used by tests and one-shot invocations.
#[derive(Debug, Default)]
pub struct MemoryLocaleStore {
    value: Mutex<Option<Locale>>,
}

impl MemoryLocaleStore {
    #[must_use]
    pub fn new(initial: Option<Locale>) -> Self {
        Self { value: Mutex::new(initial) }
    }
}

impl LocaleStore for MemoryLocaleStore {
    fn load(&self) -> Option<Locale> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save(&self, locale: Locale) -> std::io::Result<()> {
        *self.value.lock().unwrap_or_else(PoisonError::into_inner) = Some(locale);
        Ok(())
    }
}

/// Store backed by a small text file holding the locale tag.
#[derive(Debug, Clone)]
pub struct FileLocaleStore {
    path: PathBuf,
}

impl FileLocaleStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl LocaleStore for FileLocaleStore {
    fn load(&self) -> Option<Locale> {
        let contents = std::fs::read_to_string(&self.path).ok()?;
        parse_stored(&contents)
    }

    fn save(&self, locale: Locale) -> std::io::Result<()> {
        std::fs::write(&self.path, locale.as_tag())
    }
}
