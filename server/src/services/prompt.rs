//! System prompt composition.
//!
//! DESIGN
//! ======
//! The profile document is read from disk on every request so edits show
//! up without a restart. A missing or unreadable document never fails the
//! request: a short built-in persona description takes its place and the
//! read error is only logged.

use std::fmt::Write;
use std::path::Path;

use frames::Locale;
use tracing::warn;

/// The person the assistant is allowed to talk about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Persona {
    pub name: String,
    /// Name as written in Japanese replies.
    pub name_ja: String,
    /// Job title used by the fallback description.
    pub title: String,
}

/// Read the profile document and build the system prompt, falling back to
/// the built-in persona description when the read fails.
pub async fn system_prompt(persona: &Persona, profile_path: &Path, locale: Locale) -> String {
    match tokio::fs::read_to_string(profile_path).await {
        Ok(profile) => build_system_prompt(persona, &profile, locale),
        Err(e) => {
            warn!(error = %e, path = %profile_path.display(), "profile unreadable; using fallback persona");
            fallback_prompt(persona, locale)
        }
    }
}

/// Full prompt: persona instruction, verbatim profile, rules, and
/// locale-specific example refusals.
#[must_use]
pub fn build_system_prompt(persona: &Persona, profile: &str, locale: Locale) -> String {
    let name = &persona.name;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "You are an AI assistant that provides information about {name} based on their resume and profile."
    );
    let _ = writeln!(out);
    let _ = writeln!(out, "Here is {name}'s complete profile information:");
    let _ = writeln!(out);
    let _ = writeln!(out, "{}", profile.trim_end());
    let _ = writeln!(out);
    let _ = writeln!(out, "IMPORTANT INSTRUCTIONS:");
    let _ = writeln!(out, "- You can ONLY answer questions about {name} based on the information provided above.");
    out.push_str(&language_directive(locale));
    let _ = writeln!(
        out,
        "- If someone asks about anything else (other people, general topics, unrelated questions), politely decline and redirect them to ask about {name}."
    );
    let _ = writeln!(
        out,
        "- Be helpful, professional, and enthusiastic when discussing {name}'s background, skills, experience, and achievements."
    );
    let _ = writeln!(out, "- If you don't have specific information about something related to {name}, say so honestly.");
    let _ = writeln!(out, "- Keep responses concise but informative.");
    let _ = writeln!(out, "- Always maintain a professional and positive tone.");
    let _ = writeln!(out);
    let _ = writeln!(out, "Example responses for off-topic questions:");
    let _ = writeln!(out);
    out.push_str(&redirect_examples(persona, locale));

    out
}

/// Short persona description used when the profile document is unavailable.
#[must_use]
pub fn fallback_prompt(persona: &Persona, locale: Locale) -> String {
    let Persona { name, title, .. } = persona;
    let mut out = format!(
        "You are an AI assistant that provides information about {name}, a {title}. \
         You can only answer questions about {name} based on their professional background. \
         Please ask questions about their skills, experience, or background.\n"
    );
    out.push_str(&language_directive(locale));
    out
}

/// Lines that pin the reply language.
#[must_use]
pub fn language_directive(locale: Locale) -> String {
    let (label, language) = match locale {
        Locale::Ja => ("Japanese (ja)", "Japanese"),
        Locale::En => ("English (en)", "English"),
    };
    format!(
        "- The user's preferred language is {label}.\n\
         - ALWAYS respond in {language} unless the user explicitly asks you to use a different language.\n"
    )
}

fn redirect_examples(persona: &Persona, locale: Locale) -> String {
    match locale {
        Locale::Ja => {
            let name = &persona.name_ja;
            format!(
                "Japanese:\n\
                 - \"私は{name}についてのみ情報を提供できます。経歴、スキル、経験、または職業プロフィールの他の側面について、お気軽にお尋ねください。\"\n\
                 - \"私は{name}について学んでいただくためにここにいます。経験や資格について何を知りたいですか？\"\n"
            )
        }
        Locale::En => {
            let name = &persona.name;
            format!(
                "English:\n\
                 - \"I can only provide information about {name}. Please feel free to ask me about their background, skills, experience, or any other aspect of their professional profile.\"\n\
                 - \"I'm here to help you learn about {name}. What would you like to know about their experience or qualifications?\"\n"
            )
        }
    }
}

#[cfg(test)]
#[path = "prompt_test.rs"]
mod tests;
