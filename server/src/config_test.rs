use super::*;
use std::sync::Mutex;

static ENV_LOCK: Mutex<()> = Mutex::new(());

const KEYS: [&str; 10] = [
    "PORT",
    "PROFILE_PATH",
    "PROFILE_SUBJECT",
    "PROFILE_SUBJECT_JA",
    "PROFILE_SUBJECT_TITLE",
    "CHAT_MAX_TOKENS",
    "CHAT_TEMPERATURE",
    "CHAT_FORWARD_HISTORY",
    "CHAT_HISTORY_LIMIT",
    "WEBSITE_DIR",
];

/// # Safety
/// Callers must hold `ENV_LOCK`.
unsafe fn clear_relay_env() {
    unsafe {
        for key in KEYS {
            std::env::remove_var(key);
        }
    }
}

#[test]
fn from_env_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_relay_env() };

    let cfg = RelayConfig::from_env();
    assert_eq!(cfg, RelayConfig::default());
    assert_eq!(cfg.port, 3000);
    assert_eq!(cfg.profile_path, PathBuf::from("profile.md"));
    assert_eq!(cfg.persona.name_ja, DEFAULT_SUBJECT_JA);
    assert_eq!(cfg.max_tokens, 1000);
    assert!((cfg.temperature - 0.7).abs() < f32::EPSILON);
    assert!(!cfg.forward_history);
    assert!(cfg.website_dir.is_none());
}

#[test]
fn from_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_relay_env();
        std::env::set_var("PORT", "8080");
        std::env::set_var("PROFILE_PATH", "/srv/resume.md");
        std::env::set_var("CHAT_MAX_TOKENS", "250");
        std::env::set_var("CHAT_TEMPERATURE", "0.2");
        std::env::set_var("CHAT_FORWARD_HISTORY", "yes");
        std::env::set_var("CHAT_HISTORY_LIMIT", "4");
        std::env::set_var("WEBSITE_DIR", "./website");
    }

    let cfg = RelayConfig::from_env();
    assert_eq!(cfg.port, 8080);
    assert_eq!(cfg.profile_path, PathBuf::from("/srv/resume.md"));
    assert_eq!(cfg.max_tokens, 250);
    assert!((cfg.temperature - 0.2).abs() < f32::EPSILON);
    assert!(cfg.forward_history);
    assert_eq!(cfg.history_limit, 4);
    assert_eq!(cfg.website_dir, Some(PathBuf::from("./website")));

    unsafe { clear_relay_env() };
}

#[test]
fn custom_subject_reuses_name_for_japanese() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_relay_env();
        std::env::set_var("PROFILE_SUBJECT", "Ada Lovelace");
    }

    let cfg = RelayConfig::from_env();
    assert_eq!(cfg.persona.name, "Ada Lovelace");
    assert_eq!(cfg.persona.name_ja, "Ada Lovelace");

    unsafe { clear_relay_env() };
}

#[test]
fn invalid_numbers_fall_back_to_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_relay_env();
        std::env::set_var("PORT", "not-a-port");
        std::env::set_var("CHAT_FORWARD_HISTORY", "maybe");
    }

    let cfg = RelayConfig::from_env();
    assert_eq!(cfg.port, DEFAULT_PORT);
    assert!(!cfg.forward_history);

    unsafe { clear_relay_env() };
}
