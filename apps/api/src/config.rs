use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::interview::session::DEFAULT_TURN_BUDGET;
use crate::providers::{
    DEFAULT_SPEECH_LANGUAGE, GOOGLE_API_BASE, GOOGLE_MODEL, GOOGLE_SPEECH_URL, OPENAI_AUDIO_URL,
    OPENAI_CHAT_MODEL, OPENAI_CHAT_URL, OPENAI_MODELS_URL, OPENAI_TRANSCRIPTION_MODEL,
};

/// Application configuration loaded from environment variables.
/// Every variable is optional; unset ones fall back to the production defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    /// `None` means the platform config dir (`~/.config/rehearsal/credentials.json`).
    pub credentials_path: Option<PathBuf>,
    pub openai_chat_url: String,
    pub openai_audio_url: String,
    pub openai_models_url: String,
    pub openai_chat_model: String,
    pub openai_transcription_model: String,
    pub google_api_base: String,
    pub google_model: String,
    pub google_speech_url: String,
    pub speech_language: String,
    /// Upper bound on one capture + transcription call.
    pub capture_timeout: Duration,
    pub http_timeout: Duration,
    /// Number of history entries after which a session is forced to complete.
    pub turn_budget: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let turn_budget: usize = parse_env("INTERVIEW_TURN_BUDGET", DEFAULT_TURN_BUDGET)?;
        anyhow::ensure!(turn_budget >= 2, "INTERVIEW_TURN_BUDGET must be at least 2");

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: env_or("RUST_LOG", "info"),
            credentials_path: std::env::var("REHEARSAL_CREDENTIALS_PATH")
                .ok()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            openai_chat_url: env_or("OPENAI_CHAT_URL", OPENAI_CHAT_URL),
            openai_audio_url: env_or("OPENAI_AUDIO_URL", OPENAI_AUDIO_URL),
            openai_models_url: env_or("OPENAI_MODELS_URL", OPENAI_MODELS_URL),
            openai_chat_model: env_or("OPENAI_CHAT_MODEL", OPENAI_CHAT_MODEL),
            openai_transcription_model: env_or(
                "OPENAI_TRANSCRIPTION_MODEL",
                OPENAI_TRANSCRIPTION_MODEL,
            ),
            google_api_base: env_or("GOOGLE_API_BASE", GOOGLE_API_BASE),
            google_model: env_or("GOOGLE_MODEL", GOOGLE_MODEL),
            google_speech_url: env_or("GOOGLE_SPEECH_URL", GOOGLE_SPEECH_URL),
            speech_language: env_or("SPEECH_LANGUAGE", DEFAULT_SPEECH_LANGUAGE),
            capture_timeout: Duration::from_secs(parse_env("CAPTURE_TIMEOUT_SECS", 30)?),
            http_timeout: Duration::from_secs(parse_env("HTTP_TIMEOUT_SECS", 120)?),
            turn_budget,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => parse_value(key, &raw),
        Err(_) => Ok(default),
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse::<T>()
        .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw:?}"))
}
