//! Provider identities and the immutable endpoint table injected into every
//! outbound client (LLM generation, key verification, transcription).

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;

pub const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";
pub const OPENAI_AUDIO_URL: &str = "https://api.openai.com/v1/audio/transcriptions";
pub const OPENAI_MODELS_URL: &str = "https://api.openai.com/v1/models";
pub const OPENAI_CHAT_MODEL: &str = "gpt-3.5-turbo";
pub const OPENAI_TRANSCRIPTION_MODEL: &str = "whisper-1";

pub const GOOGLE_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GOOGLE_MODEL: &str = "gemini-1.5-flash";
pub const GOOGLE_SPEECH_URL: &str = "https://speech.googleapis.com/v1/speech:recognize";

pub const DEFAULT_SPEECH_LANGUAGE: &str = "en-US";

/// A remote service offering text generation and speech-to-text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    OpenAI,
    Google,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::OpenAI => "OpenAI",
            Provider::Google => "Google",
        }
    }

    /// Key under which this provider's secret lives in the credential store.
    pub fn credential_username(self) -> &'static str {
        match self {
            Provider::OpenAI => "openai_api_key",
            Provider::Google => "google_api_key",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("Unknown provider '{0}' (expected OpenAI or Google)")]
pub struct UnknownProvider(pub String);

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "google" => Ok(Provider::Google),
            _ => Err(UnknownProvider(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiEndpoints {
    pub chat_url: String,
    pub audio_url: String,
    pub models_url: String,
    pub chat_model: String,
    pub transcription_model: String,
}

#[derive(Debug, Clone)]
pub struct GoogleEndpoints {
    /// Base of the Generative Language API, e.g. `.../v1beta`.
    pub api_base: String,
    pub model: String,
    pub speech_url: String,
}

impl GoogleEndpoints {
    pub fn generate_content_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.api_base.trim_end_matches('/'),
            self.model
        )
    }
}

/// Per-provider configuration. Built once at startup and shared read-only.
#[derive(Debug, Clone)]
pub struct ProviderTable {
    pub openai: OpenAiEndpoints,
    pub google: GoogleEndpoints,
    pub speech_language: String,
    pub http_timeout: Duration,
}

impl ProviderTable {
    pub fn from_config(config: &Config) -> Self {
        Self {
            openai: OpenAiEndpoints {
                chat_url: config.openai_chat_url.clone(),
                audio_url: config.openai_audio_url.clone(),
                models_url: config.openai_models_url.clone(),
                chat_model: config.openai_chat_model.clone(),
                transcription_model: config.openai_transcription_model.clone(),
            },
            google: GoogleEndpoints {
                api_base: config.google_api_base.clone(),
                model: config.google_model.clone(),
                speech_url: config.google_speech_url.clone(),
            },
            speech_language: config.speech_language.clone(),
            http_timeout: config.http_timeout,
        }
    }

    /// Builds the shared HTTP client used for every provider call.
    pub fn http_client(&self) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder().timeout(self.http_timeout).build()
    }
}

impl Default for ProviderTable {
    fn default() -> Self {
        Self {
            openai: OpenAiEndpoints {
                chat_url: OPENAI_CHAT_URL.to_string(),
                audio_url: OPENAI_AUDIO_URL.to_string(),
                models_url: OPENAI_MODELS_URL.to_string(),
                chat_model: OPENAI_CHAT_MODEL.to_string(),
                transcription_model: OPENAI_TRANSCRIPTION_MODEL.to_string(),
            },
            google: GoogleEndpoints {
                api_base: GOOGLE_API_BASE.to_string(),
                model: GOOGLE_MODEL.to_string(),
                speech_url: GOOGLE_SPEECH_URL.to_string(),
            },
            speech_language: DEFAULT_SPEECH_LANGUAGE.to_string(),
            http_timeout: Duration::from_secs(120),
        }
    }
}
