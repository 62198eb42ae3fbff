//! Speech-to-text: one utterance in, text out.
//!
//! The presentation layer records the microphone and uploads a WAV file; this module
//! validates it, gates out silence, and transcribes it with the session provider.
//! The whole capture + transcription unit is bounded by a fixed timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use thiserror::Error;
use tracing::{debug, info};

use crate::credentials::ProviderKey;
use crate::providers::{Provider, ProviderTable};

pub mod google;
pub mod openai;
pub mod utterance;

pub use utterance::{SpeechGate, Utterance};

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("Could not understand audio")]
    NoSpeechDetected,

    #[error("Recognition error: {0}")]
    RecognitionService(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for SpeechError {
    fn from(e: reqwest::Error) -> Self {
        SpeechError::Transport(e.without_url().to_string())
    }
}

/// Speech-to-text backend seam. `InterviewService` holds an `Arc<dyn Transcriber>`.
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, key: &ProviderKey, utterance: &Utterance)
        -> Result<String, SpeechError>;
}

/// Dispatches to the provider's transcription API. The session provider is used
/// for both generation and transcription.
pub struct ProviderTranscriber {
    client: Client,
    providers: Arc<ProviderTable>,
}

impl ProviderTranscriber {
    pub fn new(client: Client, providers: Arc<ProviderTable>) -> Self {
        Self { client, providers }
    }
}

#[async_trait]
impl Transcriber for ProviderTranscriber {
    async fn transcribe(
        &self,
        key: &ProviderKey,
        utterance: &Utterance,
    ) -> Result<String, SpeechError> {
        match key.provider {
            Provider::OpenAI => {
                openai::transcribe(&self.client, &self.providers.openai, key, utterance).await
            }
            Provider::Google => {
                google::transcribe(
                    &self.client,
                    &self.providers.google,
                    &self.providers.speech_language,
                    key,
                    utterance,
                )
                .await
            }
        }
    }
}

/// Validates one uploaded utterance and transcribes it within `timeout`.
/// Empty transcripts count as no speech.
pub async fn capture_and_transcribe(
    transcriber: &dyn Transcriber,
    key: &ProviderKey,
    upload: Bytes,
    gate: &SpeechGate,
    timeout: Duration,
) -> Result<String, SpeechError> {
    let utterance = Utterance::from_wav(upload, gate)?;
    debug!(
        "Captured utterance: {:.1}s at {} Hz, {} channel(s)",
        utterance.duration.as_secs_f32(),
        utterance.sample_rate,
        utterance.channels
    );

    let text = tokio::time::timeout(timeout, transcriber.transcribe(key, &utterance))
        .await
        .map_err(|_| {
            SpeechError::Transport(format!(
                "{} transcription timed out after {}s",
                key.provider,
                timeout.as_secs()
            ))
        })??;

    let text = text.trim();
    if text.is_empty() {
        return Err(SpeechError::NoSpeechDetected);
    }

    info!("{} transcribed {} chars", key.provider, text.len());
    Ok(text.to_string())
}
