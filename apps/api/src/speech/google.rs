//! Google transcription: Cloud Speech-to-Text `speech:recognize` with inline
//! base64 LINEAR16 audio and the API key as the `key` query parameter.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{SpeechError, Utterance};
use crate::credentials::ProviderKey;
use crate::providers::GoogleEndpoints;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognizeRequest<'a> {
    config: RecognitionConfig<'a>,
    audio: RecognitionAudio,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecognitionConfig<'a> {
    encoding: &'a str,
    sample_rate_hertz: u32,
    audio_channel_count: u16,
    language_code: &'a str,
}

#[derive(Debug, Serialize)]
struct RecognitionAudio {
    content: String,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognitionResult>,
}

#[derive(Debug, Deserialize)]
struct RecognitionResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    #[serde(default)]
    transcript: String,
}

pub async fn transcribe(
    client: &Client,
    endpoints: &GoogleEndpoints,
    language: &str,
    key: &ProviderKey,
    utterance: &Utterance,
) -> Result<String, SpeechError> {
    if !utterance.is_linear16() {
        return Err(SpeechError::RecognitionService(format!(
            "Google speech recognition needs 16-bit PCM audio, got {}-bit {:?}",
            utterance.bits_per_sample, utterance.sample_format
        )));
    }

    let body = RecognizeRequest {
        config: RecognitionConfig {
            encoding: "LINEAR16",
            sample_rate_hertz: utterance.sample_rate,
            audio_channel_count: utterance.channels,
            language_code: language,
        },
        audio: RecognitionAudio {
            content: BASE64_STANDARD.encode(utterance.wav_bytes()),
        },
    };

    let response = client
        .post(&endpoints.speech_url)
        .query(&[("key", key.credential.expose())])
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        warn!("Google speech returned {}: {}", status, text);
        return Err(SpeechError::RecognitionService(format!(
            "Google speech recognition failed (status {}): {}",
            status.as_u16(),
            text
        )));
    }

    let parsed: RecognizeResponse = serde_json::from_str(&text).map_err(|e| {
        SpeechError::RecognitionService(format!("Malformed recognition response: {e}"))
    })?;

    let transcript = parsed
        .results
        .into_iter()
        .filter_map(|r| r.alternatives.into_iter().next())
        .map(|a| a.transcript.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if transcript.is_empty() {
        return Err(SpeechError::NoSpeechDetected);
    }
    Ok(transcript)
}
