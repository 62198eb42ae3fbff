//! OpenAI transcription: multipart POST of the WAV file to `/v1/audio/transcriptions`.

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use super::{SpeechError, Utterance};
use crate::credentials::ProviderKey;
use crate::providers::OpenAiEndpoints;

const UPLOAD_FILE_NAME: &str = "audio.wav";

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    #[serde(default)]
    text: String,
}

pub async fn transcribe(
    client: &Client,
    endpoints: &OpenAiEndpoints,
    key: &ProviderKey,
    utterance: &Utterance,
) -> Result<String, SpeechError> {
    let file = Part::bytes(utterance.wav_bytes().to_vec())
        .file_name(UPLOAD_FILE_NAME)
        .mime_str("audio/wav")
        .map_err(|e| SpeechError::RecognitionService(format!("Invalid upload part: {e}")))?;
    let form = Form::new()
        .part("file", file)
        .text("model", endpoints.transcription_model.clone());

    let response = client
        .post(&endpoints.audio_url)
        .bearer_auth(key.credential.expose())
        .multipart(form)
        .send()
        .await?;

    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        warn!("OpenAI transcription returned {}: {}", status, body);
        return Err(SpeechError::RecognitionService(format!(
            "OpenAI transcription failed (status {}): {}",
            status.as_u16(),
            body
        )));
    }

    let parsed: TranscriptionResponse = serde_json::from_str(&body).map_err(|e| {
        SpeechError::RecognitionService(format!("Malformed transcription response: {e}"))
    })?;
    Ok(parsed.text)
}
