use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::credentials::CredentialError;
use crate::interview::generator::GenerationError;
use crate::interview::session::SessionError;
use crate::speech::SpeechError;

/// Application-level error type.
/// Implements `IntoResponse` so every failure surfaces as a one-shot notification
/// at the action that triggered it. Nothing is retried server-side.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Speech(#[from] SpeechError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("A recording is already being processed")]
    ListenInProgress,

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// HTTP status plus the stable machine-readable code sent to the client.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Credential(CredentialError::Missing(_)) => {
                (StatusCode::PRECONDITION_FAILED, "CREDENTIAL_MISSING")
            }
            AppError::Credential(CredentialError::Empty) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            AppError::Credential(_) => (StatusCode::INTERNAL_SERVER_ERROR, "CREDENTIAL_STORE_ERROR"),
            AppError::Generation(GenerationError::Parse(_)) => {
                (StatusCode::BAD_GATEWAY, "PARSE_ERROR")
            }
            AppError::Generation(GenerationError::Connection { .. }) => {
                (StatusCode::BAD_GATEWAY, "CONNECTION_ERROR")
            }
            AppError::Generation(_) => (StatusCode::BAD_GATEWAY, "GENERATION_ERROR"),
            AppError::Speech(SpeechError::NoSpeechDetected) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "NO_SPEECH_DETECTED")
            }
            AppError::Speech(SpeechError::RecognitionService(_)) => {
                (StatusCode::BAD_GATEWAY, "RECOGNITION_SERVICE_ERROR")
            }
            AppError::Speech(SpeechError::Transport(_)) => {
                (StatusCode::GATEWAY_TIMEOUT, "TRANSPORT_ERROR")
            }
            AppError::Session(SessionError::GreetingPending) => {
                (StatusCode::CONFLICT, "GREETING_PENDING")
            }
            AppError::Session(SessionError::Complete) => (StatusCode::CONFLICT, "SESSION_COMPLETE"),
            AppError::Session(SessionError::EmptyAnswer) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "NO_SPEECH_DETECTED")
            }
            AppError::Session(SessionError::Stale) => (StatusCode::CONFLICT, "SESSION_CHANGED"),
            AppError::ListenInProgress => (StatusCode::CONFLICT, "LISTEN_IN_PROGRESS"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        let message = match &self {
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                "An internal server error occurred".to_string()
            }
            AppError::Credential(CredentialError::Io(_) | CredentialError::Format(_)) => {
                tracing::error!("Credential store error: {self}");
                "The credential store could not be read or written".to_string()
            }
            other if status.is_server_error() => {
                tracing::warn!("{code}: {other}");
                other.to_string()
            }
            other => other.to_string(),
        };

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}
