use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};

use crate::errors::AppError;
use crate::interview::service::{ListenOutcome, StartInterviewRequest};
use crate::interview::session::SessionView;
use crate::state::AppState;

/// Multipart field carrying the recorded WAV utterance.
const AUDIO_FIELD: &str = "audio";

/// POST /api/v1/interview
pub async fn handle_start(
    State(state): State<AppState>,
    Json(req): Json<StartInterviewRequest>,
) -> Result<(StatusCode, Json<SessionView>), AppError> {
    let view = state.interviews.start(req).await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// GET /api/v1/interview
pub async fn handle_get(State(state): State<AppState>) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.interviews.current().await?))
}

/// POST /api/v1/interview/greeting
pub async fn handle_greeting(
    State(state): State<AppState>,
) -> Result<Json<SessionView>, AppError> {
    Ok(Json(state.interviews.present_greeting().await?))
}

/// POST /api/v1/interview/listen
pub async fn handle_listen(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ListenOutcome>, AppError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart body: {e}")))?
    {
        if field.name() != Some(AUDIO_FIELD) {
            continue;
        }
        let audio = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Could not read audio upload: {e}")))?;
        let outcome = state.interviews.listen(audio).await?;
        return Ok(Json(outcome));
    }

    Err(AppError::Validation(format!(
        "Missing '{AUDIO_FIELD}' field with the recorded WAV utterance"
    )))
}

/// DELETE /api/v1/interview
pub async fn handle_close(State(state): State<AppState>) -> StatusCode {
    state.interviews.close().await;
    StatusCode::NO_CONTENT
}
