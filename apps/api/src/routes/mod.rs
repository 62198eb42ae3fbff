pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};

use crate::credentials::handlers as credentials;
use crate::interview::handlers as interview;
use crate::state::AppState;

/// Upper bound on an uploaded utterance (about five minutes of 16 kHz mono PCM).
const MAX_AUDIO_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Credentials
        .route(
            "/api/v1/credentials/:provider",
            put(credentials::handle_update_key),
        )
        .route(
            "/api/v1/credentials/:provider/verify",
            post(credentials::handle_verify_key),
        )
        // Interview session
        .route(
            "/api/v1/interview",
            post(interview::handle_start)
                .get(interview::handle_get)
                .delete(interview::handle_close),
        )
        .route(
            "/api/v1/interview/greeting",
            post(interview::handle_greeting),
        )
        .route(
            "/api/v1/interview/listen",
            post(interview::handle_listen).layer(DefaultBodyLimit::max(MAX_AUDIO_UPLOAD_BYTES)),
        )
        .with_state(state)
}
