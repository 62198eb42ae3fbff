use std::sync::Arc;

use crate::credentials::CredentialStore;
use crate::interview::service::InterviewService;
use crate::llm_client::LlmClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub llm: LlmClient,
    /// Provider API keys. File-backed in production.
    pub credentials: Arc<dyn CredentialStore>,
    /// Owns the single active interview and its listen discipline.
    pub interviews: Arc<InterviewService>,
}
