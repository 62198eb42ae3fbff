use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::credentials::{self, Credential, ProviderKey};
use crate::errors::AppError;
use crate::interview::generator::GenerationError;
use crate::providers::Provider;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpdateKeyRequest {
    pub api_key: String,
}

#[derive(Deserialize, Default)]
pub struct VerifyKeyRequest {
    /// Key to test. When absent the stored key is verified.
    pub api_key: Option<String>,
}

#[derive(Serialize)]
pub struct VerifyKeyResponse {
    pub provider: Provider,
    pub valid: bool,
}

fn parse_provider(raw: &str) -> Result<Provider, AppError> {
    raw.parse()
        .map_err(|e: crate::providers::UnknownProvider| AppError::Validation(e.to_string()))
}

/// PUT /api/v1/credentials/:provider
pub async fn handle_update_key(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    Json(req): Json<UpdateKeyRequest>,
) -> Result<StatusCode, AppError> {
    let provider = parse_provider(&provider)?;
    let credential = Credential::new(req.api_key)?;
    state.credentials.set(provider, &credential)?;
    info!("API key for {provider} updated");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/credentials/:provider/verify
pub async fn handle_verify_key(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    body: Option<Json<VerifyKeyRequest>>,
) -> Result<Json<VerifyKeyResponse>, AppError> {
    let provider = parse_provider(&provider)?;
    let req = body.map(|Json(req)| req).unwrap_or_default();

    let credential = match req.api_key {
        Some(key) => Credential::new(key)?,
        None => credentials::require(state.credentials.as_ref(), provider)?,
    };

    state
        .llm
        .verify_key(&ProviderKey::new(provider, credential))
        .await
        .map_err(|e| GenerationError::from_llm(provider, e))?;

    info!("API key for {provider} verified");
    Ok(Json(VerifyKeyResponse {
        provider,
        valid: true,
    }))
}
