mod config;
mod credentials;
mod errors;
mod interview;
mod llm_client;
mod providers;
mod routes;
mod speech;
mod state;
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::credentials::{CredentialStore, FileCredentialStore};
use crate::interview::generator::LlmInterviewGenerator;
use crate::interview::service::InterviewService;
use crate::llm_client::LlmClient;
use crate::providers::ProviderTable;
use crate::routes::build_router;
use crate::speech::ProviderTranscriber;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Rehearsal v{}", env!("CARGO_PKG_VERSION"));

    // Provider endpoints are fixed for the life of the process
    let providers = Arc::new(ProviderTable::from_config(&config));
    let http = providers
        .http_client()
        .context("failed to build HTTP client")?;

    let file_store = match &config.credentials_path {
        Some(path) => FileCredentialStore::new(path.clone()),
        None => FileCredentialStore::at_default_location()?,
    };
    info!("Credential store at {}", file_store.path().display());
    let credentials: Arc<dyn CredentialStore> = Arc::new(file_store);

    let llm = LlmClient::new(http.clone(), Arc::clone(&providers));
    info!(
        "LLM client initialized (OpenAI: {}, Google: {})",
        providers.openai.chat_model, providers.google.model
    );

    let interviews = InterviewService::new(
        Arc::new(LlmInterviewGenerator::new(llm.clone())),
        Arc::new(ProviderTranscriber::new(http, Arc::clone(&providers))),
        Arc::clone(&credentials),
        config.turn_budget,
        config.capture_timeout,
    );
    info!(
        "Interview service ready (turn budget {}, capture timeout {}s)",
        config.turn_budget,
        config.capture_timeout.as_secs()
    );

    let state = AppState {
        llm,
        credentials,
        interviews: Arc::new(interviews),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
