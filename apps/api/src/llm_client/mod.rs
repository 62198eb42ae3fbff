//! LLM Client: the single point of entry for all text-generation calls in Rehearsal.
//!
//! ARCHITECTURAL RULE: No other module may call a provider's generation API directly.
//! All LLM interactions MUST go through this module.
//!
//! OpenAI: chat completions, bearer token. Google: `generateContent`, key passed inline
//! as the `key` query parameter. One request per call, never retried.
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::credentials::ProviderKey;
use crate::providers::{Provider, ProviderTable};

pub mod prompts;

const OPENAI_TEMPERATURE: f32 = 0.7;
const VERIFY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Connection error: {0}")]
    Connection(reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("{0} returned empty content")]
    EmptyContent(Provider),
}

// Google keys travel in the query string, so request URLs never reach error text.
impl From<reqwest::Error> for LlmError {
    fn from(e: reqwest::Error) -> Self {
        LlmError::Connection(e.without_url())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// OpenAI wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Google wire types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

/// Both providers wrap failures as `{"error": {"message": ...}}`.
#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    providers: Arc<ProviderTable>,
}

impl LlmClient {
    pub fn new(client: Client, providers: Arc<ProviderTable>) -> Self {
        Self { client, providers }
    }

    /// Sends one prompt to the key's provider and returns the text reply.
    pub async fn complete(&self, key: &ProviderKey, prompt: &str) -> Result<String, LlmError> {
        let text = match key.provider {
            Provider::OpenAI => self.complete_openai(key, prompt).await?,
            Provider::Google => self.complete_google(key, prompt).await?,
        };

        if text.trim().is_empty() {
            return Err(LlmError::EmptyContent(key.provider));
        }

        debug!("{} raw response: {}", key.provider, text);
        Ok(text)
    }

    async fn complete_openai(&self, key: &ProviderKey, prompt: &str) -> Result<String, LlmError> {
        let endpoints = &self.providers.openai;
        let body = ChatRequest {
            model: &endpoints.chat_model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: OPENAI_TEMPERATURE,
        };

        let response = self
            .client
            .post(&endpoints.chat_url)
            .bearer_auth(key.credential.expose())
            .json(&body)
            .send()
            .await?;

        let body = success_body(response).await?;
        let parsed: ChatResponse = serde_json::from_str(&body)?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default())
    }

    async fn complete_google(&self, key: &ProviderKey, prompt: &str) -> Result<String, LlmError> {
        let body = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(self.providers.google.generate_content_url())
            .query(&[("key", key.credential.expose())])
            .json(&body)
            .send()
            .await?;

        let body = success_body(response).await?;
        let parsed: GenerateContentResponse = serde_json::from_str(&body)?;

        Ok(parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default())
    }

    /// Checks that the key is accepted by its provider.
    ///
    /// OpenAI: lists models. Google: runs a one-line test prompt and requires a reply.
    pub async fn verify_key(&self, key: &ProviderKey) -> Result<(), LlmError> {
        match key.provider {
            Provider::OpenAI => {
                let response = self
                    .client
                    .get(&self.providers.openai.models_url)
                    .bearer_auth(key.credential.expose())
                    .timeout(VERIFY_TIMEOUT)
                    .send()
                    .await?;
                success_body(response).await.map(|_| ())
            }
            Provider::Google => self
                .complete(key, prompts::KEY_VERIFICATION_PROMPT)
                .await
                .map(|_| ()),
        }
    }
}

/// Returns the body of a 2xx response, or an `Api` error carrying the upstream detail.
async fn success_body(response: Response) -> Result<String, LlmError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return Ok(body);
    }

    warn!("LLM API returned {}: {}", status, body);
    let message = serde_json::from_str::<ApiErrorEnvelope>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);
    Err(LlmError::Api {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use super::*;
    use crate::credentials::Credential;
    use crate::test_support::{spawn_stub, table_for, unreachable_table};

    type Captured = Arc<Mutex<Vec<(HeaderMap, Value)>>>;

    fn openai_key() -> ProviderKey {
        ProviderKey::new(Provider::OpenAI, Credential::new("sk-test").unwrap())
    }

    fn google_key() -> ProviderKey {
        ProviderKey::new(Provider::Google, Credential::new("g-test").unwrap())
    }

    async fn client_for(router: Router) -> LlmClient {
        let base = spawn_stub(router).await;
        let table = table_for(&base);
        LlmClient::new(table.http_client().unwrap(), Arc::new(table))
    }

    #[tokio::test]
    async fn test_openai_sends_bearer_and_returns_first_choice() {
        let captured: Captured = Arc::default();
        let router = Router::new()
            .route(
                "/openai/chat",
                post(
                    |State(seen): State<Captured>, headers: HeaderMap, Json(body): Json<Value>| async move {
                        seen.lock().unwrap().push((headers, body));
                        Json(json!({
                            "choices": [{"message": {"role": "assistant", "content": "[\"Q1?\"]"}}]
                        }))
                    },
                ),
            )
            .with_state(captured.clone());

        let llm = client_for(router).await;
        let text = llm.complete(&openai_key(), "Generate").await.unwrap();
        assert_eq!(text, "[\"Q1?\"]");

        let seen = captured.lock().unwrap();
        let (headers, body) = &seen[0];
        assert_eq!(headers["authorization"], "Bearer sk-test");
        assert_eq!(body["model"], "gpt-3.5-turbo");
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "Generate");
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_openai_error_carries_status_and_upstream_message() {
        let router = Router::new().route(
            "/openai/chat",
            post(|| async {
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({"error": {"message": "Incorrect API key provided"}})),
                )
            }),
        );

        let llm = client_for(router).await;
        let err = llm.complete(&openai_key(), "Generate").await.unwrap_err();
        match err {
            LlmError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_openai_error_falls_back_to_raw_body() {
        let router = Router::new().route(
            "/openai/chat",
            post(|| async { (StatusCode::BAD_GATEWAY, "upstream exploded") }),
        );

        let llm = client_for(router).await;
        let err = llm.complete(&openai_key(), "Generate").await.unwrap_err();
        assert!(matches!(
            err,
            LlmError::Api { status: 502, ref message } if message == "upstream exploded"
        ));
    }

    #[tokio::test]
    async fn test_google_passes_key_inline_and_joins_parts() {
        let captured: Captured = Arc::default();
        let router = Router::new()
            .route(
                "/google/models/*action",
                post(
                    |State(seen): State<Captured>,
                     Query(query): Query<std::collections::HashMap<String, String>>,
                     headers: HeaderMap,
                     Json(body): Json<Value>| async move {
                        assert_eq!(query.get("key").map(String::as_str), Some("g-test"));
                        seen.lock().unwrap().push((headers, body));
                        Json(json!({
                            "candidates": [{"content": {"parts": [{"text": "Hello "}, {"text": "there"}]}}]
                        }))
                    },
                ),
            )
            .with_state(captured.clone());

        let llm = client_for(router).await;
        let text = llm.complete(&google_key(), "Greet").await.unwrap();
        assert_eq!(text, "Hello there");

        let seen = captured.lock().unwrap();
        let (headers, body) = &seen[0];
        assert!(headers.get("authorization").is_none());
        assert_eq!(body["contents"][0]["parts"][0]["text"], "Greet");
    }

    #[tokio::test]
    async fn test_google_without_candidates_is_empty_content() {
        let router = Router::new().route(
            "/google/models/*action",
            post(|| async { Json(json!({"candidates": []})) }),
        );

        let llm = client_for(router).await;
        let err = llm.complete(&google_key(), "Greet").await.unwrap_err();
        assert!(matches!(err, LlmError::EmptyContent(Provider::Google)));
    }

    #[tokio::test]
    async fn test_malformed_success_body_is_parse_error() {
        let router = Router::new().route("/openai/chat", post(|| async { "<html>oops</html>" }));

        let llm = client_for(router).await;
        let err = llm.complete(&openai_key(), "Generate").await.unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connection_error() {
        let table = unreachable_table().await;
        let llm = LlmClient::new(table.http_client().unwrap(), Arc::new(table));
        let err = llm.complete(&openai_key(), "Generate").await.unwrap_err();
        assert!(matches!(err, LlmError::Connection(_)));
    }

    #[tokio::test]
    async fn test_connection_error_does_not_carry_google_key() {
        use axum::body::to_bytes;
        use axum::response::IntoResponse;

        use crate::errors::AppError;
        use crate::interview::generator::GenerationError;

        let table = unreachable_table().await;
        let llm = LlmClient::new(table.http_client().unwrap(), Arc::new(table));
        let key = ProviderKey::new(
            Provider::Google,
            Credential::new("SECRET-GOOGLE-KEY").unwrap(),
        );

        let err = llm.complete(&key, "Generate").await.unwrap_err();
        assert!(!err.to_string().contains("SECRET-GOOGLE-KEY"));
        assert!(!format!("{err:?}").contains("SECRET-GOOGLE-KEY"));

        let app_error = AppError::from(GenerationError::from_llm(Provider::Google, err));
        assert!(!app_error.to_string().contains("SECRET-GOOGLE-KEY"));

        let response = app_error.into_response();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(!String::from_utf8_lossy(&body).contains("SECRET-GOOGLE-KEY"));
    }

    #[tokio::test]
    async fn test_verify_openai_key_lists_models() {
        let router = Router::new().route(
            "/openai/models",
            get(|headers: HeaderMap| async move {
                if headers["authorization"] == "Bearer sk-test" {
                    (StatusCode::OK, Json(json!({"data": []})))
                } else {
                    (StatusCode::UNAUTHORIZED, Json(json!({"error": {"message": "bad key"}})))
                }
            }),
        );

        let llm = client_for(router).await;
        llm.verify_key(&openai_key()).await.unwrap();

        let wrong = ProviderKey::new(Provider::OpenAI, Credential::new("sk-wrong").unwrap());
        let err = llm.verify_key(&wrong).await.unwrap_err();
        assert!(matches!(err, LlmError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_verify_google_key_runs_test_prompt() {
        let router = Router::new().route(
            "/google/models/*action",
            post(|Json(body): Json<Value>| async move {
                assert_eq!(
                    body["contents"][0]["parts"][0]["text"],
                    "Generate one test question"
                );
                Json(json!({"candidates": [{"content": {"parts": [{"text": "What is Rust?"}]}}]}))
            }),
        );

        let llm = client_for(router).await;
        llm.verify_key(&google_key()).await.unwrap();
    }
}
