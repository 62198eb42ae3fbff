//! Question / greeting / follow-up generation.
//!
//! Flow: build provider prompt → one LLM call per leg → parse.
//! The greeting variant issues two calls (greeting, then questions). They are not
//! atomic: if either leg fails or comes back empty, the whole operation fails and
//! the other leg's result is discarded.

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::credentials::ProviderKey;
use crate::interview::parser::{parse_follow_up, parse_greeting, parse_questions, ParseError};
use crate::interview::prompts::{
    FOLLOW_UP_PROMPT_TEMPLATE, GOOGLE_JSON_REMINDER, GREETING_PROMPT_TEMPLATE,
    QUESTIONS_PROMPT_TEMPLATE,
};
use crate::interview::session::ConversationTurn;
use crate::interview::JobDescription;
use crate::llm_client::prompts::PLAIN_TEXT_INSTRUCTION;
use crate::llm_client::{LlmClient, LlmError};
use crate::providers::Provider;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Content produced when an interview starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratedContent {
    Questions(Vec<String>),
    GreetingAndQuestions {
        greeting: String,
        questions: Vec<String>,
    },
}

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("{provider} generation failed (status {status}): {detail}")]
    Upstream {
        provider: Provider,
        status: u16,
        detail: String,
    },

    #[error("{provider} returned empty content")]
    Empty { provider: Provider },

    #[error("{provider} returned a malformed response: {detail}")]
    Malformed { provider: Provider, detail: String },

    #[error("Connection error while contacting {provider}: {detail}")]
    Connection { provider: Provider, detail: String },

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl GenerationError {
    pub fn from_llm(provider: Provider, error: LlmError) -> Self {
        match error {
            LlmError::Connection(e) => GenerationError::Connection {
                provider,
                detail: e.without_url().to_string(),
            },
            LlmError::Api { status, message } => GenerationError::Upstream {
                provider,
                status,
                detail: message,
            },
            LlmError::Parse(e) => GenerationError::Malformed {
                provider,
                detail: e.to_string(),
            },
            LlmError::EmptyContent(provider) => GenerationError::Empty { provider },
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// The generator seam. `InterviewService` holds an `Arc<dyn InterviewGenerator>`.
#[async_trait]
pub trait InterviewGenerator: Send + Sync {
    /// One request: up to 8 questions.
    async fn questions(
        &self,
        key: &ProviderKey,
        job_description: &JobDescription,
    ) -> Result<Vec<String>, GenerationError>;

    /// Two requests: greeting, then questions.
    async fn greeting_and_questions(
        &self,
        key: &ProviderKey,
        job_description: &JobDescription,
    ) -> Result<GeneratedContent, GenerationError>;

    /// One request: the next question, conditioned on recent history.
    async fn follow_up(
        &self,
        key: &ProviderKey,
        job_description: &JobDescription,
        planned_topics: &[String],
        context: &[ConversationTurn],
    ) -> Result<String, GenerationError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LLM-backed generator
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmInterviewGenerator {
    llm: LlmClient,
}

impl LlmInterviewGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    async fn call(&self, key: &ProviderKey, prompt: &str) -> Result<String, GenerationError> {
        self.llm
            .complete(key, prompt)
            .await
            .map_err(|e| GenerationError::from_llm(key.provider, e))
    }
}

#[async_trait]
impl InterviewGenerator for LlmInterviewGenerator {
    async fn questions(
        &self,
        key: &ProviderKey,
        job_description: &JobDescription,
    ) -> Result<Vec<String>, GenerationError> {
        let prompt = build_questions_prompt(key.provider, job_description);
        let raw = self.call(key, &prompt).await?;
        let questions = parse_questions(&raw)?;
        info!(
            "Generated {} questions with {}",
            questions.len(),
            key.provider
        );
        Ok(questions)
    }

    async fn greeting_and_questions(
        &self,
        key: &ProviderKey,
        job_description: &JobDescription,
    ) -> Result<GeneratedContent, GenerationError> {
        let raw_greeting = self
            .call(key, &build_greeting_prompt(job_description))
            .await?;
        let greeting = parse_greeting(&raw_greeting)?;

        let questions = self.questions(key, job_description).await?;

        Ok(GeneratedContent::GreetingAndQuestions {
            greeting,
            questions,
        })
    }

    async fn follow_up(
        &self,
        key: &ProviderKey,
        job_description: &JobDescription,
        planned_topics: &[String],
        context: &[ConversationTurn],
    ) -> Result<String, GenerationError> {
        let prompt = build_follow_up_prompt(job_description, planned_topics, context);
        let raw = self.call(key, &prompt).await?;
        Ok(parse_follow_up(&raw)?)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Prompt construction
// ────────────────────────────────────────────────────────────────────────────

pub fn build_questions_prompt(provider: Provider, job_description: &JobDescription) -> String {
    let prompt = fill_template(
        QUESTIONS_PROMPT_TEMPLATE,
        &[("{job_description}", job_description.as_str())],
    );
    match provider {
        Provider::OpenAI => prompt,
        Provider::Google => prompt + GOOGLE_JSON_REMINDER,
    }
}

pub fn build_greeting_prompt(job_description: &JobDescription) -> String {
    fill_template(
        GREETING_PROMPT_TEMPLATE,
        &[
            ("{plain_text_instruction}", PLAIN_TEXT_INSTRUCTION),
            ("{job_description}", job_description.as_str()),
        ],
    )
}

pub fn build_follow_up_prompt(
    job_description: &JobDescription,
    planned_topics: &[String],
    context: &[ConversationTurn],
) -> String {
    let topics = if planned_topics.is_empty() {
        "- (none; choose topics from the job description)".to_string()
    } else {
        planned_topics
            .iter()
            .map(|t| format!("- {t}"))
            .collect::<Vec<_>>()
            .join("\n")
    };
    let history = context
        .iter()
        .map(ConversationTurn::transcript_line)
        .collect::<Vec<_>>()
        .join("\n");

    fill_template(
        FOLLOW_UP_PROMPT_TEMPLATE,
        &[
            ("{plain_text_instruction}", PLAIN_TEXT_INSTRUCTION),
            ("{job_description}", job_description.as_str()),
            ("{planned_topics}", &topics),
            ("{history}", &history),
        ],
    )
}

/// Substitutes placeholders in one pass over the template, so placeholder-like
/// text inside a substituted value is left as written.
fn fill_template(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match values.iter().find(|(placeholder, _)| tail.starts_with(placeholder)) {
            Some((placeholder, value)) => {
                out.push_str(value);
                rest = &tail[placeholder.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
