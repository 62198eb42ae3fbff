// Interview orchestration: question generation, response parsing, the
// conversation state machine, and the service that runs listen turns.
// All LLM calls go through llm_client; all speech calls go through speech.

pub mod generator;
pub mod handlers;
pub mod parser;
pub mod prompts;
pub mod service;
pub mod session;

use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
#[error("Please enter a job description")]
pub struct EmptyJobDescription;

/// Free-form job description text. Immutable once a session starts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDescription(String);

impl JobDescription {
    pub fn new(text: impl Into<String>) -> Result<Self, EmptyJobDescription> {
        let text = text.into().trim().to_string();
        if text.is_empty() {
            return Err(EmptyJobDescription);
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
