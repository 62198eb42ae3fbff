//! Test helpers: local stub servers for provider endpoints and scripted
//! generator / transcriber doubles.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use crate::credentials::ProviderKey;
use crate::interview::generator::{GeneratedContent, GenerationError, InterviewGenerator};
use crate::interview::session::ConversationTurn;
use crate::interview::JobDescription;
use crate::providers::{
    GoogleEndpoints, OpenAiEndpoints, ProviderTable, DEFAULT_SPEECH_LANGUAGE,
    GOOGLE_MODEL, OPENAI_CHAT_MODEL, OPENAI_TRANSCRIPTION_MODEL,
};
use crate::speech::{SpeechError, Transcriber, Utterance};

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_stub(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Provider table pointing every endpoint at a stub server under `base`.
pub fn table_for(base: &str) -> ProviderTable {
    ProviderTable {
        openai: OpenAiEndpoints {
            chat_url: format!("{base}/openai/chat"),
            audio_url: format!("{base}/openai/audio"),
            models_url: format!("{base}/openai/models"),
            chat_model: OPENAI_CHAT_MODEL.to_string(),
            transcription_model: OPENAI_TRANSCRIPTION_MODEL.to_string(),
        },
        google: GoogleEndpoints {
            api_base: format!("{base}/google"),
            model: GOOGLE_MODEL.to_string(),
            speech_url: format!("{base}/google/speech"),
        },
        speech_language: DEFAULT_SPEECH_LANGUAGE.to_string(),
        http_timeout: Duration::from_secs(5),
    }
}

/// Provider table whose endpoints refuse connections.
pub async fn unreachable_table() -> ProviderTable {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    table_for(&format!("http://{addr}"))
}

// ────────────────────────────────────────────────────────────────────────────
// Generator double
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct ScriptedGenerator {
    pub questions: Vec<String>,
    pub greeting: Option<String>,
    /// Follow-up replies in order. `None` entries fail the call.
    pub follow_ups: Mutex<Vec<Option<String>>>,
    pub follow_up_calls: AtomicUsize,
    pub fail_questions: bool,
}

impl ScriptedGenerator {
    pub fn with_questions(n: usize) -> Self {
        Self {
            questions: (1..=n).map(|i| format!("Question {i}?")).collect(),
            ..Self::default()
        }
    }

    pub fn follow_up_calls(&self) -> usize {
        self.follow_up_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InterviewGenerator for ScriptedGenerator {
    async fn questions(
        &self,
        key: &ProviderKey,
        _job_description: &JobDescription,
    ) -> Result<Vec<String>, GenerationError> {
        if self.fail_questions {
            return Err(GenerationError::Upstream {
                provider: key.provider,
                status: 401,
                detail: "Incorrect API key provided".to_string(),
            });
        }
        Ok(self.questions.clone())
    }

    async fn greeting_and_questions(
        &self,
        key: &ProviderKey,
        job_description: &JobDescription,
    ) -> Result<GeneratedContent, GenerationError> {
        let questions = self.questions(key, job_description).await?;
        Ok(GeneratedContent::GreetingAndQuestions {
            greeting: self
                .greeting
                .clone()
                .unwrap_or_else(|| "Welcome!".to_string()),
            questions,
        })
    }

    async fn follow_up(
        &self,
        key: &ProviderKey,
        _job_description: &JobDescription,
        _planned_topics: &[String],
        context: &[ConversationTurn],
    ) -> Result<String, GenerationError> {
        let call = self.follow_up_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = {
            let mut replies = self.follow_ups.lock().unwrap();
            if replies.is_empty() {
                None
            } else {
                Some(replies.remove(0))
            }
        };
        match scripted {
            Some(Some(question)) => Ok(question),
            Some(None) => Err(GenerationError::Connection {
                provider: key.provider,
                detail: "connection reset".to_string(),
            }),
            None => Ok(format!(
                "Follow-up {} on: {}",
                call + 1,
                context.last().map(|t| t.text.as_str()).unwrap_or_default()
            )),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transcriber doubles
// ────────────────────────────────────────────────────────────────────────────

/// Returns each scripted transcript in turn, then repeats the last one.
pub struct ScriptedTranscriber {
    transcripts: Mutex<Vec<String>>,
    pub calls: AtomicUsize,
}

impl ScriptedTranscriber {
    pub fn new<I, S>(transcripts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            transcripts: Mutex::new(transcripts.into_iter().map(Into::into).collect()),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _: &ProviderKey, _: &Utterance) -> Result<String, SpeechError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut transcripts = self.transcripts.lock().unwrap();
        match transcripts.len() {
            0 => Err(SpeechError::NoSpeechDetected),
            1 => Ok(transcripts[0].clone()),
            _ => Ok(transcripts.remove(0)),
        }
    }
}

/// Blocks until released, so a listen unit can be held in flight.
#[derive(Default)]
pub struct GatedTranscriber {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl Transcriber for GatedTranscriber {
    async fn transcribe(&self, _: &ProviderKey, _: &Utterance) -> Result<String, SpeechError> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok("I finally answered".to_string())
    }
}

