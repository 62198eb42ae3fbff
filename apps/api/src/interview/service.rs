//! Interview service: owns the active session and runs listen turns.
//!
//! One session is active per process; starting a new interview replaces it.
//! At most one listen unit (transcribe, plan, resolve the next question, commit) is
//! in flight at a time. A unit runs on its own task and finishes even when the
//! caller stops waiting for it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::credentials::{self, CredentialStore, ProviderKey};
use crate::errors::AppError;
use crate::interview::generator::{GeneratedContent, InterviewGenerator};
use crate::interview::session::{
    InterviewSession, InterviewVariant, NextStep, NextTurn, SessionView,
};
use crate::interview::JobDescription;
use crate::providers::Provider;
use crate::speech::{capture_and_transcribe, SpeechGate, Transcriber};

#[derive(Debug, Deserialize)]
pub struct StartInterviewRequest {
    pub provider: Provider,
    pub job_description: String,
    #[serde(default)]
    pub variant: InterviewVariant,
}

/// Result of one listen action: what was heard and the session afterwards.
#[derive(Debug, Serialize)]
pub struct ListenOutcome {
    pub transcript: String,
    pub session: SessionView,
}

struct ActiveSession {
    session: Mutex<InterviewSession>,
    listening: AtomicBool,
}

impl ActiveSession {
    fn new(session: InterviewSession) -> Self {
        Self {
            session: Mutex::new(session),
            listening: AtomicBool::new(false),
        }
    }

    fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }

    /// Claims the in-flight slot. The returned guard releases it on drop.
    fn claim(self: &Arc<Self>) -> Option<ListenGuard> {
        self.listening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| ListenGuard(Arc::clone(self)))
    }

    async fn view(&self) -> SessionView {
        self.session.lock().await.view(self.is_listening())
    }
}

struct ListenGuard(Arc<ActiveSession>);

impl Drop for ListenGuard {
    fn drop(&mut self) {
        self.0.listening.store(false, Ordering::SeqCst);
    }
}

pub struct InterviewService {
    generator: Arc<dyn InterviewGenerator>,
    transcriber: Arc<dyn Transcriber>,
    credentials: Arc<dyn CredentialStore>,
    turn_budget: usize,
    capture_timeout: Duration,
    gate: SpeechGate,
    active: RwLock<Option<Arc<ActiveSession>>>,
}

impl InterviewService {
    pub fn new(
        generator: Arc<dyn InterviewGenerator>,
        transcriber: Arc<dyn Transcriber>,
        credentials: Arc<dyn CredentialStore>,
        turn_budget: usize,
        capture_timeout: Duration,
    ) -> Self {
        Self {
            generator,
            transcriber,
            credentials,
            turn_budget,
            capture_timeout,
            gate: SpeechGate::default(),
            active: RwLock::new(None),
        }
    }

    /// Validates input, loads the provider key, generates content and installs
    /// a fresh session in `Greeting`. Nothing is replaced if any step fails.
    pub async fn start(&self, request: StartInterviewRequest) -> Result<SessionView, AppError> {
        let job_description = JobDescription::new(request.job_description)
            .map_err(|e| AppError::Validation(e.to_string()))?;
        let credential = credentials::require(self.credentials.as_ref(), request.provider)?;
        let key = ProviderKey::new(request.provider, credential);

        info!(
            "Starting {:?} interview with {}",
            request.variant, request.provider
        );
        let content = match request.variant {
            InterviewVariant::Scripted => {
                GeneratedContent::Questions(self.generator.questions(&key, &job_description).await?)
            }
            InterviewVariant::Conversational => {
                self.generator
                    .greeting_and_questions(&key, &job_description)
                    .await?
            }
        };

        let session = InterviewSession::new(
            key,
            job_description,
            request.variant,
            content,
            self.turn_budget,
        );
        let view = session.view(false);

        let previous = self
            .active
            .write()
            .await
            .replace(Arc::new(ActiveSession::new(session)));
        if previous.is_some() {
            debug!("Replaced the previously active interview");
        }
        info!("Interview {} ready", view.id);
        Ok(view)
    }

    pub async fn current(&self) -> Result<SessionView, AppError> {
        Ok(self.active_session().await?.view().await)
    }

    /// Displays the greeting. Repeated calls leave the session unchanged.
    pub async fn present_greeting(&self) -> Result<SessionView, AppError> {
        let active = self.active_session().await?;
        let mut session = active.session.lock().await;
        if session.present_greeting() {
            info!("Interview {} greeting presented", session.id());
        }
        Ok(session.view(active.is_listening()))
    }

    /// Drops the active session. Returns false when none was open.
    pub async fn close(&self) -> bool {
        let closed = self.active.write().await.take();
        if closed.is_some() {
            info!("Interview closed");
        }
        closed.is_some()
    }

    /// Runs one listen unit against the uploaded utterance.
    pub async fn listen(&self, upload: Bytes) -> Result<ListenOutcome, AppError> {
        let active = self.active_session().await?;
        let guard = active.claim().ok_or(AppError::ListenInProgress)?;

        let key = {
            let session = active.session.lock().await;
            session.ensure_accepts_answers()?;
            debug!("Listening for interview {} in {:?}", session.id(), session.state());
            session.key().clone()
        };

        let unit = ListenUnit {
            active: Arc::clone(&active),
            generator: Arc::clone(&self.generator),
            transcriber: Arc::clone(&self.transcriber),
            gate: self.gate.clone(),
            capture_timeout: self.capture_timeout,
            key,
        };

        tokio::spawn(async move {
            let _guard = guard;
            unit.run(upload).await
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("listen task failed: {e}")))?
    }

    async fn active_session(&self) -> Result<Arc<ActiveSession>, AppError> {
        self.active
            .read()
            .await
            .clone()
            .ok_or_else(|| AppError::NotFound("No interview in progress".to_string()))
    }
}

/// Everything a spawned listen task owns.
struct ListenUnit {
    active: Arc<ActiveSession>,
    generator: Arc<dyn InterviewGenerator>,
    transcriber: Arc<dyn Transcriber>,
    gate: SpeechGate,
    capture_timeout: Duration,
    key: ProviderKey,
}

impl ListenUnit {
    async fn run(self, upload: Bytes) -> Result<ListenOutcome, AppError> {
        let transcript = capture_and_transcribe(
            self.transcriber.as_ref(),
            &self.key,
            upload,
            &self.gate,
            self.capture_timeout,
        )
        .await?;

        let (plan, job_description, topics) = {
            let session = self.active.session.lock().await;
            let plan = session.plan_answer(&transcript)?;
            (
                plan,
                session.job_description().clone(),
                session.planned_questions().to_vec(),
            )
        };

        let next = match &plan.step {
            NextStep::Complete => NextTurn::Complete,
            NextStep::Ask(question) => NextTurn::Question(question.clone()),
            NextStep::FollowUp(context) => {
                let question = self
                    .generator
                    .follow_up(&self.key, &job_description, &topics, context)
                    .await
                    .map_err(|e| {
                        warn!("Follow-up generation failed: {e}");
                        e
                    })?;
                NextTurn::Question(question)
            }
        };

        let mut session = self.active.session.lock().await;
        let state = session.commit_answer(plan, next)?;
        info!(
            "Interview {} now {:?} after {} turns",
            session.id(),
            state,
            session.history().len()
        );

        Ok(ListenOutcome {
            transcript,
            session: session.view(false),
        })
    }
}
