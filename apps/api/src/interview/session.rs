//! Conversation state machine for one interview session.
//!
//! States advance Greeting → Introduction → Questioning → Complete and never regress.
//! Answers are processed in two phases so a failed turn leaves the session untouched:
//! `plan_answer` decides the next step without mutating anything, the caller resolves
//! it (static lookup or a generated follow-up), then `commit_answer` appends the
//! candidate and interviewer entries and transitions in one step.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::credentials::ProviderKey;
use crate::interview::generator::GeneratedContent;
use crate::interview::JobDescription;
use crate::providers::Provider;

/// History length at which a session is forced to complete.
pub const DEFAULT_TURN_BUDGET: usize = 10;
/// Entries of history handed to follow-up generation, pending answer included.
pub const FOLLOW_UP_CONTEXT_TURNS: usize = 3;

pub const DEFAULT_GREETING: &str = "Hello, and thank you for joining this interview today.";
pub const INTRODUCTION_PROMPT: &str = "We'll start with your introduction.";
pub const COMPLETION_MESSAGE: &str = "Interview completed! Thank you!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Greeting,
    Introduction,
    Questioning,
    Complete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    Interviewer,
    Candidate,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    pub speaker: Speaker,
    pub text: String,
    pub at: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self {
            speaker,
            text: text.into(),
            at: Utc::now(),
        }
    }

    /// `Interviewer: ...` / `Candidate: ...`, the form used as generation context.
    pub fn transcript_line(&self) -> String {
        format!("{:?}: {}", self.speaker, self.text)
    }
}

/// How the next question is obtained after each answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewVariant {
    /// Questions come from the precomputed list, in order.
    #[default]
    Scripted,
    /// A greeting is generated up front and every question is a generated follow-up.
    Conversational,
}

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("The greeting has not been presented yet")]
    GreetingPending,

    #[error("The interview is already complete")]
    Complete,

    #[error("The answer is empty")]
    EmptyAnswer,

    #[error("The session changed while the answer was being processed")]
    Stale,
}

/// What should follow a candidate answer.
#[derive(Debug, Clone, PartialEq)]
pub enum NextStep {
    Complete,
    /// Next item of the precomputed list.
    Ask(String),
    /// A follow-up must be generated from this context (oldest first).
    FollowUp(Vec<ConversationTurn>),
}

impl PartialEq for ConversationTurn {
    fn eq(&self, other: &Self) -> bool {
        self.speaker == other.speaker && self.text == other.text
    }
}

/// The resolved interviewer move that `commit_answer` records.
#[derive(Debug, Clone, PartialEq)]
pub enum NextTurn {
    Question(String),
    Complete,
}

/// A planned answer. Only valid against the history it was planned on.
#[derive(Debug, Clone)]
pub struct AnswerPlan {
    answer: String,
    base_len: usize,
    pub step: NextStep,
}

#[derive(Debug, Clone)]
enum QuestionPlan {
    Scripted { questions: Vec<String>, asked: usize },
    Conversational { topics: Vec<String> },
}

/// Read-only snapshot returned to the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub provider: Provider,
    pub variant: InterviewVariant,
    pub state: SessionState,
    pub listen_enabled: bool,
    pub turn_budget: usize,
    pub history: Vec<ConversationTurn>,
}

#[derive(Debug)]
pub struct InterviewSession {
    id: Uuid,
    key: ProviderKey,
    job_description: JobDescription,
    variant: InterviewVariant,
    greeting: String,
    plan: QuestionPlan,
    state: SessionState,
    history: Vec<ConversationTurn>,
    turn_budget: usize,
}

impl InterviewSession {
    pub fn new(
        key: ProviderKey,
        job_description: JobDescription,
        variant: InterviewVariant,
        content: GeneratedContent,
        turn_budget: usize,
    ) -> Self {
        let (greeting, questions) = match content {
            GeneratedContent::Questions(questions) => (DEFAULT_GREETING.to_string(), questions),
            GeneratedContent::GreetingAndQuestions {
                greeting,
                questions,
            } => (greeting, questions),
        };

        let plan = match variant {
            InterviewVariant::Scripted => QuestionPlan::Scripted { questions, asked: 0 },
            InterviewVariant::Conversational => QuestionPlan::Conversational { topics: questions },
        };

        Self {
            id: Uuid::new_v4(),
            key,
            job_description,
            variant,
            greeting,
            plan,
            state: SessionState::Greeting,
            history: Vec::new(),
            turn_budget,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> &ProviderKey {
        &self.key
    }

    pub fn job_description(&self) -> &JobDescription {
        &self.job_description
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// Questions generated up front. For conversational sessions these are topic hints.
    pub fn planned_questions(&self) -> &[String] {
        match &self.plan {
            QuestionPlan::Scripted { questions, .. } => questions,
            QuestionPlan::Conversational { topics } => topics,
        }
    }

    /// True while the candidate may answer.
    pub fn accepts_answers(&self) -> bool {
        matches!(
            self.state,
            SessionState::Introduction | SessionState::Questioning
        )
    }

    /// Displays the greeting. Fires Greeting → Introduction exactly once; later calls are no-ops.
    pub fn present_greeting(&mut self) -> bool {
        if self.state != SessionState::Greeting {
            return false;
        }
        self.history.push(ConversationTurn::new(
            Speaker::Interviewer,
            format!("{} {}", self.greeting, INTRODUCTION_PROMPT),
        ));
        self.state = SessionState::Introduction;
        true
    }

    pub fn ensure_accepts_answers(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Greeting => Err(SessionError::GreetingPending),
            SessionState::Complete => Err(SessionError::Complete),
            SessionState::Introduction | SessionState::Questioning => Ok(()),
        }
    }

    /// Decides what follows `answer` without touching the session.
    pub fn plan_answer(&self, answer: &str) -> Result<AnswerPlan, SessionError> {
        self.ensure_accepts_answers()?;

        let answer = answer.trim();
        if answer.is_empty() {
            return Err(SessionError::EmptyAnswer);
        }

        let step = if self.history.len() + 1 >= self.turn_budget {
            NextStep::Complete
        } else {
            match &self.plan {
                QuestionPlan::Scripted { questions, asked } => match questions.get(*asked) {
                    Some(question) => NextStep::Ask(question.clone()),
                    None => NextStep::Complete,
                },
                QuestionPlan::Conversational { .. } => {
                    let keep = FOLLOW_UP_CONTEXT_TURNS.saturating_sub(1);
                    let start = self.history.len().saturating_sub(keep);
                    let mut context = self.history[start..].to_vec();
                    context.push(ConversationTurn::new(Speaker::Candidate, answer));
                    NextStep::FollowUp(context)
                }
            }
        };

        Ok(AnswerPlan {
            answer: answer.to_string(),
            base_len: self.history.len(),
            step,
        })
    }

    /// Records the planned answer and the resolved interviewer move, then transitions.
    pub fn commit_answer(
        &mut self,
        plan: AnswerPlan,
        next: NextTurn,
    ) -> Result<SessionState, SessionError> {
        self.ensure_accepts_answers()?;
        if plan.base_len != self.history.len() {
            return Err(SessionError::Stale);
        }

        self.history
            .push(ConversationTurn::new(Speaker::Candidate, plan.answer));

        match next {
            NextTurn::Question(question) => {
                if let QuestionPlan::Scripted { asked, .. } = &mut self.plan {
                    *asked += 1;
                }
                self.history
                    .push(ConversationTurn::new(Speaker::Interviewer, question));
                self.state = SessionState::Questioning;
            }
            NextTurn::Complete => {
                self.history
                    .push(ConversationTurn::new(Speaker::Interviewer, COMPLETION_MESSAGE));
                self.state = SessionState::Complete;
            }
        }

        Ok(self.state)
    }

    pub fn view(&self, listening: bool) -> SessionView {
        SessionView {
            id: self.id,
            provider: self.key.provider,
            variant: self.variant,
            state: self.state,
            listen_enabled: self.accepts_answers() && !listening,
            turn_budget: self.turn_budget,
            history: self.history.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::Credential;

    fn key() -> ProviderKey {
        ProviderKey::new(Provider::OpenAI, Credential::new("sk-test").unwrap())
    }

    fn jd() -> JobDescription {
        JobDescription::new("Backend engineer, Go, Kafka").unwrap()
    }

    fn questions(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("Question {i}?")).collect()
    }

    fn scripted(n: usize) -> InterviewSession {
        InterviewSession::new(
            key(),
            jd(),
            InterviewVariant::Scripted,
            GeneratedContent::Questions(questions(n)),
            DEFAULT_TURN_BUDGET,
        )
    }

    fn conversational() -> InterviewSession {
        InterviewSession::new(
            key(),
            jd(),
            InterviewVariant::Conversational,
            GeneratedContent::GreetingAndQuestions {
                greeting: "Welcome to the backend interview!".to_string(),
                questions: questions(8),
            },
            DEFAULT_TURN_BUDGET,
        )
    }

    /// Plans and commits an answer, resolving follow-ups with a fixed question.
    fn answer(session: &mut InterviewSession, text: &str) -> SessionState {
        let plan = session.plan_answer(text).unwrap();
        let next = match &plan.step {
            NextStep::Complete => NextTurn::Complete,
            NextStep::Ask(q) => NextTurn::Question(q.clone()),
            NextStep::FollowUp(_) => NextTurn::Question("Follow-up?".to_string()),
        };
        session.commit_answer(plan, next).unwrap()
    }

    #[test]
    fn test_new_session_starts_in_greeting_with_empty_history() {
        let session = scripted(8);
        assert_eq!(session.state(), SessionState::Greeting);
        assert!(session.history().is_empty());
        assert!(!session.view(false).listen_enabled);
    }

    #[test]
    fn test_greeting_transition_fires_exactly_once() {
        let mut session = conversational();
        assert!(session.present_greeting());
        assert!(!session.present_greeting());
        assert!(!session.present_greeting());

        assert_eq!(session.state(), SessionState::Introduction);
        assert_eq!(session.history().len(), 1);
        assert_eq!(
            session.history()[0].text,
            "Welcome to the backend interview! We'll start with your introduction."
        );
        assert!(session.view(false).listen_enabled);
    }

    #[test]
    fn test_answer_before_greeting_is_rejected() {
        let session = scripted(8);
        assert_eq!(
            session.plan_answer("hello").unwrap_err(),
            SessionError::GreetingPending
        );
    }

    #[test]
    fn test_introduction_moves_to_questioning_with_first_question() {
        let mut session = scripted(8);
        session.present_greeting();

        assert_eq!(answer(&mut session, "I'm a Go developer"), SessionState::Questioning);
        let history = session.history();
        assert_eq!(history[1].speaker, Speaker::Candidate);
        assert_eq!(history[1].text, "I'm a Go developer");
        assert_eq!(history[2].speaker, Speaker::Interviewer);
        assert_eq!(history[2].text, "Question 1?");
    }

    #[test]
    fn test_scripted_session_completes_at_turn_budget_with_alternating_history() {
        let mut session = scripted(8);
        session.present_greeting();

        let mut answers = 0;
        while session.state() != SessionState::Complete {
            answers += 1;
            answer(&mut session, &format!("Answer {answers}"));
        }

        assert_eq!(answers, 5);
        let history = session.history();
        assert!(history.len() >= DEFAULT_TURN_BUDGET);
        for (i, turn) in history.iter().enumerate() {
            let expected = if i % 2 == 0 {
                Speaker::Interviewer
            } else {
                Speaker::Candidate
            };
            assert_eq!(turn.speaker, expected, "turn {i} out of order");
        }
        assert_eq!(history.last().unwrap().text, COMPLETION_MESSAGE);
        assert!(!session.view(false).listen_enabled);
    }

    #[test]
    fn test_complete_session_rejects_further_answers() {
        let mut session = scripted(8);
        session.present_greeting();
        while session.state() != SessionState::Complete {
            answer(&mut session, "answer");
        }
        let len = session.history().len();

        assert_eq!(session.plan_answer("more").unwrap_err(), SessionError::Complete);
        assert!(!session.present_greeting());
        assert_eq!(session.history().len(), len);
    }

    #[test]
    fn test_scripted_list_exhausted_before_budget_completes() {
        let mut session = scripted(2);
        session.present_greeting();

        answer(&mut session, "intro");
        answer(&mut session, "answer one");
        let plan = session.plan_answer("answer two").unwrap();
        assert_eq!(plan.step, NextStep::Complete);
        session.commit_answer(plan, NextTurn::Complete).unwrap();

        assert_eq!(session.state(), SessionState::Complete);
        assert_eq!(session.history().len(), 7);
    }

    #[test]
    fn test_plan_does_not_mutate() {
        let mut session = conversational();
        session.present_greeting();
        let _ = session.plan_answer("intro").unwrap();
        let _ = session.plan_answer("intro again").unwrap();

        assert_eq!(session.state(), SessionState::Introduction);
        assert_eq!(session.history().len(), 1);
    }

    #[test]
    fn test_follow_up_context_is_last_three_entries_ending_with_answer() {
        let mut session = conversational();
        session.present_greeting();
        answer(&mut session, "intro");
        answer(&mut session, "first answer");

        let plan = session.plan_answer("second answer").unwrap();
        let NextStep::FollowUp(context) = plan.step else {
            panic!("conversational sessions generate follow-ups");
        };
        let lines: Vec<String> = context.iter().map(|t| t.transcript_line()).collect();
        assert_eq!(
            lines,
            vec![
                "Candidate: first answer",
                "Interviewer: Follow-up?",
                "Candidate: second answer"
            ]
        );
    }

    #[test]
    fn test_stale_plan_is_rejected() {
        let mut session = scripted(8);
        session.present_greeting();
        let stale = session.plan_answer("first").unwrap();
        answer(&mut session, "second");

        assert_eq!(
            session
                .commit_answer(stale, NextTurn::Question("x".to_string()))
                .unwrap_err(),
            SessionError::Stale
        );
    }

    #[test]
    fn test_blank_answer_is_rejected() {
        let mut session = scripted(8);
        session.present_greeting();
        assert_eq!(session.plan_answer("   ").unwrap_err(), SessionError::EmptyAnswer);
    }

    #[test]
    fn test_states_are_ordered_monotonically() {
        assert!(SessionState::Greeting < SessionState::Introduction);
        assert!(SessionState::Introduction < SessionState::Questioning);
        assert!(SessionState::Questioning < SessionState::Complete);
    }
}
