//! Session orchestrator: the state machine driving an interview from
//! candidate intake through the question loop to the final summary.
//!
//! One orchestrator runs per tab. It holds transient in-memory copies of the
//! active candidate and session only; the store stays the source of truth,
//! and other tabs learn about changes through bus events and re-fetch.

use std::time::Duration;

use chrono::Utc;
use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::info;

use crate::bus::{MessageType, TabBus};
use crate::errors::EngineError;
use crate::models::{
    Candidate, CandidatePatch, ChatBody, InterviewSession, NewCandidate, NewInterviewSession,
    Question, ScoreResult, ScoredAnswer, SessionPatch, SessionStatus, Summary,
};
use crate::scoring::ScoringEngine;
use crate::store::Store;
use crate::timer::{Countdown, TimerEvent};

/// Display pause between an accepted answer and the next question.
const ADVANCE_PAUSE: Duration = Duration::from_secs(2);

/// Recorded as the answer text when the timer expires with nothing typed.
pub const EXPIRED_PLACEHOLDER: &str = "No answer provided (time expired)";

/// Orchestrator lifecycle phase. `Summary` is terminal for the active
/// interview; starting a new one returns to `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Upload,
    InProgress,
    Summary,
}

/// What a submission led to.
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Answer scored, interview advanced to the next question.
    Advanced { question_number: u32, score: i64 },
    /// Answer scored and the interview finalized.
    Completed { score: i64, summary: Summary },
    /// The current question was already submitted; nothing happened.
    AlreadySubmitted,
}

struct ActiveInterview {
    candidate: Candidate,
    session: InterviewSession,
    questions: Vec<Question>,
    /// Count of answered questions, which is also the index of the current
    /// unanswered question.
    index: usize,
    /// Whether the current question's answer has been accepted. Makes
    /// submission idempotent per question.
    submitted: bool,
    answers: Vec<ScoredAnswer>,
    countdown: Option<Countdown>,
}

pub struct Orchestrator {
    store: Store,
    engine: ScoringEngine,
    bus: TabBus,
    phase: Phase,
    active: Option<ActiveInterview>,
}

impl Orchestrator {
    pub fn new(store: Store, engine: ScoringEngine, bus: TabBus) -> Self {
        Orchestrator {
            store,
            engine,
            bus,
            phase: Phase::Upload,
            active: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn candidate(&self) -> Option<&Candidate> {
        self.active.as_ref().map(|a| &a.candidate)
    }

    pub fn session(&self) -> Option<&InterviewSession> {
        self.active.as_ref().map(|a| &a.session)
    }

    /// The question currently awaiting an answer, if the loop is mid-flight.
    pub fn current_question(&self) -> Option<&Question> {
        let active = self.active.as_ref()?;
        active.questions.get(active.index)
    }

    /// Sessions still marked in-progress, offered for resumption at startup.
    pub async fn unfinished_sessions(&self) -> Result<Vec<InterviewSession>, EngineError> {
        self.store.get_unfinished_sessions().await
    }

    /// Creates the candidate and an in-progress session, generates the
    /// question set, and enters the question loop. A duplicate email or an
    /// empty resume rejects the whole operation with nothing persisted.
    pub async fn start_interview(&mut self, new: NewCandidate) -> Result<i64, EngineError> {
        if new.resume_text.trim().is_empty() {
            return Err(EngineError::Validation(
                "resume text is empty, upload a different file".to_string(),
            ));
        }

        let candidate_id = self.store.add_candidate(new).await?;
        let candidate = self.store.get_candidate(candidate_id).await?;

        if self.store.active_session_for(candidate_id).await?.is_some() {
            return Err(EngineError::Validation(format!(
                "candidate {candidate_id} already has an interview in progress"
            )));
        }

        let questions = self.engine.generate_questions(&candidate.resume_text).await;
        let session_id = self
            .store
            .add_interview_session(NewInterviewSession {
                candidate_id,
                status: SessionStatus::InProgress,
                current_question: 0,
                total_questions: questions.len() as i64,
                start_time: Utc::now(),
            })
            .await?;
        let session = self.store.get_interview_session(session_id).await?;

        info!(
            "started interview session {session_id} for candidate {candidate_id} with {} questions",
            questions.len()
        );
        self.bus.broadcast(
            MessageType::CandidateCreated,
            json!({"candidate_id": candidate_id, "name": candidate.name, "email": candidate.email}),
        );
        self.bus.broadcast(
            MessageType::InterviewStarted,
            json!({
                "candidate_id": candidate_id,
                "session_id": session_id,
                "total_questions": questions.len(),
            }),
        );

        self.active = Some(ActiveInterview {
            candidate,
            session,
            questions,
            index: 0,
            submitted: false,
            answers: Vec::new(),
            countdown: None,
        });
        self.phase = Phase::InProgress;
        Ok(session_id)
    }

    /// Re-enters an in-progress session. The resume position is the count of
    /// persisted answer messages, not a stored cursor; already-scored answers
    /// are rebuilt from the chat log so the final summary covers them.
    pub async fn resume_interview(&mut self, session_id: i64) -> Result<(), EngineError> {
        let session = self.store.get_interview_session(session_id).await?;
        if session.status != SessionStatus::InProgress {
            return Err(EngineError::Validation(format!(
                "session {session_id} is not resumable"
            )));
        }
        let candidate = self.store.get_candidate(session.candidate_id).await?;
        let questions = self.engine.generate_questions(&candidate.resume_text).await;

        let log = self.store.get_chat_messages(candidate.id).await?;
        let answers = rebuild_answers(&log, &questions);
        let index = answers.len();

        info!(
            "resumed session {session_id} for candidate {} at question {}",
            candidate.id,
            index + 1
        );
        self.active = Some(ActiveInterview {
            candidate,
            session,
            questions,
            index,
            submitted: false,
            answers,
            countdown: None,
        });
        self.phase = Phase::InProgress;
        Ok(())
    }

    /// Marks a session cancelled. Only an in-progress session can be
    /// cancelled; the candidate's chat history is retained.
    pub async fn cancel_session(&mut self, session_id: i64) -> Result<(), EngineError> {
        let session = self.store.get_interview_session(session_id).await?;
        if session.status != SessionStatus::InProgress {
            return Err(EngineError::Validation(format!(
                "session {session_id} is not in progress"
            )));
        }
        self.store
            .update_interview_session(
                session_id,
                SessionPatch {
                    status: Some(SessionStatus::Cancelled),
                    ..Default::default()
                },
            )
            .await?;
        if self
            .active
            .as_ref()
            .is_some_and(|a| a.session.id == session_id)
        {
            self.active = None;
            self.phase = Phase::Upload;
        }
        Ok(())
    }

    /// Posts the current question to the chat log and starts its countdown.
    /// Returns the timer's event stream; the caller watches it for ticks and
    /// the expiry that triggers [`Orchestrator::auto_submit`].
    ///
    /// A resumed session may already hold the question message from a tab
    /// that went away before submitting; the append-only log gets no second
    /// copy in that case.
    pub async fn begin_question(
        &mut self,
    ) -> Result<UnboundedReceiver<TimerEvent>, EngineError> {
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| EngineError::Validation("no interview in progress".to_string()))?;
        let question = active
            .questions
            .get(active.index)
            .ok_or_else(|| EngineError::Validation("no questions remaining".to_string()))?
            .clone();
        let question_number = active.index as u32 + 1;

        let already_posted = self
            .store
            .get_chat_messages(active.candidate.id)
            .await?
            .iter()
            .any(|m| {
                matches!(m.body, ChatBody::Question { question_number: n, .. } if n == question_number)
            });
        if !already_posted {
            self.store
                .add_chat_message(
                    active.candidate.id,
                    &ChatBody::Question {
                        question_number,
                        content: question.question.clone(),
                        difficulty: question.difficulty,
                        time_limit: question.time_limit,
                    },
                )
                .await?;
            self.bus.broadcast(
                MessageType::ChatMessage,
                json!({
                    "candidate_id": active.candidate.id,
                    "question_number": question_number,
                    "type": "question",
                }),
            );
        }

        let (countdown, events) = Countdown::new(question.time_limit as u64);
        countdown.start();
        active.countdown = Some(countdown);
        active.submitted = false;
        Ok(events)
    }

    /// Manual submission. An empty trimmed answer is a validation error; the
    /// countdown keeps running and the candidate keeps typing.
    pub async fn submit_answer(&mut self, text: &str) -> Result<SubmitOutcome, EngineError> {
        if text.trim().is_empty() {
            return Err(EngineError::Validation("answer is empty".to_string()));
        }
        self.accept_answer(text).await
    }

    /// Expiry submission: whatever was typed is submitted verbatim, or a
    /// fixed placeholder if nothing was.
    pub async fn auto_submit(&mut self, text: &str) -> Result<SubmitOutcome, EngineError> {
        let text = if text.trim().is_empty() {
            EXPIRED_PLACEHOLDER
        } else {
            text
        };
        self.accept_answer(text).await
    }

    async fn accept_answer(&mut self, text: &str) -> Result<SubmitOutcome, EngineError> {
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| EngineError::Validation("no interview in progress".to_string()))?;
        if active.submitted {
            return Ok(SubmitOutcome::AlreadySubmitted);
        }
        let question = active
            .questions
            .get(active.index)
            .ok_or_else(|| EngineError::Validation("no questions remaining".to_string()))?
            .clone();
        active.submitted = true;
        if let Some(countdown) = active.countdown.take() {
            countdown.stop();
        }

        let question_number = active.index as u32 + 1;
        let result = self.engine.score_answer(&question, text).await;
        self.store
            .add_chat_message(
                active.candidate.id,
                &ChatBody::Answer {
                    question_number,
                    content: text.to_string(),
                    score: result.score,
                    feedback: result.feedback.clone(),
                },
            )
            .await?;
        self.bus.broadcast(
            MessageType::QuestionAnswered,
            json!({
                "candidate_id": active.candidate.id,
                "question_number": question_number,
                "score": result.score,
            }),
        );

        let score = result.score;
        active.answers.push(ScoredAnswer {
            question,
            answer: text.to_string(),
            result,
        });

        if active.index + 1 < active.questions.len() {
            tokio::time::sleep(ADVANCE_PAUSE).await;

            let active = self
                .active
                .as_mut()
                .ok_or_else(|| EngineError::Validation("no interview in progress".to_string()))?;
            active.index += 1;
            active.submitted = false;
            active.session = self
                .store
                .update_interview_session(
                    active.session.id,
                    SessionPatch {
                        current_question: Some(active.index as i64),
                        ..Default::default()
                    },
                )
                .await?;
            self.bus.broadcast(
                MessageType::InterviewProgress,
                json!({
                    "candidate_id": active.candidate.id,
                    "session_id": active.session.id,
                    "current_question": active.index,
                }),
            );
            Ok(SubmitOutcome::Advanced {
                question_number,
                score,
            })
        } else {
            let summary = self.finalize().await?;
            Ok(SubmitOutcome::Completed { score, summary })
        }
    }

    /// Completes the session: terminal status, summary message, candidate
    /// score, completion broadcast.
    async fn finalize(&mut self) -> Result<Summary, EngineError> {
        let active = self
            .active
            .as_mut()
            .ok_or_else(|| EngineError::Validation("no interview in progress".to_string()))?;
        let completed_at = Utc::now();

        active.session = self
            .store
            .update_interview_session(
                active.session.id,
                SessionPatch {
                    status: Some(SessionStatus::Completed),
                    current_question: Some(active.questions.len() as i64),
                    completed_at: Some(completed_at),
                },
            )
            .await?;

        let summary =
            self.engine
                .final_summary(&active.candidate.name, &active.answers, completed_at);
        let encoded = serde_json::to_string(&summary)
            .map_err(|e| EngineError::Internal(anyhow::anyhow!("encode summary: {e}")))?;
        self.store
            .add_chat_message(active.candidate.id, &ChatBody::Summary { content: encoded })
            .await?;

        active.candidate = self
            .store
            .update_candidate(
                active.candidate.id,
                CandidatePatch {
                    final_score: Some(summary.overall_score),
                    interview_completed: Some(true),
                    completed_at: Some(completed_at),
                    ..Default::default()
                },
            )
            .await?;

        info!(
            "interview session {} completed, overall score {}",
            active.session.id, summary.overall_score
        );
        self.bus.broadcast(
            MessageType::InterviewCompleted,
            json!({
                "candidate_id": active.candidate.id,
                "session_id": active.session.id,
                "final_score": summary.overall_score,
            }),
        );
        self.phase = Phase::Summary;
        Ok(summary)
    }
}

/// Reconstructs scored answers from the persisted chat log by pairing each
/// answer message with its question. Matched keywords are not persisted, so
/// rebuilt results carry an empty list.
fn rebuild_answers(
    log: &[crate::models::ChatMessage],
    questions: &[Question],
) -> Vec<ScoredAnswer> {
    let mut answers = Vec::new();
    for message in log {
        let ChatBody::Answer {
            question_number,
            content,
            score,
            feedback,
        } = &message.body
        else {
            continue;
        };

        let index = question_number.saturating_sub(1) as usize;
        let question = questions.get(index).cloned().or_else(|| {
            log.iter().find_map(|m| match &m.body {
                ChatBody::Question {
                    question_number: n,
                    content,
                    difficulty,
                    time_limit,
                } if n == question_number => Some(Question {
                    id: *n,
                    question: content.clone(),
                    category: "General".to_string(),
                    difficulty: *difficulty,
                    time_limit: *time_limit,
                }),
                _ => None,
            })
        });
        let Some(question) = question else { continue };

        answers.push(ScoredAnswer {
            question,
            answer: content.clone(),
            result: ScoreResult {
                score: *score,
                feedback: feedback.clone(),
                matched_keywords: Vec::new(),
                answer_length: content.len(),
            },
        });
    }
    answers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::BusChannel;
    use crate::models::{Difficulty, Rating};

    async fn orchestrator() -> Orchestrator {
        let store = Store::open("sqlite::memory:").await.unwrap();
        let channel = BusChannel::new();
        Orchestrator::new(
            store,
            ScoringEngine::new(None),
            TabBus::attach(&channel),
        )
    }

    fn intake(email: &str) -> NewCandidate {
        NewCandidate {
            name: "Grace Hopper".to_string(),
            email: email.to_string(),
            phone: "555-0101".to_string(),
            resume_text: "Compilers, COBOL, and a decade of systems programming.".to_string(),
            uploaded_at: Some(Utc::now()),
        }
    }

    const TECHNICAL_ANSWER: &str =
        "I designed the database schema, tuned the algorithm, and profiled the api \
         until performance was acceptable under load.";

    // Real time, not `start_paused`: sqlx-sqlite serves each pooled
    // connection from its own OS thread, which tokio's paused clock cannot
    // see, so auto-advance fires the pool's acquire timeout before the
    // worker thread can reply and every store call dies with PoolTimedOut.
    #[tokio::test]
    async fn test_full_interview_reaches_summary() {
        let mut orch = orchestrator().await;
        assert_eq!(orch.phase(), Phase::Upload);

        let session_id = orch.start_interview(intake("grace@example.com")).await.unwrap();
        assert_eq!(orch.phase(), Phase::InProgress);
        assert_eq!(orch.session().unwrap().total_questions, 6);

        let mut last = None;
        for _ in 0..6 {
            orch.begin_question().await.unwrap();
            last = Some(orch.submit_answer(TECHNICAL_ANSWER).await.unwrap());
        }

        let Some(SubmitOutcome::Completed { summary, .. }) = last else {
            panic!("interview did not complete");
        };
        assert_eq!(orch.phase(), Phase::Summary);
        assert_eq!(summary.total_questions, 6);
        assert!(summary.overall_score >= 0 && summary.overall_score <= 100);

        let store_session = orch.store.get_interview_session(session_id).await.unwrap();
        assert_eq!(store_session.status, SessionStatus::Completed);
        assert!(store_session.completed_at.is_some());

        let candidate = orch.candidate().unwrap();
        assert!(candidate.interview_completed);
        assert_eq!(candidate.final_score, Some(summary.overall_score));
    }

    #[tokio::test]
    async fn test_submission_is_idempotent_per_question() {
        let mut orch = orchestrator().await;
        orch.start_interview(intake("grace@example.com")).await.unwrap();
        orch.begin_question().await.unwrap();

        let first = orch.submit_answer(TECHNICAL_ANSWER).await.unwrap();
        assert!(matches!(first, SubmitOutcome::Advanced { question_number: 1, .. }));

        // The advance reset the guard for question 2, so force the flag back
        // by submitting twice without a begin_question in between.
        orch.begin_question().await.unwrap();
        orch.submit_answer(TECHNICAL_ANSWER).await.unwrap();
        orch.active.as_mut().unwrap().submitted = true;
        let repeat = orch.submit_answer("again").await.unwrap();
        assert!(matches!(repeat, SubmitOutcome::AlreadySubmitted));
    }

    #[tokio::test]
    async fn test_empty_manual_submit_is_rejected() {
        let mut orch = orchestrator().await;
        orch.start_interview(intake("grace@example.com")).await.unwrap();
        orch.begin_question().await.unwrap();

        let err = orch.submit_answer("   ").await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        // Still answerable afterwards.
        assert!(orch.current_question().is_some());
    }

    #[tokio::test]
    async fn test_expiry_auto_submit_records_placeholder() {
        let mut orch = orchestrator().await;
        orch.start_interview(intake("grace@example.com")).await.unwrap();
        orch.begin_question().await.unwrap();

        orch.auto_submit("").await.unwrap();

        let cid = orch.candidate().unwrap().id;
        let log = orch.store.get_chat_messages(cid).await.unwrap();
        let ChatBody::Answer { content, score, .. } = &log[1].body else {
            panic!("expected an answer message");
        };
        assert_eq!(content, EXPIRED_PLACEHOLDER);
        // The placeholder is a real answer, scored heuristically, not 10.
        assert!(*score > 10);
    }

    #[tokio::test]
    async fn test_duplicate_email_rejects_start() {
        let mut orch = orchestrator().await;
        orch.start_interview(intake("grace@example.com")).await.unwrap();

        let err = orch.start_interview(intake("grace@example.com")).await.unwrap_err();
        assert!(matches!(err, EngineError::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn test_empty_resume_rejects_start() {
        let mut orch = orchestrator().await;
        let mut new = intake("grace@example.com");
        new.resume_text = "   ".to_string();

        let err = orch.start_interview(new).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(orch.phase(), Phase::Upload);
    }

    #[tokio::test]
    async fn test_resume_continues_from_answer_count() {
        let mut orch = orchestrator().await;
        let session_id = orch.start_interview(intake("grace@example.com")).await.unwrap();

        for _ in 0..2 {
            orch.begin_question().await.unwrap();
            orch.submit_answer(TECHNICAL_ANSWER).await.unwrap();
        }

        // Simulate a fresh tab: new orchestrator over the same store.
        let store = orch.store.clone();
        let channel = BusChannel::new();
        let mut fresh = Orchestrator::new(
            store,
            ScoringEngine::new(None),
            TabBus::attach(&channel),
        );
        assert_eq!(fresh.unfinished_sessions().await.unwrap().len(), 1);

        fresh.resume_interview(session_id).await.unwrap();
        assert_eq!(fresh.phase(), Phase::InProgress);
        let active = fresh.active.as_ref().unwrap();
        assert_eq!(active.index, 2);
        assert_eq!(active.answers.len(), 2);
        assert_eq!(fresh.current_question().unwrap().difficulty, Difficulty::Medium);

        // Finishing from the resumed tab covers all six answers.
        for _ in 0..4 {
            fresh.begin_question().await.unwrap();
            fresh.submit_answer(TECHNICAL_ANSWER).await.unwrap();
        }
        assert_eq!(fresh.phase(), Phase::Summary);
    }

    #[tokio::test]
    async fn test_resumed_question_is_not_logged_twice() {
        let mut orch = orchestrator().await;
        let session_id = orch.start_interview(intake("grace@example.com")).await.unwrap();
        orch.begin_question().await.unwrap();
        let cid = orch.candidate().unwrap().id;

        // The tab goes away after posting question 1 but before any submit.
        let store = orch.store.clone();
        drop(orch);

        let channel = BusChannel::new();
        let mut fresh = Orchestrator::new(
            store.clone(),
            ScoringEngine::new(None),
            TabBus::attach(&channel),
        );
        fresh.resume_interview(session_id).await.unwrap();
        fresh.begin_question().await.unwrap();

        let log = store.get_chat_messages(cid).await.unwrap();
        let question_ones = log
            .iter()
            .filter(|m| matches!(m.body, ChatBody::Question { question_number: 1, .. }))
            .count();
        assert_eq!(question_ones, 1);

        // The question is still answerable in the fresh tab.
        let outcome = fresh.submit_answer(TECHNICAL_ANSWER).await.unwrap();
        assert!(matches!(outcome, SubmitOutcome::Advanced { question_number: 1, .. }));
    }

    #[tokio::test]
    async fn test_cancel_keeps_history_and_blocks_resume() {
        let mut orch = orchestrator().await;
        let session_id = orch.start_interview(intake("grace@example.com")).await.unwrap();
        orch.begin_question().await.unwrap();
        let cid = orch.candidate().unwrap().id;

        orch.cancel_session(session_id).await.unwrap();
        assert_eq!(orch.phase(), Phase::Upload);

        let session = orch.store.get_interview_session(session_id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Cancelled);
        assert!(!orch.store.get_chat_messages(cid).await.unwrap().is_empty());

        let err = orch.resume_interview(session_id).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        // A second cancel is also rejected: transitions are one-directional.
        let err = orch.cancel_session(session_id).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[tokio::test]
    async fn test_throwaway_answers_drag_down_the_rating() {
        let mut orch = orchestrator().await;
        orch.start_interview(intake("grace@example.com")).await.unwrap();

        let mut last = None;
        for _ in 0..6 {
            orch.begin_question().await.unwrap();
            last = Some(orch.submit_answer("jkl").await.unwrap());
        }
        let Some(SubmitOutcome::Completed { summary, .. }) = last else {
            panic!("interview did not complete");
        };
        assert_eq!(summary.overall_score, 10);
        assert_eq!(summary.overall_rating, Rating::NeedsImprovement);
    }
}
