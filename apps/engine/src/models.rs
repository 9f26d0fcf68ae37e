use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

// ────────────────────────────────────────────────────────────────────────────
// Candidates
// ────────────────────────────────────────────────────────────────────────────

/// A candidate profile as stored. `final_score` and `completed_at` stay unset
/// until the orchestrator finalizes an interview.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Candidate {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub resume_text: String,
    pub uploaded_at: Option<DateTime<Utc>>,
    pub interview_completed: bool,
    pub final_score: Option<i64>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Candidate fields supplied at intake. The store assigns `id` and
/// `created_at`; completion fields start at their defaults.
#[derive(Debug, Clone)]
pub struct NewCandidate {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub resume_text: String,
    pub uploaded_at: Option<DateTime<Utc>>,
}

/// Partial candidate update. Every field is optional; unset fields are left
/// untouched by the store's read-modify-merge-write update.
#[derive(Debug, Clone, Default)]
pub struct CandidatePatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub resume_text: Option<String>,
    pub interview_completed: Option<bool>,
    pub final_score: Option<i64>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ────────────────────────────────────────────────────────────────────────────
// Interview sessions
// ────────────────────────────────────────────────────────────────────────────

/// Session lifecycle status. Transitions are one-directional:
/// `in_progress` → `completed` or `cancelled`, never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
    Cancelled,
}

/// One attempt at the interview for one candidate. `current_question` counts
/// answered questions; the chat log, not this field, is the source of truth
/// for the resume position.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InterviewSession {
    pub id: i64,
    pub candidate_id: i64,
    pub status: SessionStatus,
    pub current_question: i64,
    pub total_questions: i64,
    pub start_time: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewInterviewSession {
    pub candidate_id: i64,
    pub status: SessionStatus,
    pub current_question: i64,
    pub total_questions: i64,
    pub start_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct SessionPatch {
    pub status: Option<SessionStatus>,
    pub current_question: Option<i64>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ────────────────────────────────────────────────────────────────────────────
// Chat messages
// ────────────────────────────────────────────────────────────────────────────

/// The body of one immutable chat-log entry, tagged by `type` on the wire.
/// Question numbers start at 1 and increase without gaps within a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatBody {
    Question {
        question_number: u32,
        content: String,
        difficulty: Difficulty,
        time_limit: u32,
    },
    Answer {
        question_number: u32,
        content: String,
        score: i64,
        feedback: String,
    },
    Summary {
        /// JSON-serialized [`Summary`].
        content: String,
    },
}

/// A stored chat-log entry tied to one candidate. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub candidate_id: i64,
    pub body: ChatBody,
    pub timestamp: DateTime<Utc>,
}

// ────────────────────────────────────────────────────────────────────────────
// Questions and scoring
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    /// Time limit in seconds is derived strictly from difficulty.
    pub fn time_limit(self) -> u32 {
        match self {
            Difficulty::Easy => 20,
            Difficulty::Medium => 60,
            Difficulty::Hard => 120,
        }
    }

    /// Lenient parse for values coming back from the scoring backend.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Question {
    pub id: u32,
    pub question: String,
    pub category: String,
    pub difficulty: Difficulty,
    /// Seconds. Always `difficulty.time_limit()` after normalization.
    pub time_limit: u32,
}

/// Result of scoring one answer. `score` is always within [0, 100] on both
/// the network-backed and fallback paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: i64,
    pub feedback: String,
    pub matched_keywords: Vec<String>,
    pub answer_length: usize,
}

/// A question paired with its scored answer, kept in memory by the
/// orchestrator and fed into the final summary.
#[derive(Debug, Clone)]
pub struct ScoredAnswer {
    pub question: Question,
    pub answer: String,
    pub result: ScoreResult,
}

// ────────────────────────────────────────────────────────────────────────────
// Final summary
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Excellent,
    #[serde(rename = "Very Good")]
    VeryGood,
    Good,
    Satisfactory,
    #[serde(rename = "Needs Improvement")]
    NeedsImprovement,
}

impl Rating {
    /// Five-tier bucket over the overall score.
    pub fn from_score(score: i64) -> Self {
        match score {
            s if s >= 90 => Rating::Excellent,
            s if s >= 80 => Rating::VeryGood,
            s if s >= 70 => Rating::Good,
            s if s >= 60 => Rating::Satisfactory,
            _ => Rating::NeedsImprovement,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Rating::Excellent => "Excellent",
            Rating::VeryGood => "Very Good",
            Rating::Good => "Good",
            Rating::Satisfactory => "Satisfactory",
            Rating::NeedsImprovement => "Needs Improvement",
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetailedScore {
    pub question_number: u32,
    pub question: String,
    pub difficulty: Difficulty,
    pub score: i64,
    pub feedback: String,
    pub answer: String,
}

/// The aggregated interview result persisted as a `summary` chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub candidate_name: String,
    pub overall_score: i64,
    pub overall_rating: Rating,
    pub total_questions: usize,
    pub summary: String,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub detailed_scores: Vec<DetailedScore>,
    pub completed_at: DateTime<Utc>,
}
