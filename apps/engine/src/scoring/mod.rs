//! Scoring engine: resume-driven question generation and per-answer scoring.
//!
//! Both operations are total. The network-backed path is attempted when a
//! client is configured, with bounded retry; every failure mode after that
//! drops to the deterministic path in [`fallback`]. Callers never see an
//! error from this module.

use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

use crate::llm_client::{prompts, strip_code_fences, LlmClient};
use crate::models::{Difficulty, Question, ScoreResult, ScoredAnswer, Summary};
use crate::retry::{with_retry, RetryPolicy};

pub mod fallback;
pub mod summary;

pub use fallback::{fallback_questions, heuristic_score, throwaway_guard};

/// Resumes shorter than this go straight to the fallback question bank.
const MIN_RESUME_LEN: usize = 5;

/// A generated set needs at least this many well-formed questions to be used.
const MIN_USABLE_QUESTIONS: usize = 3;

const DEFAULT_SCORE: i64 = 75;
const DEFAULT_FEEDBACK: &str = "Answer evaluated successfully.";

fn json_array_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\[.*\]").expect("static regex"))
}

fn numbered_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+\.\s*([^?\n]+\?)").expect("static regex"))
}

fn json_object_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static regex"))
}

/// Question generation and answer scoring with network-first, fallback-always
/// semantics. Cheap to clone.
#[derive(Clone)]
pub struct ScoringEngine {
    llm: Option<LlmClient>,
    retry: RetryPolicy,
}

impl ScoringEngine {
    pub fn new(llm: Option<LlmClient>) -> Self {
        ScoringEngine {
            llm,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(llm: Option<LlmClient>, retry: RetryPolicy) -> Self {
        ScoringEngine { llm, retry }
    }

    /// Produces the six-question interview set for a resume. Falls back to
    /// the fixed bank when no client is configured, the resume text is too
    /// short, or the backend fails or returns fewer than three usable
    /// questions.
    pub async fn generate_questions(&self, resume_text: &str) -> Vec<Question> {
        let Some(llm) = &self.llm else {
            info!("no scoring backend configured, using fallback questions");
            return fallback_questions();
        };

        if resume_text.trim().len() < MIN_RESUME_LEN {
            warn!("resume text too short for question generation, using fallback");
            return fallback_questions();
        }

        let user = prompts::QUESTION_GEN_USER.replace("{resume_text}", resume_text);
        let generated = with_retry(self.retry, || {
            let user = user.as_str();
            async move {
                let text = llm
                    .chat(prompts::QUESTION_GEN_SYSTEM, user, 0.7, 1500)
                    .await?;
                usable_questions(&text)
            }
        })
        .await;

        match generated {
            Ok(questions) => {
                info!("generated {} questions from resume", questions.len());
                questions
            }
            Err(e) => {
                warn!("question generation failed: {e}, using fallback");
                fallback_questions()
            }
        }
    }

    /// Scores one answer. The throwaway guard runs first on every path; the
    /// network-backed path degrades to the heuristic scorer on any failure.
    /// The returned score is always within [0, 100].
    pub async fn score_answer(&self, question: &Question, answer: &str) -> ScoreResult {
        if let Some(result) = throwaway_guard(answer) {
            return result;
        }

        let Some(llm) = &self.llm else {
            return heuristic_score(question.difficulty, answer);
        };

        let user = prompts::SCORING_USER
            .replace("{question}", &question.question)
            .replace("{difficulty}", question.difficulty.as_str())
            .replace("{answer}", answer);
        let response = with_retry(self.retry, || {
            llm.chat(prompts::SCORING_SYSTEM, &user, 0.3, 500)
        })
        .await;

        match response {
            Ok(text) => match parse_score(&text, answer.len()) {
                Some(result) => result,
                None => {
                    warn!("could not parse score response, using heuristic scoring");
                    heuristic_score(question.difficulty, answer)
                }
            },
            Err(e) => {
                warn!("answer scoring failed: {e}, using heuristic scoring");
                heuristic_score(question.difficulty, answer)
            }
        }
    }

    /// Aggregates the scored answers into the final interview summary.
    pub fn final_summary(
        &self,
        candidate_name: &str,
        answers: &[ScoredAnswer],
        completed_at: DateTime<Utc>,
    ) -> Summary {
        summary::build_summary(candidate_name, answers, completed_at)
    }
}

/// The retried unit of question generation: a fetched response that parses
/// to no usable set is an error, so the retry policy treats a malformed
/// response exactly like a network failure and spends the remaining
/// attempts before the caller falls back.
fn usable_questions(text: &str) -> anyhow::Result<Vec<Question>> {
    parse_questions(text).ok_or_else(|| anyhow!("backend returned no usable questions"))
}

/// Parses backend output into a usable question set, trying progressively
/// looser readings: bare JSON array, array embedded in surrounding prose,
/// then numbered "1. ...?" lines. Returns `None` when fewer than three
/// well-formed questions survive normalization.
fn parse_questions(raw: &str) -> Option<Vec<Question>> {
    let cleaned = strip_code_fences(raw);

    let values: Vec<Value> = serde_json::from_str(cleaned)
        .ok()
        .or_else(|| {
            json_array_re()
                .find(cleaned)
                .and_then(|m| serde_json::from_str(m.as_str()).ok())
        })
        .or_else(|| {
            let extracted: Vec<Value> = numbered_line_re()
                .captures_iter(cleaned)
                .map(|cap| Value::String(cap[1].trim().to_string()))
                .collect();
            (!extracted.is_empty()).then_some(extracted)
        })?;

    let questions: Vec<Question> = values
        .iter()
        .filter_map(question_text)
        .enumerate()
        .map(|(i, (value, text))| normalize_question(i, value, text))
        .collect();

    (questions.len() >= MIN_USABLE_QUESTIONS).then_some(questions)
}

/// Pulls the question text out of one array element, accepting either a bare
/// string or an object with a `question` field. Empty texts are dropped.
fn question_text(value: &Value) -> Option<(&Value, &str)> {
    let text = match value {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("question")?.as_str()?,
        _ => return None,
    };
    let text = text.trim();
    (!text.is_empty()).then_some((value, text))
}

/// Fills in whatever the backend left out: ids from position, difficulty
/// from the fixed easy/easy/medium/medium/hard/hard ramp, the time limit
/// always recomputed from the normalized difficulty.
fn normalize_question(index: usize, value: &Value, text: &str) -> Question {
    let difficulty = value
        .get("difficulty")
        .and_then(Value::as_str)
        .and_then(Difficulty::parse)
        .unwrap_or(match index {
            0 | 1 => Difficulty::Easy,
            2 | 3 => Difficulty::Medium,
            _ => Difficulty::Hard,
        });

    Question {
        id: value
            .get("id")
            .and_then(Value::as_u64)
            .map(|id| id as u32)
            .unwrap_or(index as u32 + 1),
        question: text.to_string(),
        category: value
            .get("category")
            .and_then(Value::as_str)
            .filter(|c| !c.trim().is_empty())
            .unwrap_or("General")
            .to_string(),
        difficulty,
        time_limit: difficulty.time_limit(),
    }
}

/// Parses a scoring response object, tolerating code fences and surrounding
/// prose. Missing score defaults to 75; out-of-range scores are clamped.
/// Returns `None` only when the text holds no JSON object at all.
fn parse_score(raw: &str, answer_length: usize) -> Option<ScoreResult> {
    let cleaned = strip_code_fences(raw);
    let value: Value = serde_json::from_str(cleaned).ok().or_else(|| {
        json_object_re()
            .find(cleaned)
            .and_then(|m| serde_json::from_str(m.as_str()).ok())
    })?;
    let object = value.as_object()?;

    let score = object
        .get("score")
        .and_then(Value::as_f64)
        .map(|s| s.round() as i64)
        .unwrap_or(DEFAULT_SCORE)
        .clamp(0, 100);

    let feedback = object
        .get("feedback")
        .and_then(Value::as_str)
        .filter(|f| !f.trim().is_empty())
        .unwrap_or(DEFAULT_FEEDBACK)
        .to_string();

    let matched_keywords = object
        .get("matchedKeywords")
        .or_else(|| object.get("matched_keywords"))
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(ScoreResult {
        score,
        feedback,
        matched_keywords,
        answer_length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_questions_bare_array() {
        let raw = r#"[
            {"id": 1, "question": "What is Rust?", "category": "Languages", "difficulty": "easy"},
            {"id": 2, "question": "Explain async/await?", "category": "Concurrency", "difficulty": "medium"},
            {"id": 3, "question": "Design a cache?", "category": "Systems", "difficulty": "hard"}
        ]"#;
        let questions = parse_questions(raw).unwrap();
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].question, "What is Rust?");
        assert_eq!(questions[0].time_limit, 20);
        assert_eq!(questions[2].difficulty, Difficulty::Hard);
        assert_eq!(questions[2].time_limit, 120);
    }

    #[test]
    fn test_parse_questions_fenced_and_embedded() {
        let raw = "Here are your questions:\n```json\n[{\"question\": \"Q1?\"}, \
                   {\"question\": \"Q2?\"}, {\"question\": \"Q3?\"}]\n```";
        // The fence prefix is prose, so fence stripping alone does not help
        // and the array extraction has to find the JSON.
        let questions = parse_questions(raw).unwrap();
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].category, "General");
    }

    #[test]
    fn test_parse_questions_numbered_lines() {
        let raw = "Sure! Here you go:\n1. What is ownership in Rust?\n\
                   2. How does borrowing work?\n3. When would you use Rc?\n";
        let questions = parse_questions(raw).unwrap();
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].question, "What is ownership in Rust?");
        // Positional difficulty ramp with derived time limits.
        assert_eq!(questions[0].difficulty, Difficulty::Easy);
        assert_eq!(questions[2].difficulty, Difficulty::Medium);
    }

    #[test]
    fn test_parse_questions_positional_difficulty_ramp() {
        let raw = r#"[{"question": "A?"}, {"question": "B?"}, {"question": "C?"},
                      {"question": "D?"}, {"question": "E?"}, {"question": "F?"}]"#;
        let questions = parse_questions(raw).unwrap();
        let difficulties: Vec<Difficulty> = questions.iter().map(|q| q.difficulty).collect();
        assert_eq!(
            difficulties,
            vec![
                Difficulty::Easy,
                Difficulty::Easy,
                Difficulty::Medium,
                Difficulty::Medium,
                Difficulty::Hard,
                Difficulty::Hard,
            ]
        );
        let ids: Vec<u32> = questions.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_parse_questions_rejects_thin_sets() {
        assert!(parse_questions("no questions here at all").is_none());
        assert!(parse_questions(r#"[{"question": "Only one?"}, {"question": "Two?"}]"#).is_none());
        // Blank texts do not count toward the minimum.
        assert!(parse_questions(r#"[{"question": ""}, {"question": "  "}, {"question": "Q?"}]"#)
            .is_none());
    }

    #[test]
    fn test_parse_score_reads_all_fields() {
        let raw = r#"{"score": 82, "feedback": "Solid answer.", "matchedKeywords": ["api"]}"#;
        let result = parse_score(raw, 120).unwrap();
        assert_eq!(result.score, 82);
        assert_eq!(result.feedback, "Solid answer.");
        assert_eq!(result.matched_keywords, vec!["api"]);
        assert_eq!(result.answer_length, 120);
    }

    #[test]
    fn test_parse_score_defaults_and_clamps() {
        let missing = parse_score(r#"{"feedback": "ok"}"#, 10).unwrap();
        assert_eq!(missing.score, 75);

        let high = parse_score(r#"{"score": 140}"#, 10).unwrap();
        assert_eq!(high.score, 100);
        assert_eq!(high.feedback, DEFAULT_FEEDBACK);

        let negative = parse_score(r#"{"score": -5}"#, 10).unwrap();
        assert_eq!(negative.score, 0);
    }

    #[test]
    fn test_parse_score_extracts_object_from_prose() {
        let raw = "Here is my evaluation: {\"score\": 64, \"feedback\": \"Decent.\"} Hope that helps!";
        let result = parse_score(raw, 40).unwrap();
        assert_eq!(result.score, 64);
        assert_eq!(result.feedback, "Decent.");
    }

    #[test]
    fn test_parse_score_rejects_non_objects() {
        assert!(parse_score("the answer was fine", 10).is_none());
        assert!(parse_score("[1, 2, 3]", 10).is_none());
    }

    #[test]
    fn test_unusable_response_is_an_error_for_retry() {
        assert!(usable_questions("I cannot help with that.").is_err());
        assert!(usable_questions(r#"[{"question": "Only one?"}]"#).is_err());

        let ok = usable_questions(
            r#"[{"question": "A?"}, {"question": "B?"}, {"question": "C?"}]"#,
        )
        .unwrap();
        assert_eq!(ok.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_responses_consume_retry_attempts() {
        use std::sync::atomic::{AtomicU32, Ordering};
        use std::sync::Arc;

        // Two malformed responses burn two attempts; the third parses, so
        // the policy resolves without touching the fallback bank.
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = with_retry(RetryPolicy::default(), || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    usable_questions("Sorry, here is an essay instead.")
                } else {
                    usable_questions(
                        r#"[{"question": "A?"}, {"question": "B?"}, {"question": "C?"}]"#,
                    )
                }
            }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_offline_engine_uses_fallback_bank() {
        let engine = ScoringEngine::new(None);
        let questions = engine.generate_questions("Ten years of Rust.").await;
        assert_eq!(questions, fallback_questions());
    }

    #[tokio::test]
    async fn test_offline_engine_scores_heuristically() {
        let engine = ScoringEngine::new(None);
        let question = &fallback_questions()[2];

        let guarded = engine.score_answer(question, "jkl").await;
        assert_eq!(guarded.score, 10);

        let answer = "I would profile the slow path first and then optimize the algorithm.";
        let scored = engine.score_answer(question, answer).await;
        assert_eq!(scored.score, heuristic_score(question.difficulty, answer).score);
    }
}
