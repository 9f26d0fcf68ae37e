//! Deterministic offline paths: the fixed question bank and the heuristic
//! answer scorer. These guarantee the interview can always proceed with no
//! network credential and no backend.

use crate::models::{Difficulty, Question, ScoreResult};

/// Fixed vocabulary used to detect technical content in an answer.
pub const TECHNICAL_KEYWORDS: &[&str] = &[
    "function",
    "code",
    "algorithm",
    "data",
    "structure",
    "programming",
    "python",
    "javascript",
    "java",
    "optimize",
    "performance",
    "complexity",
    "loop",
    "variable",
    "method",
    "class",
    "array",
    "list",
    "database",
    "api",
    "framework",
];

/// Placeholder strings people type to poke at the interview.
const THROWAWAY_ANSWERS: &[&str] = &["jkl", "asd", "test", "hello"];

const CODE_TOKENS: &[&str] = &["def ", "function", "return", "for ", "if "];

const OPTIMIZATION_TOKENS: &[&str] = &["optimize", "complexity", "performance", "efficient"];

pub const INVALID_RESPONSE_FEEDBACK: &str = "This appears to be a test input or invalid \
response. Please provide a proper technical answer to the question.";

/// The deterministic question bank used whenever the backend is unavailable
/// or returns something unusable. Difficulties run easy, easy, medium,
/// medium, hard, hard with time limits 20, 20, 60, 60, 120, 120.
pub fn fallback_questions() -> Vec<Question> {
    let bank: [(&str, &str, Difficulty); 6] = [
        (
            "Tell me about your technical background and the programming languages you're most comfortable with.",
            "Technical Skills",
            Difficulty::Easy,
        ),
        (
            "Describe a technical project you've worked on recently. What technologies did you use and what challenges did you face?",
            "Projects",
            Difficulty::Easy,
        ),
        (
            "Explain a complex technical problem you solved. Walk me through your approach and the solution you implemented.",
            "Problem Solving",
            Difficulty::Medium,
        ),
        (
            "How do you stay updated with the latest technologies and trends in your field? Give examples of recent learning.",
            "Learning",
            Difficulty::Medium,
        ),
        (
            "Describe your experience with version control, testing, and deployment processes. How do you ensure code quality?",
            "Development Practices",
            Difficulty::Hard,
        ),
        (
            "Explain a time when you had to learn a new technology quickly for a project. How did you approach the learning process?",
            "Adaptability",
            Difficulty::Hard,
        ),
    ];

    bank.iter()
        .enumerate()
        .map(|(i, (question, category, difficulty))| Question {
            id: i as u32 + 1,
            question: question.to_string(),
            category: category.to_string(),
            difficulty: *difficulty,
            time_limit: difficulty.time_limit(),
        })
        .collect()
}

/// The invalid-input guard shared by both scoring paths. Runs before any
/// network attempt: a throwaway token or a sub-3-character answer is scored
/// 10 without ever reaching the backend.
pub fn throwaway_guard(answer: &str) -> Option<ScoreResult> {
    let trimmed = answer.trim().to_lowercase();
    if trimmed.len() < 3 || THROWAWAY_ANSWERS.contains(&trimmed.as_str()) {
        return Some(ScoreResult {
            score: 10,
            feedback: INVALID_RESPONSE_FEEDBACK.to_string(),
            matched_keywords: Vec::new(),
            answer_length: answer.len(),
        });
    }
    None
}

/// Deterministic heuristic scorer: an escalating point scheme over answer
/// length, technical vocabulary, code-like tokens, and optimization talk,
/// with a per-difficulty adjustment, clamped to [0, 100].
pub fn heuristic_score(difficulty: Difficulty, answer: &str) -> ScoreResult {
    if let Some(result) = throwaway_guard(answer) {
        return result;
    }

    let answer_length = answer.len();
    let text = answer.trim().to_lowercase();

    if answer_length < 10 {
        return ScoreResult {
            score: 20,
            feedback: "Your answer is too short. Please provide a more detailed explanation \
                       with specific technical details and examples."
                .to_string(),
            matched_keywords: Vec::new(),
            answer_length,
        };
    }

    let matched_keywords: Vec<String> = TECHNICAL_KEYWORDS
        .iter()
        .filter(|kw| text.contains(*kw))
        .map(|kw| kw.to_string())
        .collect();
    let has_technical_content = !matched_keywords.is_empty();

    if !has_technical_content && answer_length < 50 {
        return ScoreResult {
            score: 30,
            feedback: "Your answer lacks technical depth. Please provide specific technical \
                       details, code examples, or programming concepts relevant to the question."
                .to_string(),
            matched_keywords,
            answer_length,
        };
    }

    let mut base: i64 = 40;

    if answer_length >= 50 {
        base += 15;
    }
    if answer_length >= 100 {
        base += 15;
    }
    if answer_length >= 200 {
        base += 10;
    }

    if has_technical_content {
        base += 20;
    }

    match difficulty {
        Difficulty::Easy => base += 5,
        Difficulty::Medium => {}
        Difficulty::Hard => base -= 5,
    }

    if CODE_TOKENS.iter().any(|t| text.contains(t)) {
        base += 10;
    }
    if OPTIMIZATION_TOKENS.iter().any(|t| text.contains(t)) {
        base += 10;
    }

    let score = base.clamp(0, 100);

    let feedback = if score >= 85 {
        "Excellent technical response! You demonstrated strong technical knowledge with \
         specific details and examples."
    } else if score >= 70 {
        "Good technical answer! You provided relevant technical information with some \
         specific details."
    } else if score >= 50 {
        "Adequate answer. Consider adding more specific technical details, code examples, \
         or implementation details."
    } else if score >= 30 {
        "Your answer needs more technical depth. Please provide specific programming \
         concepts, code examples, or technical implementation details."
    } else {
        "Please provide a proper technical answer with specific details, code examples, \
         or programming concepts relevant to the question."
    };

    ScoreResult {
        score,
        feedback: feedback.to_string(),
        matched_keywords,
        answer_length,
    }
}
