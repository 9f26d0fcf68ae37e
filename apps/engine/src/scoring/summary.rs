//! Final-summary aggregation over the scored answers of a finished interview.

use chrono::{DateTime, Utc};

use crate::models::{DetailedScore, Difficulty, Rating, ScoredAnswer, Summary};

/// Builds the persisted interview summary: mean score rounded to nearest,
/// five-tier rating, per-difficulty strengths and improvement areas, and the
/// prose write-up.
pub fn build_summary(
    candidate_name: &str,
    answers: &[ScoredAnswer],
    completed_at: DateTime<Utc>,
) -> Summary {
    let total: i64 = answers.iter().map(|a| a.result.score).sum();
    let overall_score = if answers.is_empty() {
        0
    } else {
        // Round half up, matching f64::round over the mean.
        ((total as f64) / (answers.len() as f64)).round() as i64
    };

    let detailed_scores = answers
        .iter()
        .enumerate()
        .map(|(i, a)| DetailedScore {
            question_number: i as u32 + 1,
            question: a.question.question.clone(),
            difficulty: a.question.difficulty,
            score: a.result.score,
            feedback: a.result.feedback.clone(),
            answer: a.answer.clone(),
        })
        .collect();

    let (strengths, areas_for_improvement) = analyze_performance(answers);
    let summary = narrative(overall_score, &strengths, &areas_for_improvement);

    Summary {
        candidate_name: candidate_name.to_string(),
        overall_score,
        overall_rating: Rating::from_score(overall_score),
        total_questions: answers.len(),
        summary,
        strengths,
        areas_for_improvement,
        detailed_scores,
        completed_at,
    }
}

fn scores_at(answers: &[ScoredAnswer], difficulty: Difficulty) -> Vec<i64> {
    answers
        .iter()
        .filter(|a| a.question.difficulty == difficulty)
        .map(|a| a.result.score)
        .collect()
}

/// Per-difficulty tier analysis. Strengths require every score in the tier
/// to clear its bar (80/75/70 for easy/medium/hard); improvements trigger on
/// any score below the tier's floor (70/65/60).
fn analyze_performance(answers: &[ScoredAnswer]) -> (Vec<String>, Vec<String>) {
    let mut strengths = Vec::new();
    let mut improvements = Vec::new();

    let easy = scores_at(answers, Difficulty::Easy);
    let medium = scores_at(answers, Difficulty::Medium);
    let hard = scores_at(answers, Difficulty::Hard);

    if !easy.is_empty() && easy.iter().all(|&s| s >= 80) {
        strengths.push("Strong performance on fundamental questions".to_string());
    }
    if !medium.is_empty() && medium.iter().all(|&s| s >= 75) {
        strengths.push("Good understanding of intermediate concepts".to_string());
    }
    if !hard.is_empty() && hard.iter().all(|&s| s >= 70) {
        strengths.push("Excellent problem-solving skills on complex questions".to_string());
    }

    if easy.iter().any(|&s| s < 70) {
        improvements.push("Review fundamental concepts and basic technical knowledge".to_string());
    }
    if medium.iter().any(|&s| s < 65) {
        improvements.push("Practice intermediate-level problem solving".to_string());
    }
    if hard.iter().any(|&s| s < 60) {
        improvements
            .push("Focus on advanced technical concepts and complex problem solving".to_string());
    }

    if !answers.is_empty() {
        let mean = answers.iter().map(|a| a.result.score).sum::<i64>() as f64
            / answers.len() as f64;
        if mean >= 85.0 {
            strengths.push("Consistent high performance across all question types".to_string());
        } else if mean < 60.0 {
            improvements.push(
                "Consider additional study and practice with technical interview questions"
                    .to_string(),
            );
        }
    }

    if strengths.is_empty() {
        strengths.push("Completed all interview questions successfully".to_string());
    }
    if improvements.is_empty() {
        improvements.push("Continue practicing to maintain current performance level".to_string());
    }

    (strengths, improvements)
}

fn narrative(overall_score: i64, strengths: &[String], improvements: &[String]) -> String {
    let mut text = format!("The candidate achieved an overall score of {overall_score}/100. ");

    text.push_str(if overall_score >= 90 {
        "This represents an outstanding performance with excellent technical knowledge and \
         communication skills. "
    } else if overall_score >= 80 {
        "This demonstrates strong technical competency with good problem-solving abilities. "
    } else if overall_score >= 70 {
        "This shows solid technical understanding with room for growth in certain areas. "
    } else if overall_score >= 60 {
        "This indicates basic technical knowledge with significant opportunities for improvement. "
    } else {
        "This suggests the need for additional technical preparation and practice. "
    });

    if !strengths.is_empty() {
        text.push_str(&format!("Key strengths include: {}. ", strengths.join(", ")));
    }
    if !improvements.is_empty() {
        text.push_str(&format!(
            "Areas for improvement include: {}. ",
            improvements.join(", ")
        ));
    }

    text.push_str(
        "Overall, this interview provides valuable insights into the candidate's technical \
         capabilities and areas for continued development.",
    );
    text
}
