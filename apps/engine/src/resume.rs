//! Resume intake: text extraction from uploaded files and best-effort
//! contact-detail detection. Whatever cannot be detected is reported as a
//! missing field for the user to fill in before the session is created.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::info;

use crate::errors::EngineError;

/// Lines at the top of the document checked for a plausible name.
const NAME_SCAN_LINES: usize = 5;

/// Words that look like headings rather than names.
const NAME_STOPWORDS: &[&str] = &["resume", "cv", "curriculum", "vitae"];

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b").expect("static regex")
    })
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(\+?1[-.\s]?)?(\(?[0-9]{3}\)?[-.\s]?)?[0-9]{3}[-.\s]?[0-9]{4}")
            .expect("static regex")
    })
}

fn digit_run_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[0-9]{3,}").expect("static regex"))
}

/// Best-effort extraction result. `full_text` is always present; the contact
/// fields are `None` when nothing plausible was found.
#[derive(Debug, Clone)]
pub struct ParsedResume {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub full_text: String,
}

impl ParsedResume {
    /// Fields the user must supply before a session can be created.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.is_none() {
            missing.push("name");
        }
        if self.email.is_none() {
            missing.push("email");
        }
        if self.phone.is_none() {
            missing.push("phone");
        }
        missing
    }
}

/// Extracts text from an uploaded resume file and runs contact detection.
/// Only PDF is supported; a file yielding no text at all is rejected since
/// the interview cannot generate questions from it.
pub fn parse_resume(path: &Path) -> Result<ParsedResume, EngineError> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    if extension != "pdf" {
        return Err(EngineError::Validation(
            "unsupported file format, please upload a PDF file".to_string(),
        ));
    }

    let text = pdf_extract::extract_text(path)
        .map_err(|e| EngineError::Resume(format!("failed to parse resume: {e}")))?;
    if text.trim().is_empty() {
        return Err(EngineError::Validation(
            "resume contains no extractable text, please upload a different file".to_string(),
        ));
    }

    let parsed = extract_info(&text);
    info!(
        "parsed resume: {} characters, missing fields: {:?}",
        parsed.full_text.len(),
        parsed.missing_fields()
    );
    Ok(parsed)
}

/// Contact detection over extracted text: first email match, first phone
/// match, and a name scan over the opening lines.
pub fn extract_info(text: &str) -> ParsedResume {
    ParsedResume {
        name: detect_name(text),
        email: email_re().find(text).map(|m| m.as_str().to_string()),
        phone: phone_re()
            .find(text)
            .map(|m| m.as_str().trim().to_string())
            .filter(|p| !p.is_empty()),
        full_text: text.to_string(),
    }
}

/// A name is 2 to 4 alphabetic words of 2+ letters near the top of the
/// document, skipping anything that looks like a heading, address line, or
/// contact detail.
fn detect_name(text: &str) -> Option<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(NAME_SCAN_LINES)
        .find(|line| {
            if line.len() > 50
                || line.contains('@')
                || line.contains("http")
                || digit_run_re().is_match(line)
            {
                return false;
            }
            let words: Vec<&str> = line.split_whitespace().collect();
            (2..=4).contains(&words.len())
                && words.iter().all(|word| {
                    word.len() > 1
                        && word.chars().all(|c| c.is_ascii_alphabetic())
                        && !NAME_STOPWORDS.contains(&word.to_lowercase().as_str())
                })
        })
        .map(str::to_string)
}
