use thiserror::Error;

/// Engine-level error type returned across the public API boundary.
///
/// Scoring and question-generation failures never appear here: those paths
/// are fail-open (retry, then deterministic fallback) and are only logged.
/// What does surface is what the UI layer must show the user: validation
/// failures and persistence problems.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("A candidate with email '{0}' already exists")]
    DuplicateEmail(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Resume parsing error: {0}")]
    Resume(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}
