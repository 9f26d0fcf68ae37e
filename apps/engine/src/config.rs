use anyhow::Result;

/// Application configuration loaded from environment variables.
/// Everything has a workable default: without an API key the engine runs
/// fully offline on the deterministic fallback paths.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Scoring-backend credential. `None` disables the network path entirely.
    pub groq_api_key: Option<String>,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://interview.db".to_string()),
            groq_api_key: std::env::var("GROQ_API_KEY").ok().filter(|k| {
                // An unset placeholder from a template .env counts as absent.
                !k.trim().is_empty() && k != "your_groq_api_key_here"
            }),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}
