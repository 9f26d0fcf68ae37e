use std::str::FromStr;

use anyhow::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

/// Creates the SQLite pool and applies the schema.
///
/// One connection only: the store models a single local profile and SQLite
/// has a single writer anyway. This also makes `sqlite::memory:` behave:
/// with more connections each one would see its own empty database.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    info!("Opening SQLite database at {database_url}");

    let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;

    info!("SQLite schema ready");
    Ok(pool)
}

/// Idempotent schema migration. Three collections, each with an
/// auto-assigned integer primary key, plus the secondary indices the
/// dashboard and resumability queries rely on.
async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS candidates (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            name                TEXT NOT NULL,
            email               TEXT NOT NULL,
            phone               TEXT NOT NULL,
            resume_text         TEXT NOT NULL,
            uploaded_at         TEXT,
            interview_completed INTEGER NOT NULL DEFAULT 0,
            final_score         INTEGER,
            completed_at        TEXT,
            created_at          TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE UNIQUE INDEX IF NOT EXISTS idx_candidates_email ON candidates(email)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_candidates_score ON candidates(final_score)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_candidates_created_at ON candidates(created_at)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chat_messages (
            id           INTEGER PRIMARY KEY AUTOINCREMENT,
            candidate_id INTEGER NOT NULL,
            body         TEXT NOT NULL,
            timestamp    TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chat_messages_candidate_id ON chat_messages(candidate_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chat_messages_timestamp ON chat_messages(timestamp)")
        .execute(pool)
        .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS interview_sessions (
            id               INTEGER PRIMARY KEY AUTOINCREMENT,
            candidate_id     INTEGER NOT NULL,
            status           TEXT NOT NULL,
            current_question INTEGER NOT NULL DEFAULT 0,
            total_questions  INTEGER NOT NULL,
            start_time       TEXT NOT NULL,
            completed_at     TEXT,
            created_at       TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_interview_sessions_candidate_id ON interview_sessions(candidate_id)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_interview_sessions_status ON interview_sessions(status)")
        .execute(pool)
        .await?;

    Ok(())
}
