use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use tracing::info;

use crate::db::create_pool;
use crate::errors::EngineError;
use crate::models::{
    Candidate, CandidatePatch, ChatBody, ChatMessage, InterviewSession, NewCandidate,
    NewInterviewSession, SessionPatch, SessionStatus,
};

/// Local persistence store backing candidates, chat messages, and interview
/// sessions. Explicitly constructed and passed by reference; there is no
/// ambient global instance.
///
/// Every operation is individually atomic, but there is no multi-record
/// transaction and no optimistic-concurrency check: two tabs running a
/// read-modify-merge update against the same record can race, and the later
/// write wins. This is an accepted limitation, not remediated by locking.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct ChatRow {
    id: i64,
    candidate_id: i64,
    body: String,
    timestamp: DateTime<Utc>,
}

impl ChatRow {
    fn decode(self) -> Result<ChatMessage, EngineError> {
        let body: ChatBody = serde_json::from_str(&self.body)
            .map_err(|e| EngineError::Internal(anyhow::anyhow!("corrupt chat message: {e}")))?;
        Ok(ChatMessage {
            id: self.id,
            candidate_id: self.candidate_id,
            body,
            timestamp: self.timestamp,
        })
    }
}

impl Store {
    /// Opens (creating if necessary) the database behind `database_url` and
    /// applies the schema.
    pub async fn open(database_url: &str) -> Result<Self, EngineError> {
        let pool = create_pool(database_url).await?;
        Ok(Store { pool })
    }

    /// Wraps an existing pool. Used by tests that manage their own database.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Store { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Store closed");
    }

    // ── Candidates ──────────────────────────────────────────────────────────

    /// Inserts a candidate, assigning its key and creation timestamp.
    /// A duplicate email is a store-level conflict surfaced as
    /// [`EngineError::DuplicateEmail`].
    pub async fn add_candidate(&self, new: NewCandidate) -> Result<i64, EngineError> {
        let result = sqlx::query(
            r#"
            INSERT INTO candidates
                (name, email, phone, resume_text, uploaded_at, interview_completed, created_at)
            VALUES (?, ?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(&new.name)
        .bind(&new.email)
        .bind(&new.phone)
        .bind(&new.resume_text)
        .bind(new.uploaded_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.last_insert_rowid()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(EngineError::DuplicateEmail(new.email))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_candidate(&self, id: i64) -> Result<Candidate, EngineError> {
        sqlx::query_as::<_, Candidate>("SELECT * FROM candidates WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("candidate {id}")))
    }

    pub async fn get_all_candidates(&self) -> Result<Vec<Candidate>, EngineError> {
        Ok(
            sqlx::query_as::<_, Candidate>("SELECT * FROM candidates ORDER BY created_at")
                .fetch_all(&self.pool)
                .await?,
        )
    }

    /// Dashboard ordering: highest final score first, unscored candidates last.
    pub async fn get_candidates_by_score(&self) -> Result<Vec<Candidate>, EngineError> {
        Ok(sqlx::query_as::<_, Candidate>(
            "SELECT * FROM candidates ORDER BY final_score IS NULL, final_score DESC",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    /// Read-modify-merge-write update: the existing record is read, the
    /// supplied partial fields are overlaid, and the merged record is written
    /// back. A caller patching only `{final_score}` never erases `email`.
    pub async fn update_candidate(
        &self,
        id: i64,
        patch: CandidatePatch,
    ) -> Result<Candidate, EngineError> {
        let existing = self.get_candidate(id).await?;

        let merged = Candidate {
            id: existing.id,
            name: patch.name.unwrap_or(existing.name),
            email: patch.email.unwrap_or(existing.email),
            phone: patch.phone.unwrap_or(existing.phone),
            resume_text: patch.resume_text.unwrap_or(existing.resume_text),
            uploaded_at: existing.uploaded_at,
            interview_completed: patch
                .interview_completed
                .unwrap_or(existing.interview_completed),
            final_score: patch.final_score.or(existing.final_score),
            completed_at: patch.completed_at.or(existing.completed_at),
            created_at: existing.created_at,
        };

        sqlx::query(
            r#"
            UPDATE candidates
            SET name = ?, email = ?, phone = ?, resume_text = ?,
                interview_completed = ?, final_score = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&merged.name)
        .bind(&merged.email)
        .bind(&merged.phone)
        .bind(&merged.resume_text)
        .bind(merged.interview_completed)
        .bind(merged.final_score)
        .bind(merged.completed_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(merged)
    }

    pub async fn delete_candidate(&self, id: i64) -> Result<(), EngineError> {
        sqlx::query("DELETE FROM candidates WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ── Chat messages ───────────────────────────────────────────────────────

    /// Appends an immutable chat-log entry, stamping the timestamp.
    pub async fn add_chat_message(
        &self,
        candidate_id: i64,
        body: &ChatBody,
    ) -> Result<i64, EngineError> {
        let json = serde_json::to_string(body)
            .map_err(|e| EngineError::Internal(anyhow::anyhow!("encode chat message: {e}")))?;
        let done = sqlx::query(
            "INSERT INTO chat_messages (candidate_id, body, timestamp) VALUES (?, ?, ?)",
        )
        .bind(candidate_id)
        .bind(json)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(done.last_insert_rowid())
    }

    /// The chat log is always fetched per candidate, in insertion order.
    pub async fn get_chat_messages(
        &self,
        candidate_id: i64,
    ) -> Result<Vec<ChatMessage>, EngineError> {
        let rows = sqlx::query_as::<_, ChatRow>(
            "SELECT * FROM chat_messages WHERE candidate_id = ? ORDER BY id",
        )
        .bind(candidate_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ChatRow::decode).collect()
    }

    // ── Interview sessions ──────────────────────────────────────────────────

    pub async fn add_interview_session(
        &self,
        new: NewInterviewSession,
    ) -> Result<i64, EngineError> {
        let done = sqlx::query(
            r#"
            INSERT INTO interview_sessions
                (candidate_id, status, current_question, total_questions, start_time, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(new.candidate_id)
        .bind(new.status)
        .bind(new.current_question)
        .bind(new.total_questions)
        .bind(new.start_time)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(done.last_insert_rowid())
    }

    pub async fn get_interview_session(&self, id: i64) -> Result<InterviewSession, EngineError> {
        sqlx::query_as::<_, InterviewSession>("SELECT * FROM interview_sessions WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("interview session {id}")))
    }

    /// The latest session for a candidate, if any.
    pub async fn latest_session_for(
        &self,
        candidate_id: i64,
    ) -> Result<Option<InterviewSession>, EngineError> {
        Ok(sqlx::query_as::<_, InterviewSession>(
            "SELECT * FROM interview_sessions WHERE candidate_id = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(candidate_id)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// The candidate's in-progress session, if one exists. Backs the
    /// at-most-one-active-session invariant.
    pub async fn active_session_for(
        &self,
        candidate_id: i64,
    ) -> Result<Option<InterviewSession>, EngineError> {
        Ok(sqlx::query_as::<_, InterviewSession>(
            "SELECT * FROM interview_sessions WHERE candidate_id = ? AND status = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(candidate_id)
        .bind(SessionStatus::InProgress)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// Read-modify-merge-write, same contract as [`Store::update_candidate`].
    pub async fn update_interview_session(
        &self,
        id: i64,
        patch: SessionPatch,
    ) -> Result<InterviewSession, EngineError> {
        let existing = self.get_interview_session(id).await?;

        let merged = InterviewSession {
            id: existing.id,
            candidate_id: existing.candidate_id,
            status: patch.status.unwrap_or(existing.status),
            current_question: patch.current_question.unwrap_or(existing.current_question),
            total_questions: existing.total_questions,
            start_time: existing.start_time,
            completed_at: patch.completed_at.or(existing.completed_at),
            created_at: existing.created_at,
        };

        sqlx::query(
            r#"
            UPDATE interview_sessions
            SET status = ?, current_question = ?, completed_at = ?
            WHERE id = ?
            "#,
        )
        .bind(merged.status)
        .bind(merged.current_question)
        .bind(merged.completed_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(merged)
    }

    /// The resumability query run once per tab on load: every session still
    /// marked `in_progress`, via the status index.
    pub async fn get_unfinished_sessions(&self) -> Result<Vec<InterviewSession>, EngineError> {
        Ok(sqlx::query_as::<_, InterviewSession>(
            "SELECT * FROM interview_sessions WHERE status = ? ORDER BY id",
        )
        .bind(SessionStatus::InProgress)
        .fetch_all(&self.pool)
        .await?)
    }
}
