//! Append-only system error sink
//!
//! Records pipeline stage failures with their stage tag and the
//! originating user identity. Writes are best-effort: a sink failure is
//! logged and swallowed, never propagated into the request outcome.

use sqlx::SqlitePool;
use tracing::warn;

#[derive(Clone)]
pub struct ErrorSink {
    pool: SqlitePool,
}

impl ErrorSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a stage failure. Never fails the caller.
    pub async fn report(&self, message: &str, stage: &str, user_id: Option<i64>) {
        let result = sqlx::query(
            "INSERT INTO system_error_log (message, stage, user_id) VALUES (?, ?, ?)",
        )
        .bind(message)
        .bind(stage)
        .bind(user_id)
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            warn!(stage, error = %e, "Failed to persist system error record");
        }
    }

    /// Most recent error records, newest first.
    pub async fn recent(
        &self,
        limit: i64,
    ) -> Result<Vec<trino_common::db::models::SystemErrorRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT error_id, message, stage, user_id, created_at \
             FROM system_error_log ORDER BY created_at DESC, error_id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
    }
}
