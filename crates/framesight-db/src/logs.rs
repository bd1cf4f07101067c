//! Job log repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use framesight_core::{Error, JobLogEntry, JobLogRepository, Result};

/// PostgreSQL implementation of JobLogRepository.
#[derive(Clone)]
pub struct PgJobLogRepository {
    pool: Pool<Postgres>,
}

impl PgJobLogRepository {
    /// Create a new PgJobLogRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl JobLogRepository for PgJobLogRepository {
    async fn append(&self, token: &str, message: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO job_log (id, token, message, created_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(Uuid::new_v4())
        .bind(token)
        .bind(message)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn list_for_token(&self, token: &str, limit: i64) -> Result<Vec<JobLogEntry>> {
        let rows = sqlx::query(
            "SELECT id, token, message, created_at
             FROM job_log
             WHERE token = $1
             ORDER BY created_at ASC
             LIMIT $2",
        )
        .bind(token)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows
            .into_iter()
            .map(|row| JobLogEntry {
                id: row.get("id"),
                token: row.get("token"),
                message: row.get("message"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}
