//! Job status repository implementation.
//!
//! One row per detection job, keyed by a client-facing polling token.
//! The status column holds the three-state lifecycle; writes are
//! last-write-wins.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Row};
use tracing::debug;
use uuid::Uuid;

use framesight_core::{
    defaults::TOKEN_MAX_ATTEMPTS, generate_token, DetectionJob, Error, JobStatus,
    JobStatusRepository, Result, SubmitDetectionRequest,
};

/// PostgreSQL implementation of JobStatusRepository.
#[derive(Clone)]
pub struct PgJobStatusRepository {
    pool: Pool<Postgres>,
}

impl PgJobStatusRepository {
    /// Create a new PgJobStatusRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Parse a job row into a DetectionJob struct.
    fn parse_job_row(row: sqlx::postgres::PgRow) -> DetectionJob {
        DetectionJob {
            id: row.get("id"),
            token: row.get("token"),
            source_id: row.get("source_id"),
            video_url: row.get("video_url"),
            detection_type: row.get("detection_type"),
            status: JobStatus::from_str_loose(row.get("status")),
            error_message: row.get("error_message"),
            frames_processed: row.get("frames_processed"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
            started_at: row.get("started_at"),
            completed_at: row.get("completed_at"),
        }
    }

    /// One insert attempt with a caller-supplied token.
    ///
    /// Returns `None` when the token is already taken. The unique index
    /// resolves the conflict, not a prior lookup, so there is no
    /// find-then-insert race.
    pub async fn try_insert(
        &self,
        token: String,
        req: &SubmitDetectionRequest,
        now: DateTime<Utc>,
    ) -> Result<Option<DetectionJob>> {
        let row = sqlx::query(
            "INSERT INTO detection_job
                 (id, token, source_id, video_url, detection_type, status,
                  frames_processed, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, 'in_progress', 0, $6, $6)
             ON CONFLICT (token) DO NOTHING
             RETURNING id, token, source_id, video_url, detection_type, status,
                       error_message, frames_processed, created_at, updated_at,
                       started_at, completed_at",
        )
        .bind(Uuid::new_v4())
        .bind(&token)
        .bind(&req.source_id)
        .bind(&req.video_url)
        .bind(&req.detection_type)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }
}

/// Retry token generation until an insert lands, bounded by
/// `TOKEN_MAX_ATTEMPTS`.
async fn insert_with_unique_token<F, Fut>(mut attempt: F) -> Result<DetectionJob>
where
    F: FnMut(String) -> Fut,
    Fut: std::future::Future<Output = Result<Option<DetectionJob>>>,
{
    for _ in 0..TOKEN_MAX_ATTEMPTS {
        if let Some(job) = attempt(generate_token()).await? {
            return Ok(job);
        }
        debug!(
            subsystem = "db",
            component = "status",
            op = "create",
            "Token collision, retrying with a fresh token"
        );
    }

    Err(Error::Internal(format!(
        "Failed to generate a unique token after {} attempts",
        TOKEN_MAX_ATTEMPTS
    )))
}

#[async_trait]
impl JobStatusRepository for PgJobStatusRepository {
    async fn create(&self, req: SubmitDetectionRequest) -> Result<DetectionJob> {
        let now = Utc::now();
        insert_with_unique_token(|token| self.try_insert(token, &req, now)).await
    }

    async fn find_by_token(&self, token: &str) -> Result<DetectionJob> {
        let row = sqlx::query(
            "SELECT id, token, source_id, video_url, detection_type, status,
                    error_message, frames_processed, created_at, updated_at,
                    started_at, completed_at
             FROM detection_job WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        row.map(Self::parse_job_row)
            .ok_or_else(|| Error::JobNotFound(token.to_string()))
    }

    async fn claim_next(&self) -> Result<Option<DetectionJob>> {
        let now = Utc::now();

        // A claimed job stays in_progress; started_at marks the claim.
        // FOR UPDATE SKIP LOCKED keeps concurrent claimers from blocking
        // on each other.
        let row = sqlx::query(
            "UPDATE detection_job
             SET started_at = $1, updated_at = $1
             WHERE id = (
                 SELECT id FROM detection_job
                 WHERE status = 'in_progress' AND started_at IS NULL
                 ORDER BY created_at ASC
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             RETURNING id, token, source_id, video_url, detection_type, status,
                       error_message, frames_processed, created_at, updated_at,
                       started_at, completed_at",
        )
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(row.map(Self::parse_job_row))
    }

    async fn touch(&self, token: &str) -> Result<()> {
        sqlx::query(
            "UPDATE detection_job SET updated_at = $1
             WHERE token = $2 AND status = 'in_progress'",
        )
        .bind(Utc::now())
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn set_progress(&self, token: &str, frames_processed: i64) -> Result<()> {
        sqlx::query(
            "UPDATE detection_job SET frames_processed = $1, updated_at = $2
             WHERE token = $3",
        )
        .bind(frames_processed)
        .bind(Utc::now())
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn complete(&self, token: &str, frames_processed: i64) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE detection_job
             SET status = 'completed', frames_processed = $1,
                 completed_at = $2, updated_at = $2
             WHERE token = $3",
        )
        .bind(frames_processed)
        .bind(now)
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn fail(&self, token: &str, error: &str) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            "UPDATE detection_job
             SET status = 'failed', error_message = $1,
                 completed_at = $2, updated_at = $2
             WHERE token = $3",
        )
        .bind(error)
        .bind(now)
        .bind(token)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn pending_count(&self) -> Result<i64> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM detection_job
             WHERE status = 'in_progress' AND started_at IS NULL",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(count.0)
    }
}
