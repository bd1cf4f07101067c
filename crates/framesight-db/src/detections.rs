//! Per-frame detection result repository implementation.

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};

use framesight_core::{DetectionRepository, Error, FrameDetection, Result};

/// PostgreSQL implementation of DetectionRepository.
///
/// Labels are stored as a `TEXT[]` column; one row per processed frame.
#[derive(Clone)]
pub struct PgDetectionRepository {
    pool: Pool<Postgres>,
}

impl PgDetectionRepository {
    /// Create a new PgDetectionRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    fn parse_row(row: sqlx::postgres::PgRow) -> FrameDetection {
        FrameDetection {
            id: row.get("id"),
            token: row.get("token"),
            source_id: row.get("source_id"),
            frame_number: row.get("frame_number"),
            started_at: row.get("started_at"),
            ended_at: row.get("ended_at"),
            labels: row.get("labels"),
        }
    }
}

#[async_trait]
impl DetectionRepository for PgDetectionRepository {
    async fn insert(&self, detection: FrameDetection) -> Result<()> {
        sqlx::query(
            "INSERT INTO frame_detection
                 (id, token, source_id, frame_number, started_at, ended_at, labels)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(detection.id)
        .bind(&detection.token)
        .bind(&detection.source_id)
        .bind(detection.frame_number)
        .bind(detection.started_at)
        .bind(detection.ended_at)
        .bind(&detection.labels)
        .execute(&self.pool)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn list_for_token(
        &self,
        token: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FrameDetection>> {
        let rows = sqlx::query(
            "SELECT id, token, source_id, frame_number, started_at, ended_at, labels
             FROM frame_detection
             WHERE token = $1
             ORDER BY frame_number ASC
             LIMIT $2 OFFSET $3",
        )
        .bind(token)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(rows.into_iter().map(Self::parse_row).collect())
    }

    async fn count_for_token(&self, token: &str) -> Result<i64> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM frame_detection WHERE token = $1")
                .bind(token)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;

        Ok(count.0)
    }
}
