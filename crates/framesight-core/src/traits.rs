//! Core traits for framesight abstractions.
//!
//! These traits define the persistence interfaces that concrete
//! implementations must satisfy, enabling pluggable backends and
//! testability. The database crate provides PostgreSQL implementations;
//! tests use in-memory fakes.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::*;

// =============================================================================
// JOB STATUS REPOSITORY
// =============================================================================

/// Repository for the job status record that clients poll.
#[async_trait]
pub trait JobStatusRepository: Send + Sync {
    /// Create a new job with a fresh unique token and status `InProgress`.
    ///
    /// Token uniqueness is enforced atomically; on collision the
    /// implementation retries with a new token.
    async fn create(&self, req: SubmitDetectionRequest) -> Result<DetectionJob>;

    /// Fetch a job by its polling token.
    async fn find_by_token(&self, token: &str) -> Result<DetectionJob>;

    /// Claim the next unstarted job for processing, setting `started_at`.
    ///
    /// Returns `None` when no unstarted job exists. Implementations must
    /// be safe under concurrent claimers (skip-locked semantics).
    async fn claim_next(&self) -> Result<Option<DetectionJob>>;

    /// Refresh `updated_at` if the job is still in progress.
    ///
    /// Called on every status poll; a no-op for terminal jobs.
    async fn touch(&self, token: &str) -> Result<()>;

    /// Update the frames-processed counter.
    async fn set_progress(&self, token: &str, frames_processed: i64) -> Result<()>;

    /// Mark the job `Completed`.
    async fn complete(&self, token: &str, frames_processed: i64) -> Result<()>;

    /// Mark the job `Failed` with an error message.
    async fn fail(&self, token: &str, error: &str) -> Result<()>;

    /// Count jobs that have not been claimed by a worker yet.
    async fn pending_count(&self) -> Result<i64>;
}

// =============================================================================
// FRAME DETECTION REPOSITORY
// =============================================================================

/// Repository for per-frame detection results.
#[async_trait]
pub trait DetectionRepository: Send + Sync {
    /// Persist one frame's detection result.
    async fn insert(&self, detection: FrameDetection) -> Result<()>;

    /// List frame results for a job, ordered by frame number.
    async fn list_for_token(
        &self,
        token: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FrameDetection>>;

    /// Total frame results persisted for a job.
    async fn count_for_token(&self, token: &str) -> Result<i64>;
}

// =============================================================================
// JOB LOG REPOSITORY
// =============================================================================

/// Repository for client-visible job log lines.
#[async_trait]
pub trait JobLogRepository: Send + Sync {
    /// Append a log line to a job.
    async fn append(&self, token: &str, message: &str) -> Result<()>;

    /// List log lines for a job, oldest first.
    async fn list_for_token(&self, token: &str, limit: i64) -> Result<Vec<JobLogEntry>>;
}
