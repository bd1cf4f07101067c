//! Job handler trait and execution context.

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use framesight_core::DetectionJob;

/// Progress callback type for job handlers.
///
/// Receives the running frame count and an optional message.
pub type ProgressCallback = Box<dyn Fn(i64, Option<&str>) + Send + Sync>;

/// Context provided to job handlers.
pub struct JobContext {
    /// The job being processed.
    pub job: DetectionJob,
    /// Progress callback for surfacing frame counts to the worker.
    progress_callback: Option<ProgressCallback>,
}

impl JobContext {
    /// Create a new job context.
    pub fn new(job: DetectionJob) -> Self {
        Self {
            job,
            progress_callback: None,
        }
    }

    /// Set the progress callback.
    pub fn with_progress_callback<F>(mut self, callback: F) -> Self
    where
        F: Fn(i64, Option<&str>) + Send + Sync + 'static,
    {
        self.progress_callback = Some(Box::new(callback));
        self
    }

    /// Report progress to the callback.
    pub fn report_progress(&self, frames_processed: i64, message: Option<&str>) {
        if let Some(ref callback) = self.progress_callback {
            callback(frames_processed, message);
        }
    }

    /// The job's polling token.
    pub fn token(&self) -> &str {
        &self.job.token
    }
}

/// Result of job execution.
#[derive(Debug)]
pub enum JobResult {
    /// Job completed successfully with optional result data.
    Success(Option<JsonValue>),
    /// Job failed with an error message.
    Failed(String),
}

impl JobResult {
    /// Extract the processed frame count from a success payload.
    pub fn frames_processed(&self) -> i64 {
        match self {
            JobResult::Success(Some(data)) => {
                data.get("frames_processed").and_then(JsonValue::as_i64).unwrap_or(0)
            }
            _ => 0,
        }
    }
}

/// Trait for job handlers.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Execute the job.
    async fn execute(&self, ctx: JobContext) -> JobResult;
}

/// No-op handler for testing.
pub struct NoOpHandler;

#[async_trait]
impl JobHandler for NoOpHandler {
    async fn execute(&self, ctx: JobContext) -> JobResult {
        ctx.report_progress(0, Some("Processing..."));
        JobResult::Success(None)
    }
}
