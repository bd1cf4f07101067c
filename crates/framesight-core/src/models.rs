//! Data models for framesight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a detection job.
///
/// Three states, two transitions: `InProgress → Completed` and
/// `InProgress → Failed`. The status record is last-write-wins; clients
/// observe it by polling with the job token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job accepted; the worker either has not started it yet or is
    /// still streaming frames through the detector.
    InProgress,
    /// All frames processed and persisted.
    Completed,
    /// Video could not be opened, or the detector returned an error.
    Failed,
}

impl JobStatus {
    /// Stable string form used in the database and the API.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::InProgress => "in_progress",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Parse a status string from the database. Unknown values fall back
    /// to `InProgress` (lenient parse; the store is last-write-wins).
    pub fn from_str_loose(s: &str) -> Self {
        match s {
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => JobStatus::InProgress,
        }
    }

    /// Whether this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A persisted detection job: one video URL run frame-by-frame through
/// one detection model, tracked by a client-facing token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionJob {
    /// Internal row identifier.
    pub id: Uuid,
    /// Client-facing polling token (6-char alphanumeric, unique).
    pub token: String,
    /// Caller-supplied identifier for the video source.
    pub source_id: String,
    /// URL (or path) of the video to process.
    pub video_url: String,
    /// Label selecting which detection model to run.
    pub detection_type: String,
    /// Current lifecycle status.
    pub status: JobStatus,
    /// Error message for failed jobs.
    pub error_message: Option<String>,
    /// Number of frames processed so far.
    pub frames_processed: i64,
    pub created_at: DateTime<Utc>,
    /// Refreshed on status polls while in progress, and on terminal writes.
    pub updated_at: DateTime<Utc>,
    /// Set when a worker claims the job.
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Per-frame detection result.
///
/// `started_at`/`ended_at` bound the model call for this frame, so the
/// row doubles as a latency record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameDetection {
    pub id: Uuid,
    /// Token of the job that produced this frame.
    pub token: String,
    /// Source identifier copied from the job (denormalized for querying
    /// analytics by source without a join).
    pub source_id: String,
    /// 1-based frame index within the video.
    pub frame_number: i64,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    /// Labels of the objects detected in this frame.
    pub labels: Vec<String>,
}

/// A log line attached to a detection job, readable by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobLogEntry {
    pub id: Uuid,
    pub token: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

/// Request body for submitting a new detection job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitDetectionRequest {
    pub source_id: String,
    pub video_url: String,
    /// Selects which model the detector backend runs.
    pub detection_type: String,
}

impl SubmitDetectionRequest {
    /// Validate that all fields are non-empty.
    pub fn validate(&self) -> crate::Result<()> {
        if self.source_id.trim().is_empty() {
            return Err(crate::Error::InvalidInput("source_id is empty".into()));
        }
        if self.video_url.trim().is_empty() {
            return Err(crate::Error::InvalidInput("video_url is empty".into()));
        }
        if self.detection_type.trim().is_empty() {
            return Err(crate::Error::InvalidInput("detection_type is empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_round_trip() {
        for status in [JobStatus::InProgress, JobStatus::Completed, JobStatus::Failed] {
            assert_eq!(JobStatus::from_str_loose(status.as_str()), status);
        }
    }

    #[test]
    fn test_job_status_unknown_falls_back_to_in_progress() {
        assert_eq!(JobStatus::from_str_loose("pending"), JobStatus::InProgress);
        assert_eq!(JobStatus::from_str_loose(""), JobStatus::InProgress);
        assert_eq!(JobStatus::from_str_loose("garbage"), JobStatus::InProgress);
    }

    #[test]
    fn test_job_status_terminal() {
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_job_status_serde_snake_case() {
        let json = serde_json::to_string(&JobStatus::InProgress).unwrap();
        assert_eq!(json, "\"in_progress\"");
        let back: JobStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(back, JobStatus::Failed);
    }

    #[test]
    fn test_job_status_display() {
        assert_eq!(JobStatus::InProgress.to_string(), "in_progress");
        assert_eq!(JobStatus::Completed.to_string(), "completed");
        assert_eq!(JobStatus::Failed.to_string(), "failed");
    }

    #[test]
    fn test_submit_request_validate_ok() {
        let req = SubmitDetectionRequest {
            source_id: "cam-42".into(),
            video_url: "https://example.com/clip.mp4".into(),
            detection_type: "helmet".into(),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_submit_request_validate_empty_fields() {
        let base = SubmitDetectionRequest {
            source_id: "cam-42".into(),
            video_url: "https://example.com/clip.mp4".into(),
            detection_type: "helmet".into(),
        };

        let mut req = base.clone();
        req.source_id = "  ".into();
        assert!(matches!(
            req.validate(),
            Err(crate::Error::InvalidInput(msg)) if msg.contains("source_id")
        ));

        let mut req = base.clone();
        req.video_url = String::new();
        assert!(matches!(
            req.validate(),
            Err(crate::Error::InvalidInput(msg)) if msg.contains("video_url")
        ));

        let mut req = base;
        req.detection_type = String::new();
        assert!(matches!(
            req.validate(),
            Err(crate::Error::InvalidInput(msg)) if msg.contains("detection_type")
        ));
    }

    #[test]
    fn test_frame_detection_serde() {
        let frame = FrameDetection {
            id: Uuid::new_v4(),
            token: "aB3xY9".into(),
            source_id: "cam-42".into(),
            frame_number: 17,
            started_at: Utc::now(),
            ended_at: Utc::now(),
            labels: vec!["person".into(), "helmet".into()],
        };

        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["frame_number"], 17);
        assert_eq!(json["labels"][0], "person");

        let back: FrameDetection = serde_json::from_value(json).unwrap();
        assert_eq!(back.labels, frame.labels);
        assert_eq!(back.token, frame.token);
    }
}
