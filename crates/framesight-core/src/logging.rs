//! Structured logging schema and field name constants for framesight.
//!
//! All crates use these constants for consistent structured logging
//! fields, so log aggregation tools can query by standardized names
//! across every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events (startup, shutdown), job completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-frame iteration, high-volume data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Correlation ID propagated across request → job → sub-calls.
/// Format: UUIDv7 (time-ordered).
pub const REQUEST_ID: &str = "request_id";

/// Subsystem originating the log event.
/// Values: "api", "db", "detect", "jobs"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "worker", "pool", "remote_detector", "ffmpeg"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "submit", "claim_next", "detect_frame", "open_video"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Client-facing job token.
pub const JOB_TOKEN: &str = "job_token";

/// Caller-supplied source identifier.
pub const SOURCE_ID: &str = "source_id";

/// Detection type (model routing label).
pub const DETECTION_TYPE: &str = "detection_type";

/// Frame index within the current video.
pub const FRAME_NUMBER: &str = "frame_number";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of frames processed by a job.
pub const FRAME_COUNT: &str = "frame_count";

/// Number of labels detected in a frame.
pub const LABEL_COUNT: &str = "label_count";

// ─── Detector fields ───────────────────────────────────────────────────────

/// Model name used for detection.
pub const MODEL: &str = "model";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
