//! Centralized default constants for the framesight system.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates reference these constants instead of defining their own
//! magic numbers.

// =============================================================================
// SERVER
// =============================================================================

/// Default HTTP server port.
pub const SERVER_PORT: u16 = 8000;

/// Default rate limit: max requests per period.
pub const RATE_LIMIT_REQUESTS: u64 = 100;

/// Default rate limit: period in seconds.
pub const RATE_LIMIT_PERIOD_SECS: u64 = 60;

/// Maximum request body size in bytes (64 KB — submission bodies are tiny).
pub const MAX_BODY_SIZE_BYTES: usize = 64 * 1024;

/// Default CORS max-age in seconds (1 hour).
pub const CORS_MAX_AGE_SECS: u64 = 3600;

// =============================================================================
// TOKENS
// =============================================================================

/// Length of client polling tokens.
pub const TOKEN_LENGTH: usize = 6;

/// Alphabet for polling tokens.
pub const TOKEN_ALPHABET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

/// Maximum insert attempts before giving up on token generation.
pub const TOKEN_MAX_ATTEMPTS: usize = 16;

// =============================================================================
// JOB PROCESSING
// =============================================================================

/// Default worker poll interval when the queue is empty (milliseconds).
pub const JOB_POLL_INTERVAL_MS: u64 = 500;

/// Default maximum concurrent jobs per worker.
pub const JOB_MAX_CONCURRENT: usize = 2;

/// Default job execution timeout in seconds (1 hour — a job spans an
/// entire video).
pub const JOB_TIMEOUT_SECS: u64 = 3600;

/// Event broadcast channel capacity for worker events.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Report progress and update `frames_processed` every N frames.
pub const PROGRESS_STRIDE: i64 = 25;

// =============================================================================
// DETECTION
// =============================================================================

/// Default confidence threshold passed to the detector.
pub const CONFIDENCE_THRESHOLD: f32 = 0.25;

/// Default detector backend base URL.
pub const DETECTOR_URL: &str = "http://127.0.0.1:9090";

/// Timeout for a single frame detection request in seconds.
pub const DETECT_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// PAGINATION
// =============================================================================

/// Default page size for frame result listings.
pub const PAGE_LIMIT_FRAMES: i64 = 100;

/// Default page size for job log listings.
pub const PAGE_LIMIT_LOGS: i64 = 200;

/// Hard ceiling on client-requested page sizes.
pub const PAGE_LIMIT_MAX: i64 = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_alphabet_is_alphanumeric() {
        assert_eq!(TOKEN_ALPHABET.len(), 62);
        assert!(TOKEN_ALPHABET.iter().all(|b| b.is_ascii_alphanumeric()));
    }

    #[test]
    fn confidence_threshold_in_range() {
        assert!(CONFIDENCE_THRESHOLD > 0.0 && CONFIDENCE_THRESHOLD < 1.0);
    }

    #[test]
    fn progress_stride_positive() {
        assert!(PROGRESS_STRIDE > 0);
    }
}
