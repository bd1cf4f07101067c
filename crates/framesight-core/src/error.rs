//! Error types for framesight.

use thiserror::Error;

/// Result type alias using framesight's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for framesight operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Detection job not found for the given token
    #[error("Detection job not found: {0}")]
    JobNotFound(String),

    /// Detector backend failed
    #[error("Detection error: {0}")]
    Detection(String),

    /// Video source could not be opened or decoded
    #[error("Video error: {0}")]
    Video(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP/network request failed
    #[error("Request error: {0}")]
    Request(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Error::Request(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("test resource".to_string());
        assert_eq!(err.to_string(), "Not found: test resource");
    }

    #[test]
    fn test_error_display_job_not_found() {
        let err = Error::JobNotFound("aB3xY9".to_string());
        assert_eq!(err.to_string(), "Detection job not found: aB3xY9");
    }

    #[test]
    fn test_error_display_detection() {
        let err = Error::Detection("model timeout".to_string());
        assert_eq!(err.to_string(), "Detection error: model timeout");
    }

    #[test]
    fn test_error_display_video() {
        let err = Error::Video("failed to open source".to_string());
        assert_eq!(err.to_string(), "Video error: failed to open source");
    }

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("missing DETECTOR_URL".to_string());
        assert_eq!(err.to_string(), "Configuration error: missing DETECTOR_URL");
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("empty video_url".to_string());
        assert_eq!(err.to_string(), "Invalid input: empty video_url");
    }

    #[test]
    fn test_error_display_internal() {
        let err = Error::Internal("unexpected state".to_string());
        assert_eq!(err.to_string(), "Internal error: unexpected state");
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number");
        assert!(json_err.is_err());

        let err: Error = json_err.unwrap_err().into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }

    #[test]
    fn test_result_type_ok() {
        fn get_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(get_result().unwrap(), 42);
    }
}
