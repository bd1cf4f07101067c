//! Mock detection backend for deterministic testing.
//!
//! Provides a mock [`FrameDetector`] that returns configured labels,
//! logs every call for assertion, and can inject failures.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use framesight_detect::{Frame, FrameDetector, MockDetector};
//!
//! # async fn example() {
//! let detector = MockDetector::new("helmet")
//!     .with_labels_for_frame(3, vec!["person", "helmet"])
//!     .with_default_labels(vec!["person"]);
//!
//! let frame = Frame { index: 3, width: 2, height: 2, data: vec![0; 12] };
//! let detections = detector.detect(&frame).await.unwrap();
//! assert_eq!(detections.len(), 2);
//! # }
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use framesight_core::{Error, Result};

use crate::detector::{Detection, Frame, FrameDetector};

/// Mock detection backend for testing.
#[derive(Clone)]
pub struct MockDetector {
    config: Arc<MockConfig>,
    call_log: Arc<Mutex<Vec<MockCall>>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    model: String,
    frame_labels: HashMap<i64, Vec<Detection>>,
    default_labels: Vec<Detection>,
    latency_ms: u64,
    fail_on_frame: Option<i64>,
    fail_all: bool,
    healthy: bool,
}

/// One recorded detect call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub frame_number: i64,
    pub byte_len: usize,
    pub timestamp: std::time::Instant,
}

impl MockConfig {
    fn new(model: String) -> Self {
        Self {
            model,
            frame_labels: HashMap::new(),
            default_labels: Vec::new(),
            latency_ms: 0,
            fail_on_frame: None,
            fail_all: false,
            healthy: true,
        }
    }
}

fn detections_from(labels: Vec<&str>) -> Vec<Detection> {
    labels
        .into_iter()
        .map(|label| Detection {
            label: label.to_string(),
            confidence: 0.9,
        })
        .collect()
}

impl MockDetector {
    /// Create a new mock detector for the given model name.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            config: Arc::new(MockConfig::new(model.into())),
            call_log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Labels returned for frames with no specific mapping.
    pub fn with_default_labels(mut self, labels: Vec<&str>) -> Self {
        Arc::make_mut(&mut self.config).default_labels = detections_from(labels);
        self
    }

    /// Labels returned for one specific frame number.
    pub fn with_labels_for_frame(mut self, frame_number: i64, labels: Vec<&str>) -> Self {
        Arc::make_mut(&mut self.config)
            .frame_labels
            .insert(frame_number, detections_from(labels));
        self
    }

    /// Set simulated latency per detect call.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Fail when the given frame number is detected.
    pub fn with_failure_on_frame(mut self, frame_number: i64) -> Self {
        Arc::make_mut(&mut self.config).fail_on_frame = Some(frame_number);
        self
    }

    /// Fail every detect call.
    pub fn with_failure(mut self) -> Self {
        Arc::make_mut(&mut self.config).fail_all = true;
        self
    }

    /// Set the health check result.
    pub fn with_healthy(mut self, healthy: bool) -> Self {
        Arc::make_mut(&mut self.config).healthy = healthy;
        self
    }

    /// Get all logged calls for assertion.
    pub fn get_calls(&self) -> Vec<MockCall> {
        self.call_log.lock().unwrap().clone()
    }

    /// Number of detect calls made.
    pub fn call_count(&self) -> usize {
        self.call_log.lock().unwrap().len()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.call_log.lock().unwrap().clear()
    }
}

#[async_trait]
impl FrameDetector for MockDetector {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>> {
        self.call_log.lock().unwrap().push(MockCall {
            frame_number: frame.index,
            byte_len: frame.data.len(),
            timestamp: std::time::Instant::now(),
        });

        if self.config.latency_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.config.latency_ms)).await;
        }

        if self.config.fail_all || self.config.fail_on_frame == Some(frame.index) {
            return Err(Error::Detection(format!(
                "Simulated detection failure on frame {}",
                frame.index
            )));
        }

        Ok(self
            .config
            .frame_labels
            .get(&frame.index)
            .cloned()
            .unwrap_or_else(|| self.config.default_labels.clone()))
    }

    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(self.config.healthy)
    }
}
