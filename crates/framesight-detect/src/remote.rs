//! HTTP inference backend.
//!
//! Sends one request per frame to a detection server. The server hosts
//! one model per detection type; the job's `detection_type` is passed as
//! the model name, replacing per-type weight files with server-side
//! model routing.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::debug;

use framesight_core::defaults::{CONFIDENCE_THRESHOLD, DETECT_TIMEOUT_SECS, DETECTOR_URL};
use framesight_core::{Error, Result};

use crate::detector::{Detection, Frame, FrameDetector};

/// Configuration for the remote detector backend.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Base URL of the inference server.
    pub base_url: String,
    /// Minimum confidence for returned detections.
    pub confidence_threshold: f32,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            base_url: DETECTOR_URL.to_string(),
            confidence_threshold: CONFIDENCE_THRESHOLD,
            timeout_secs: DETECT_TIMEOUT_SECS,
        }
    }
}

impl DetectorConfig {
    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `DETECTOR_URL` | `http://127.0.0.1:9090` | Inference server base URL |
    /// | `DETECTOR_CONF_THRESHOLD` | `0.25` | Confidence cutoff |
    /// | `DETECTOR_TIMEOUT_SECS` | `30` | Per-frame request timeout |
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("DETECTOR_URL").unwrap_or_else(|_| DETECTOR_URL.to_string());

        let confidence_threshold = std::env::var("DETECTOR_CONF_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<f32>().ok())
            .map(|v| v.clamp(0.0, 1.0))
            .unwrap_or(CONFIDENCE_THRESHOLD);

        let timeout_secs = std::env::var("DETECTOR_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DETECT_TIMEOUT_SECS);

        Self {
            base_url,
            confidence_threshold,
            timeout_secs,
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the confidence threshold.
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold.clamp(0.0, 1.0);
        self
    }
}

/// HTTP detection backend.
pub struct RemoteDetector {
    config: DetectorConfig,
    /// Model name on the inference server (the job's detection type).
    model: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct DetectRequest {
    model: String,
    width: u32,
    height: u32,
    /// Base64-encoded raw RGB24 pixels.
    image: String,
    confidence_threshold: f32,
}

#[derive(Deserialize)]
struct DetectResponse {
    detections: Vec<Detection>,
}

impl RemoteDetector {
    /// Create a new remote detector for the given model.
    pub fn new(config: DetectorConfig, model: impl Into<String>) -> Self {
        Self {
            config,
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Create from environment variables for the given model.
    pub fn from_env(model: impl Into<String>) -> Self {
        Self::new(DetectorConfig::from_env(), model)
    }
}

#[async_trait]
impl FrameDetector for RemoteDetector {
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>> {
        if !frame.is_well_formed() {
            return Err(Error::InvalidInput(format!(
                "Frame {} pixel buffer does not match {}x{}",
                frame.index, frame.width, frame.height
            )));
        }

        let request = DetectRequest {
            model: self.model.clone(),
            width: frame.width,
            height: frame.height,
            image: base64::engine::general_purpose::STANDARD.encode(&frame.data),
            confidence_threshold: self.config.confidence_threshold,
        };

        let url = format!("{}/v1/detect", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .send()
            .await
            .map_err(|e| Error::Detection(format!("Detection request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Detection(format!(
                "Detector returned {}: {}",
                status, body
            )));
        }

        let result: DetectResponse = response
            .json()
            .await
            .map_err(|e| Error::Detection(format!("Failed to parse detector response: {}", e)))?;

        debug!(
            subsystem = "detect",
            component = "remote_detector",
            op = "detect_frame",
            model = %self.model,
            frame_number = frame.index,
            label_count = result.detections.len(),
            "Frame detection complete"
        );

        Ok(result.detections)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/v1/health", self.config.base_url);
        match self
            .client
            .get(&url)
            .timeout(std::time::Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }
}
