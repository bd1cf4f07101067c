//! The detector trait and the frame/detection types it operates on.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use framesight_core::Result;

/// A decoded video frame in RGB24 layout.
#[derive(Debug, Clone)]
pub struct Frame {
    /// 1-based frame index within the video.
    pub index: i64,
    pub width: u32,
    pub height: u32,
    /// Raw pixel data, `width * height * 3` bytes, row-major RGB.
    pub data: Vec<u8>,
}

impl Frame {
    /// Expected byte length for the frame's dimensions.
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }

    /// Whether the pixel buffer matches the declared dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == Self::expected_len(self.width, self.height)
    }
}

/// One detected object in a frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub confidence: f32,
}

/// Backend for running an object-detection model against single frames.
///
/// Implementations wrap whatever actually runs the model (an inference
/// server, an in-process runtime, a mock). The model itself is opaque:
/// frame in, labels out.
#[async_trait]
pub trait FrameDetector: Send + Sync {
    /// Run detection on one frame.
    async fn detect(&self, frame: &Frame) -> Result<Vec<Detection>>;

    /// The model name this detector runs (for logging and results).
    fn model_name(&self) -> &str;

    /// Check if the backend is reachable.
    async fn health_check(&self) -> Result<bool>;
}
