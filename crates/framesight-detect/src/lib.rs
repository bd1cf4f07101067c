//! # framesight-detect
//!
//! Object detection backend abstraction for framesight.
//!
//! The detection model is an opaque external capability: given a decoded
//! frame, it returns a set of labels. This crate defines the
//! [`FrameDetector`] trait at that seam, plus:
//! - [`RemoteDetector`] — an HTTP inference backend. The job's
//!   `detection_type` selects the model on the inference server.
//! - [`MockDetector`] — a deterministic backend for tests, with a call
//!   log and failure injection.

pub mod detector;
pub mod mock;
pub mod remote;

pub use detector::{Detection, Frame, FrameDetector};
pub use mock::MockDetector;
pub use remote::{DetectorConfig, RemoteDetector};
