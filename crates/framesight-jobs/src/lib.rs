//! # framesight-jobs
//!
//! Background detection worker for framesight.
//!
//! This crate provides:
//! - A polling worker that claims queued detection jobs
//! - The per-video frame loop (decode, detect, persist)
//! - Video frame sources backed by ffmpeg
//! - Progress events via broadcast channels
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use framesight_db::Database;
//! use framesight_jobs::{
//!     DetectionHandler, FfmpegDecoder, JobWorker, RemoteDetectorProvider, WorkerConfig,
//! };
//!
//! let db = Database::connect("postgres://...").await?;
//! let handler = DetectionHandler::new(
//!     Arc::new(FfmpegDecoder::new()),
//!     Arc::new(RemoteDetectorProvider::from_env()),
//!     Arc::new(db.status.clone()),
//!     Arc::new(db.detections.clone()),
//!     Arc::new(db.logs.clone()),
//! );
//!
//! let worker = JobWorker::new(db, WorkerConfig::from_env(), Arc::new(handler));
//! let handle = worker.start();
//!
//! // ... later
//! handle.shutdown().await?;
//! ```

pub mod detection;
pub mod handler;
pub mod video;
pub mod worker;

// Re-export core types
pub use framesight_core::*;

pub use detection::{
    DetectionHandler, DetectorProvider, FixedDetectorProvider, RemoteDetectorProvider,
};
pub use handler::{JobContext, JobHandler, JobResult, NoOpHandler};
pub use video::{FfmpegDecoder, FrameSource, VecDecoder, VecFrameSource, VideoDecoder};
pub use worker::{JobWorker, WorkerConfig, WorkerEvent, WorkerHandle};
