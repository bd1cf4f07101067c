//! Detection job handler.
//!
//! Runs the per-video frame loop: decode a frame, run the detector,
//! persist the labels, repeat until the stream ends. Any decode or
//! detection error fails the job; a clean end of stream completes it.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use framesight_core::defaults::PROGRESS_STRIDE;
use framesight_core::{
    DetectionRepository, FrameDetection, JobLogRepository, JobStatusRepository,
};
use framesight_detect::{DetectorConfig, FrameDetector, RemoteDetector};

use crate::handler::{JobContext, JobHandler, JobResult};
use crate::video::VideoDecoder;

/// Supplies a detector for a job's detection type.
///
/// Each detection type maps to a model; the provider decides how that
/// model is reached.
pub trait DetectorProvider: Send + Sync {
    fn detector_for(&self, detection_type: &str) -> Arc<dyn FrameDetector>;
}

/// Provider backed by the HTTP inference server.
pub struct RemoteDetectorProvider {
    config: DetectorConfig,
}

impl RemoteDetectorProvider {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(DetectorConfig::from_env())
    }
}

impl DetectorProvider for RemoteDetectorProvider {
    fn detector_for(&self, detection_type: &str) -> Arc<dyn FrameDetector> {
        Arc::new(RemoteDetector::new(self.config.clone(), detection_type))
    }
}

/// Provider returning one fixed detector regardless of type, for tests.
pub struct FixedDetectorProvider(pub Arc<dyn FrameDetector>);

impl DetectorProvider for FixedDetectorProvider {
    fn detector_for(&self, _detection_type: &str) -> Arc<dyn FrameDetector> {
        self.0.clone()
    }
}

/// Handler that processes detection jobs.
pub struct DetectionHandler {
    decoder: Arc<dyn VideoDecoder>,
    detectors: Arc<dyn DetectorProvider>,
    status: Arc<dyn JobStatusRepository>,
    detections: Arc<dyn DetectionRepository>,
    logs: Arc<dyn JobLogRepository>,
}

impl DetectionHandler {
    pub fn new(
        decoder: Arc<dyn VideoDecoder>,
        detectors: Arc<dyn DetectorProvider>,
        status: Arc<dyn JobStatusRepository>,
        detections: Arc<dyn DetectionRepository>,
        logs: Arc<dyn JobLogRepository>,
    ) -> Self {
        Self {
            decoder,
            detectors,
            status,
            detections,
            logs,
        }
    }

    /// Append to the job log, downgrading storage errors to a warning.
    ///
    /// The log is an audit trail; losing an entry must not fail the job.
    async fn log(&self, token: &str, message: &str) {
        if let Err(e) = self.logs.append(token, message).await {
            warn!(
                subsystem = "jobs",
                component = "detection_handler",
                job_token = token,
                error_msg = %e,
                "Failed to append job log entry"
            );
        }
    }

    async fn run(&self, ctx: &JobContext) -> std::result::Result<i64, String> {
        let job = &ctx.job;
        let token = &job.token;

        let mut source = match self.decoder.open(&job.video_url).await {
            Ok(source) => source,
            Err(e) => {
                let message = format!("Cannot open video {}: {}", job.video_url, e);
                self.log(token, &message).await;
                return Err(message);
            }
        };

        let detector = self.detectors.detector_for(&job.detection_type);
        let mut frames_processed: i64 = 0;

        loop {
            let frame_started_at = Utc::now();

            let frame = match source.next_frame().await {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    let message = format!("Video decode failed: {}", e);
                    self.log(token, &message).await;
                    return Err(message);
                }
            };

            let detections = match detector.detect(&frame).await {
                Ok(detections) => detections,
                Err(e) => {
                    let message = format!("Detection failed on frame {}: {}", frame.index, e);
                    self.log(token, &message).await;
                    return Err(message);
                }
            };

            let record = FrameDetection {
                id: Uuid::new_v4(),
                token: token.clone(),
                source_id: job.source_id.clone(),
                frame_number: frame.index,
                started_at: frame_started_at,
                ended_at: Utc::now(),
                labels: detections.into_iter().map(|d| d.label).collect(),
            };

            if let Err(e) = self.detections.insert(record).await {
                let message = format!("Failed to store frame {} results: {}", frame.index, e);
                self.log(token, &message).await;
                return Err(message);
            }

            frames_processed += 1;

            if frames_processed % PROGRESS_STRIDE == 0 {
                if let Err(e) = self.status.set_progress(token, frames_processed).await {
                    warn!(
                        subsystem = "jobs",
                        component = "detection_handler",
                        job_token = %token,
                        error_msg = %e,
                        "Failed to update job progress"
                    );
                }
                let message = format!("Processed {} frames", frames_processed);
                self.log(token, &message).await;
                ctx.report_progress(frames_processed, Some(&message));
            }
        }

        Ok(frames_processed)
    }
}

#[async_trait]
impl JobHandler for DetectionHandler {
    async fn execute(&self, ctx: JobContext) -> JobResult {
        let start = Instant::now();
        let token = ctx.job.token.clone();

        info!(
            subsystem = "jobs",
            component = "detection_handler",
            op = "execute",
            job_token = %token,
            source_id = %ctx.job.source_id,
            detection_type = %ctx.job.detection_type,
            "Detection job started"
        );

        self.log(
            &token,
            &format!(
                "Detection started: source {} type {}",
                ctx.job.source_id, ctx.job.detection_type
            ),
        )
        .await;

        match self.run(&ctx).await {
            Ok(frames_processed) => {
                self.log(
                    &token,
                    &format!("Detection finished: {} frames processed", frames_processed),
                )
                .await;
                info!(
                    subsystem = "jobs",
                    component = "detection_handler",
                    job_token = %token,
                    frame_count = frames_processed,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Detection job finished"
                );
                JobResult::Success(Some(json!({ "frames_processed": frames_processed })))
            }
            Err(message) => {
                error!(
                    subsystem = "jobs",
                    component = "detection_handler",
                    job_token = %token,
                    error_msg = %message,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Detection job failed"
                );
                JobResult::Failed(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use framesight_core::{
        DetectionJob, Error, JobLogEntry, JobStatus, Result, SubmitDetectionRequest,
    };
    use framesight_detect::MockDetector;

    use crate::video::{VecDecoder, VecFrameSource};

    #[derive(Default)]
    struct FakeStatusRepo {
        progress_calls: Mutex<Vec<i64>>,
    }

    #[async_trait]
    impl JobStatusRepository for FakeStatusRepo {
        async fn create(&self, _request: SubmitDetectionRequest) -> Result<DetectionJob> {
            unimplemented!("not used by the handler")
        }
        async fn find_by_token(&self, token: &str) -> Result<DetectionJob> {
            Err(Error::JobNotFound(token.to_string()))
        }
        async fn claim_next(&self) -> Result<Option<DetectionJob>> {
            Ok(None)
        }
        async fn touch(&self, _token: &str) -> Result<()> {
            Ok(())
        }
        async fn set_progress(&self, _token: &str, frames_processed: i64) -> Result<()> {
            self.progress_calls.lock().unwrap().push(frames_processed);
            Ok(())
        }
        async fn complete(&self, _token: &str, _frames_processed: i64) -> Result<()> {
            Ok(())
        }
        async fn fail(&self, _token: &str, _error: &str) -> Result<()> {
            Ok(())
        }
        async fn pending_count(&self) -> Result<i64> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct FakeDetectionRepo {
        rows: Mutex<Vec<FrameDetection>>,
        fail_inserts: bool,
    }

    #[async_trait]
    impl DetectionRepository for FakeDetectionRepo {
        async fn insert(&self, detection: FrameDetection) -> Result<()> {
            if self.fail_inserts {
                return Err(Error::Internal("insert rejected".into()));
            }
            self.rows.lock().unwrap().push(detection);
            Ok(())
        }
        async fn list_for_token(
            &self,
            token: &str,
            _limit: i64,
            _offset: i64,
        ) -> Result<Vec<FrameDetection>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|d| d.token == token)
                .cloned()
                .collect())
        }
        async fn count_for_token(&self, token: &str) -> Result<i64> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|d| d.token == token)
                .count() as i64)
        }
    }

    #[derive(Default)]
    struct FakeLogRepo {
        messages: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl JobLogRepository for FakeLogRepo {
        async fn append(&self, _token: &str, message: &str) -> Result<()> {
            self.messages.lock().unwrap().push(message.to_string());
            Ok(())
        }
        async fn list_for_token(&self, _token: &str, _limit: i64) -> Result<Vec<JobLogEntry>> {
            Ok(Vec::new())
        }
    }

    fn test_job() -> DetectionJob {
        DetectionJob {
            id: Uuid::new_v4(),
            token: "tok001".to_string(),
            source_id: "cam-7".to_string(),
            video_url: "https://example.com/clip.mp4".to_string(),
            detection_type: "helmet".to_string(),
            status: JobStatus::InProgress,
            error_message: None,
            frames_processed: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            started_at: Some(Utc::now()),
            completed_at: None,
        }
    }

    struct Fixture {
        handler: DetectionHandler,
        status: Arc<FakeStatusRepo>,
        detections: Arc<FakeDetectionRepo>,
        logs: Arc<FakeLogRepo>,
    }

    fn fixture(decoder: VecDecoder, detector: MockDetector) -> Fixture {
        let status = Arc::new(FakeStatusRepo::default());
        let detections = Arc::new(FakeDetectionRepo::default());
        let logs = Arc::new(FakeLogRepo::default());

        let handler = DetectionHandler::new(
            Arc::new(decoder),
            Arc::new(FixedDetectorProvider(Arc::new(detector))),
            status.clone(),
            detections.clone(),
            logs.clone(),
        );

        Fixture {
            handler,
            status,
            detections,
            logs,
        }
    }

    #[tokio::test]
    async fn test_successful_run_stores_all_frames() {
        let decoder = VecDecoder::new(vec![VecFrameSource::with_frame_count(5, 2, 2)]);
        let detector = MockDetector::new("helmet").with_default_labels(vec!["person"]);
        let f = fixture(decoder, detector);

        let result = f.handler.execute(JobContext::new(test_job())).await;
        assert_eq!(result.frames_processed(), 5);
        assert!(matches!(result, JobResult::Success(Some(_))));

        let rows = f.detections.rows.lock().unwrap();
        assert_eq!(rows.len(), 5);
        assert_eq!(rows[0].frame_number, 1);
        assert_eq!(rows[4].frame_number, 5);
        assert_eq!(rows[0].labels, vec!["person".to_string()]);
        assert_eq!(rows[0].token, "tok001");
        assert_eq!(rows[0].source_id, "cam-7");
        assert!(rows[0].ended_at >= rows[0].started_at);
    }

    #[tokio::test]
    async fn test_empty_video_completes_with_zero_frames() {
        let decoder = VecDecoder::new(vec![VecFrameSource::with_frame_count(0, 2, 2)]);
        let f = fixture(decoder, MockDetector::new("helmet"));

        let result = f.handler.execute(JobContext::new(test_job())).await;
        assert!(matches!(result, JobResult::Success(_)));
        assert_eq!(result.frames_processed(), 0);
        assert!(f.detections.rows.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_open_failure_fails_job() {
        let decoder = VecDecoder::failing("Cannot open video");
        let f = fixture(decoder, MockDetector::new("helmet"));

        let result = f.handler.execute(JobContext::new(test_job())).await;
        match result {
            JobResult::Failed(message) => assert!(message.contains("Cannot open video")),
            other => panic!("Expected failure, got {:?}", other),
        }

        let messages = f.logs.messages.lock().unwrap();
        assert!(messages.iter().any(|m| m.contains("Cannot open video")));
    }

    #[tokio::test]
    async fn test_decode_error_mid_stream_fails_job() {
        let decoder =
            VecDecoder::new(vec![VecFrameSource::with_frame_count(5, 2, 2).failing_at(3)]);
        let detector = MockDetector::new("helmet").with_default_labels(vec!["person"]);
        let f = fixture(decoder, detector);

        let result = f.handler.execute(JobContext::new(test_job())).await;
        assert!(matches!(result, JobResult::Failed(_)));
        // Frames before the failure were persisted.
        assert_eq!(f.detections.rows.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_detector_error_fails_job() {
        let decoder = VecDecoder::new(vec![VecFrameSource::with_frame_count(5, 2, 2)]);
        let detector = MockDetector::new("helmet")
            .with_default_labels(vec!["person"])
            .with_failure_on_frame(2);
        let f = fixture(decoder, detector);

        let result = f.handler.execute(JobContext::new(test_job())).await;
        match result {
            JobResult::Failed(message) => assert!(message.contains("frame 2")),
            other => panic!("Expected failure, got {:?}", other),
        }
        assert_eq!(f.detections.rows.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_failure_fails_job() {
        let decoder = VecDecoder::new(vec![VecFrameSource::with_frame_count(2, 2, 2)]);
        let detector = MockDetector::new("helmet").with_default_labels(vec!["person"]);

        let status = Arc::new(FakeStatusRepo::default());
        let detections = Arc::new(FakeDetectionRepo {
            rows: Mutex::new(Vec::new()),
            fail_inserts: true,
        });
        let logs = Arc::new(FakeLogRepo::default());
        let handler = DetectionHandler::new(
            Arc::new(decoder),
            Arc::new(FixedDetectorProvider(Arc::new(detector))),
            status,
            detections,
            logs,
        );

        let result = handler.execute(JobContext::new(test_job())).await;
        assert!(matches!(result, JobResult::Failed(_)));
    }

    #[tokio::test]
    async fn test_progress_reported_at_stride() {
        let total = PROGRESS_STRIDE + 1;
        let decoder = VecDecoder::new(vec![VecFrameSource::with_frame_count(total, 2, 2)]);
        let detector = MockDetector::new("helmet").with_default_labels(vec!["person"]);
        let f = fixture(decoder, detector);

        let progress_events = Arc::new(Mutex::new(Vec::new()));
        let events_clone = progress_events.clone();
        let ctx = JobContext::new(test_job()).with_progress_callback(move |frames, _| {
            events_clone.lock().unwrap().push(frames);
        });

        let result = f.handler.execute(ctx).await;
        assert_eq!(result.frames_processed(), total);

        assert_eq!(*f.status.progress_calls.lock().unwrap(), vec![PROGRESS_STRIDE]);
        assert_eq!(*progress_events.lock().unwrap(), vec![PROGRESS_STRIDE]);
    }

    #[tokio::test]
    async fn test_per_frame_labels_recorded() {
        let decoder = VecDecoder::new(vec![VecFrameSource::with_frame_count(3, 2, 2)]);
        let detector = MockDetector::new("helmet")
            .with_default_labels(vec![])
            .with_labels_for_frame(2, vec!["person", "helmet"]);
        let f = fixture(decoder, detector);

        f.handler.execute(JobContext::new(test_job())).await;

        let rows = f.detections.rows.lock().unwrap();
        assert!(rows[0].labels.is_empty());
        assert_eq!(rows[1].labels.len(), 2);
        assert!(rows[2].labels.is_empty());
    }
}
