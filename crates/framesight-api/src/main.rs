//! framesight-api - HTTP API server for framesight

use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use governor::{Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use framesight_core::defaults::{
    CORS_MAX_AGE_SECS, MAX_BODY_SIZE_BYTES, PAGE_LIMIT_FRAMES, PAGE_LIMIT_LOGS, PAGE_LIMIT_MAX,
    RATE_LIMIT_PERIOD_SECS, RATE_LIMIT_REQUESTS, SERVER_PORT,
};
use framesight_core::{
    DetectionJob, DetectionRepository, FrameDetection, JobLogRepository, JobStatus,
    JobStatusRepository, SubmitDetectionRequest,
};
use framesight_db::Database;
use framesight_detect::{FrameDetector, RemoteDetector};
use framesight_jobs::{
    DetectionHandler, FfmpegDecoder, JobWorker, RemoteDetectorProvider, WorkerConfig,
};

// =============================================================================
// REQUEST ID (UUIDv7)
// =============================================================================

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically — useful for
/// log correlation and debugging production incidents.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Global rate limiter type (direct quota, no keyed bucketing).
type GlobalRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    db: Database,
    /// Global rate limiter (None if rate limiting is disabled).
    rate_limiter: Option<Arc<GlobalRateLimiter>>,
}

// =============================================================================
// STANDARD RESPONSE TYPES
// =============================================================================

/// Standardized pagination metadata for list responses.
#[derive(Serialize, Deserialize, Debug)]
pub struct PaginationMeta {
    /// Total number of items matching the query (across all pages)
    pub total: usize,
    /// Maximum number of items per page (request parameter)
    pub limit: usize,
    /// Number of items skipped (request parameter)
    pub offset: usize,
    /// True if more items are available after this page
    pub has_more: bool,
}

/// Standardized list response wrapper with pagination metadata.
#[derive(Serialize, Deserialize, Debug)]
pub struct ListResponse<T> {
    /// The list of items for the current page
    pub data: Vec<T>,
    /// Pagination metadata
    pub pagination: PaginationMeta,
}

impl<T: Serialize> ListResponse<T> {
    /// Create a new paginated list response.
    ///
    /// Automatically calculates `has_more` from offset, data length, and total.
    pub fn new(data: Vec<T>, total: usize, limit: usize, offset: usize) -> Self {
        let has_more = offset + data.len() < total;
        Self {
            data,
            pagination: PaginationMeta {
                total,
                limit,
                offset,
                has_more,
            },
        }
    }
}

// =============================================================================
// CORS CONFIGURATION HELPER
// =============================================================================

/// Parse allowed origins from comma-separated environment variable.
///
/// # Environment Variable
/// `ALLOWED_ORIGINS` - Comma-separated list of allowed origins
///
/// Defaults to `http://localhost:3000` when unset or empty.
fn parse_allowed_origins() -> Vec<HeaderValue> {
    let origins_str =
        std::env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "http://localhost:3000".to_string());

    if origins_str.trim().is_empty() {
        return vec![HeaderValue::from_static("http://localhost:3000")];
    }

    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing with configurable output
    //
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   LOG_ANSI    - "true"/"false" override ANSI colors (auto-detected by default)
    //   RUST_LOG    - standard env filter (default: "framesight_api=debug,tower_http=debug")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();
    let log_ansi = std::env::var("LOG_ANSI")
        .ok()
        .map(|v| v == "true" || v == "1");

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "framesight_api=debug,tower_http=debug".into());

    let registry = tracing_subscriber::registry().with(env_filter);

    // Optionally create a file appender with daily rotation
    let _file_guard = if let Some(ref path) = log_file {
        let file_dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let file_name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("framesight-api.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer().with_writer(non_blocking);
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            } else {
                layer = layer.with_ansi(false); // no ANSI in files
            }
            registry.with(layer).init();
        }
        Some(guard)
    } else {
        // Console-only output
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        } else {
            let mut layer = tracing_subscriber::fmt::layer();
            if let Some(ansi) = log_ansi {
                layer = layer.with_ansi(ansi);
            }
            registry.with(layer).init();
        }
        None
    };

    info!(
        log_format = %log_format,
        log_file = log_file.as_deref().unwrap_or("(stdout)"),
        "Logging initialized"
    );

    // Get configuration from environment
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "postgres://localhost/framesight".to_string());
    let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(SERVER_PORT);

    // Rate limiting configuration
    // RATE_LIMIT_REQUESTS: requests per period (default: 100)
    // RATE_LIMIT_PERIOD_SECS: period in seconds (default: 60)
    let rate_limit_requests: u64 = std::env::var("RATE_LIMIT_REQUESTS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(RATE_LIMIT_REQUESTS);
    let rate_limit_period_secs: u64 = std::env::var("RATE_LIMIT_PERIOD_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(RATE_LIMIT_PERIOD_SECS);
    let rate_limit_enabled: bool = std::env::var("RATE_LIMIT_ENABLED")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(true);

    info!(
        "Rate limiting: {} ({} requests per {} seconds)",
        if rate_limit_enabled {
            "enabled"
        } else {
            "disabled"
        },
        rate_limit_requests,
        rate_limit_period_secs
    );

    // Connect to database
    info!("Connecting to database...");
    let db = Database::connect(&database_url).await?;
    info!("Database connected");

    // Run pending database migrations on startup
    info!("Running database migrations...");
    db.migrate().await?;
    info!("Database migrations complete");

    // Verify the detection backend is reachable
    {
        let detector = RemoteDetector::from_env("default");
        match detector.health_check().await {
            Ok(true) => info!("Detection backend is reachable"),
            _ => tracing::warn!("Detection backend is not reachable, jobs will fail until it is"),
        }
    }

    // Create and start the detection worker
    let worker_config = WorkerConfig::from_env();
    let _worker_handle = if worker_config.enabled {
        info!("Starting detection worker...");
        let handler = DetectionHandler::new(
            Arc::new(FfmpegDecoder::new()),
            Arc::new(RemoteDetectorProvider::from_env()),
            Arc::new(db.status.clone()),
            Arc::new(db.detections.clone()),
            Arc::new(db.logs.clone()),
        );
        let worker = JobWorker::new(db.clone(), worker_config, Arc::new(handler));
        let handle = worker.start();
        info!("Detection worker started");
        Some(handle)
    } else {
        info!("Detection worker disabled");
        None
    };

    // Create rate limiter if enabled
    let rate_limiter = if rate_limit_enabled {
        let quota = Quota::with_period(std::time::Duration::from_secs(rate_limit_period_secs))
            .expect("Rate limit period must be non-zero")
            .allow_burst(
                NonZeroU32::new(rate_limit_requests as u32).expect("Rate limit must be non-zero"),
            );
        Some(Arc::new(RateLimiter::direct(quota)))
    } else {
        None
    };

    // Create app state
    let state = AppState { db, rate_limiter };

    // Build router
    let app = Router::new()
        // Health check
        .route("/health", get(health_check))
        // Detection jobs
        .route("/api/v1/detections", post(submit_detection))
        .route("/api/v1/detections/:token", get(get_detection_status))
        .route("/api/v1/detections/:token/frames", get(list_frames))
        .route("/api/v1/detections/:token/logs", get(list_logs))
        // Queue introspection
        .route("/api/v1/jobs/pending", get(pending_jobs_count))
        // Rate limiting status endpoint
        .route("/api/v1/rate-limit/status", get(rate_limit_status))
        // Middleware
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer({
            let allowed_origins = parse_allowed_origins();

            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .allow_credentials(true)
                .max_age(std::time::Duration::from_secs(CORS_MAX_AGE_SECS))
        })
        // Submissions are small JSON bodies
        .layer(RequestBodyLimitLayer::new(MAX_BODY_SIZE_BYTES))
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// =============================================================================
// RATE LIMITING MIDDLEWARE
// =============================================================================

async fn rate_limit_middleware(
    State(state): State<AppState>,
    request: axum::extract::Request,
    next: axum::middleware::Next,
) -> Result<impl IntoResponse, (StatusCode, Json<serde_json::Value>)> {
    // If rate limiting is disabled, pass through
    if let Some(limiter) = &state.rate_limiter {
        if limiter.check().is_err() {
            tracing::warn!("Rate limit exceeded");
            return Err((
                StatusCode::TOO_MANY_REQUESTS,
                Json(serde_json::json!({
                    "error": "rate_limit_exceeded",
                    "error_description": "Too many requests. Please wait before retrying."
                })),
            ));
        }
    }
    Ok(next.run(request).await)
}

/// Get rate limiting status.
async fn rate_limit_status(State(state): State<AppState>) -> impl IntoResponse {
    if state.rate_limiter.is_some() {
        Json(serde_json::json!({
            "enabled": true,
            "message": "Rate limiting is active"
        }))
    } else {
        Json(serde_json::json!({
            "enabled": false,
            "message": "Rate limiting is disabled"
        }))
    }
}

// =============================================================================
// HEALTH CHECK
// =============================================================================

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// DETECTION HANDLERS
// =============================================================================

#[derive(Debug, Serialize)]
struct SubmitDetectionResponse {
    token: String,
}

/// Submit a new detection job.
///
/// Returns `202 Accepted` with the polling token; the worker picks the
/// job up asynchronously.
async fn submit_detection(
    State(state): State<AppState>,
    Json(body): Json<SubmitDetectionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    body.validate()?;

    let job = state.db.status.create(body).await?;

    info!(
        job_token = %job.token,
        source_id = %job.source_id,
        detection_type = %job.detection_type,
        "Detection job accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(SubmitDetectionResponse { token: job.token }),
    ))
}

/// Reject tokens that cannot exist before querying the store.
fn ensure_token_shape(token: &str) -> Result<(), ApiError> {
    if !framesight_core::token::is_valid_token(token) {
        return Err(ApiError::NotFound(format!(
            "No job found for token {}",
            token
        )));
    }
    Ok(())
}

/// Job status as exposed to polling clients.
///
/// Internal fields (row id, the video URL, claim timestamps) stay
/// server-side.
#[derive(Debug, Serialize)]
struct DetectionStatusResponse {
    token: String,
    status: JobStatus,
    source_id: String,
    detection_type: String,
    frames_processed: i64,
    error_message: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<DetectionJob> for DetectionStatusResponse {
    fn from(job: DetectionJob) -> Self {
        Self {
            token: job.token,
            status: job.status,
            source_id: job.source_id,
            detection_type: job.detection_type,
            frames_processed: job.frames_processed,
            error_message: job.error_message,
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Poll a detection job's status by token.
///
/// Polling an in-progress job refreshes its `updated_at` timestamp, so a
/// watched job does not look stale.
async fn get_detection_status(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_token_shape(&token)?;
    state.db.status.touch(&token).await?;
    let job = state.db.status.find_by_token(&token).await?;
    Ok(Json(DetectionStatusResponse::from(job)))
}

#[derive(Debug, Deserialize)]
struct PageQuery {
    limit: Option<i64>,
    offset: Option<i64>,
}

/// Clamp a requested page size to `1..=max`, defaulting when absent.
fn clamp_limit(requested: Option<i64>, default: i64, max: i64) -> i64 {
    requested.unwrap_or(default).clamp(1, max)
}

/// Clamp a requested offset to be non-negative.
fn clamp_offset(requested: Option<i64>) -> i64 {
    requested.unwrap_or(0).max(0)
}

/// List per-frame detection results for a job, paginated.
async fn list_frames(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(params): Query<PageQuery>,
) -> Result<Json<ListResponse<FrameDetection>>, ApiError> {
    // 404 for unknown tokens before touching the detections table.
    ensure_token_shape(&token)?;
    state.db.status.find_by_token(&token).await?;

    let limit = clamp_limit(params.limit, PAGE_LIMIT_FRAMES, PAGE_LIMIT_MAX);
    let offset = clamp_offset(params.offset);

    let total = state.db.detections.count_for_token(&token).await?;
    let frames = state
        .db
        .detections
        .list_for_token(&token, limit, offset)
        .await?;

    Ok(Json(ListResponse::new(
        frames,
        total as usize,
        limit as usize,
        offset as usize,
    )))
}

/// List a job's log entries.
async fn list_logs(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(params): Query<PageQuery>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_token_shape(&token)?;
    state.db.status.find_by_token(&token).await?;

    let limit = clamp_limit(params.limit, PAGE_LIMIT_LOGS, PAGE_LIMIT_MAX);
    let entries = state.db.logs.list_for_token(&token, limit).await?;
    Ok(Json(entries))
}

/// Get the count of queued, unclaimed jobs.
async fn pending_jobs_count(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let pending = state.db.status.pending_count().await?;
    Ok(Json(serde_json::json!({ "pending": pending })))
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    Database(framesight_core::Error),
    NotFound(String),
    BadRequest(String),
}

impl From<framesight_core::Error> for ApiError {
    fn from(err: framesight_core::Error) -> Self {
        match &err {
            framesight_core::Error::JobNotFound(token) => {
                ApiError::NotFound(format!("No job found for token {}", token))
            }
            framesight_core::Error::NotFound(msg) => ApiError::NotFound(msg.clone()),
            framesight_core::Error::InvalidInput(msg) => ApiError::BadRequest(msg.clone()),
            _ => ApiError::Database(err),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Database(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_response_has_more() {
        let resp = ListResponse::new(vec![1, 2, 3], 10, 3, 0);
        assert!(resp.pagination.has_more);
        assert_eq!(resp.pagination.total, 10);

        let last_page = ListResponse::new(vec![1], 10, 3, 9);
        assert!(!last_page.pagination.has_more);

        let empty = ListResponse::new(Vec::<i32>::new(), 0, 3, 0);
        assert!(!empty.pagination.has_more);
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None, 100, 1000), 100);
        assert_eq!(clamp_limit(Some(50), 100, 1000), 50);
        assert_eq!(clamp_limit(Some(0), 100, 1000), 1);
        assert_eq!(clamp_limit(Some(-5), 100, 1000), 1);
        assert_eq!(clamp_limit(Some(99999), 100, 1000), 1000);
    }

    #[test]
    fn test_clamp_offset() {
        assert_eq!(clamp_offset(None), 0);
        assert_eq!(clamp_offset(Some(25)), 25);
        assert_eq!(clamp_offset(Some(-1)), 0);
    }

    #[test]
    fn test_api_error_status_codes() {
        let not_found = ApiError::NotFound("missing".into()).into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let bad_request = ApiError::BadRequest("empty field".into()).into_response();
        assert_eq!(bad_request.status(), StatusCode::BAD_REQUEST);

        let internal =
            ApiError::Database(framesight_core::Error::Internal("boom".into())).into_response();
        assert_eq!(internal.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_core_error_mapping() {
        let err: ApiError = framesight_core::Error::JobNotFound("abc123".into()).into();
        assert!(matches!(err, ApiError::NotFound(_)));

        let err: ApiError = framesight_core::Error::InvalidInput("bad".into()).into();
        assert!(matches!(err, ApiError::BadRequest(_)));

        let err: ApiError = framesight_core::Error::Detection("fail".into()).into();
        assert!(matches!(err, ApiError::Database(_)));
    }

    #[test]
    fn test_submit_response_shape() {
        let resp = SubmitDetectionResponse {
            token: "abc123".to_string(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json, serde_json::json!({"token": "abc123"}));
    }

    #[test]
    fn test_status_response_hides_internal_fields() {
        let now = chrono::Utc::now();
        let job = DetectionJob {
            id: Uuid::new_v4(),
            token: "abc123".to_string(),
            source_id: "cam-1".to_string(),
            video_url: "https://example.com/clip.mp4".to_string(),
            detection_type: "helmet".to_string(),
            status: JobStatus::Completed,
            error_message: None,
            frames_processed: 42,
            created_at: now,
            updated_at: now,
            started_at: Some(now),
            completed_at: Some(now),
        };

        let json = serde_json::to_value(DetectionStatusResponse::from(job)).unwrap();
        let obj = json.as_object().unwrap();
        assert_eq!(obj["token"], "abc123");
        assert_eq!(obj["status"], "completed");
        assert_eq!(obj["frames_processed"], 42);
        assert!(!obj.contains_key("id"));
        assert!(!obj.contains_key("video_url"));
        assert!(!obj.contains_key("started_at"));
        assert!(!obj.contains_key("completed_at"));
    }
}
