//! # framesight-db
//!
//! PostgreSQL database layer for framesight.
//!
//! This crate provides:
//! - Connection pool management
//! - Repository implementations for job status, per-frame detection
//!   results, and job logs
//!
//! ## Example
//!
//! ```rust,ignore
//! use framesight_db::Database;
//! use framesight_core::{JobStatusRepository, SubmitDetectionRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("postgres://localhost/framesight").await?;
//!
//!     let job = db.status.create(SubmitDetectionRequest {
//!         source_id: "cam-42".to_string(),
//!         video_url: "https://example.com/clip.mp4".to_string(),
//!         detection_type: "helmet".to_string(),
//!     }).await?;
//!
//!     println!("Created job: {}", job.token);
//!     Ok(())
//! }
//! ```

pub mod detections;
pub mod logs;
pub mod pool;
pub mod status;

// Re-export core types
pub use framesight_core::*;

// Re-export repository implementations
pub use detections::PgDetectionRepository;
pub use logs::PgJobLogRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use status::PgJobStatusRepository;

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::Pool<sqlx::Postgres>,
    /// Job status repository (the record clients poll).
    pub status: PgJobStatusRepository,
    /// Per-frame detection result repository.
    pub detections: PgDetectionRepository,
    /// Job log repository.
    pub logs: PgJobLogRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::Pool<sqlx::Postgres>) -> Self {
        Self {
            status: PgJobStatusRepository::new(pool.clone()),
            detections: PgDetectionRepository::new(pool.clone()),
            logs: PgJobLogRepository::new(pool.clone()),
            pool,
        }
    }

    /// Create a new Database instance by connecting to the given URL.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        Ok(Self::new(pool))
    }

    /// Create with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        Ok(Self::new(pool))
    }

    /// Run pending migrations.
    #[cfg(feature = "migrations")]
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Postgres> {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            status: PgJobStatusRepository::new(self.pool.clone()),
            detections: PgDetectionRepository::new(self.pool.clone()),
            logs: PgJobLogRepository::new(self.pool.clone()),
        }
    }
}
