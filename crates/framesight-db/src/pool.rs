//! Connection pool setup.
//!
//! One pool per process, sized from the environment at startup.
//! Repositories hold clones of the pool handle; sqlx pools are cheap to
//! clone.

use std::time::Duration;

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use framesight_core::{Error, Result};

/// Pool sizing knobs.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Upper bound on open connections.
    pub max_connections: u32,
    /// How long an acquire waits before giving up.
    pub connect_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            connect_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolConfig {
    /// Read overrides from `DATABASE_MAX_CONNECTIONS` and
    /// `DATABASE_CONNECT_TIMEOUT_SECS`. Unset, unparsable, or zero
    /// values fall back to the defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let max_connections = std::env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_connections);
        let connect_timeout = std::env::var("DATABASE_CONNECT_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(Duration::from_secs)
            .unwrap_or(defaults.connect_timeout);
        Self {
            max_connections,
            connect_timeout,
        }
    }

    pub fn with_max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }
}

/// Connect a pool sized from the environment.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    create_pool_with_config(database_url, PoolConfig::from_env()).await
}

/// Connect a pool with explicit sizing.
pub async fn create_pool_with_config(database_url: &str, config: PoolConfig) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(config.connect_timeout)
        .connect(database_url)
        .await
        .map_err(Error::Database)?;

    info!(
        subsystem = "db",
        component = "pool",
        max_connections = config.max_connections,
        pool_size = pool.size(),
        "Database connection pool established"
    );
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.connect_timeout, Duration::from_secs(30));
    }

    // Single env test so parallel test threads never race on the vars.
    #[test]
    fn test_from_env_overrides_and_bounds() {
        std::env::set_var("DATABASE_MAX_CONNECTIONS", "3");
        std::env::set_var("DATABASE_CONNECT_TIMEOUT_SECS", "5");
        let config = PoolConfig::from_env();
        assert_eq!(config.max_connections, 3);
        assert_eq!(config.connect_timeout, Duration::from_secs(5));

        // Zero connections is never usable; keep the default.
        std::env::set_var("DATABASE_MAX_CONNECTIONS", "0");
        let config = PoolConfig::from_env();
        assert_eq!(config.max_connections, 10);

        std::env::remove_var("DATABASE_MAX_CONNECTIONS");
        std::env::remove_var("DATABASE_CONNECT_TIMEOUT_SECS");
    }

    #[test]
    fn test_builder_override() {
        let config = PoolConfig::default().with_max_connections(5);
        assert_eq!(config.max_connections, 5);
    }
}
