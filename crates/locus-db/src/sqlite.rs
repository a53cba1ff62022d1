//! `SQLite` connection handling.
//!
//! The location store lives in a single `SQLite` file next to the host's
//! data. Uses [`sqlx`] with runtime query construction (not compile-time
//! checked) so no live database is needed at build time. All queries are
//! parameterized.

use std::path::{Path, PathBuf};
use std::time::Duration;

use sqlx::SqlitePool as SqlxPool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::error::DbError;

/// Path value that selects a private in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Default database file name.
pub const DEFAULT_DATABASE_FILE: &str = "storage.db";

/// Default maximum number of connections in the pool.
const DEFAULT_MAX_CONNECTIONS: u32 = 4;

/// Default connection timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default idle timeout in seconds.
const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 300;

/// Configuration for the `SQLite` connection pool.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    /// Database file path, or [`IN_MEMORY_PATH`].
    pub path: PathBuf,
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Idle connection timeout.
    pub idle_timeout: Duration,
}

impl SqliteConfig {
    /// Create a new configuration for a database file.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            idle_timeout: Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS),
        }
    }

    /// Create a configuration for a private in-memory database.
    pub fn in_memory() -> Self {
        Self::new(IN_MEMORY_PATH)
    }

    /// Whether this configuration selects an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY_PATH
    }

    /// Set the maximum number of connections.
    #[must_use]
    pub const fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub const fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DATABASE_FILE)
    }
}

/// Connection pool handle to the `SQLite` database.
#[derive(Clone)]
pub struct SqlitePool {
    pool: SqlxPool,
}

impl SqlitePool {
    /// Open the database, creating the file (and its parent directory) if it
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::Io`] if the parent directory cannot be created.
    /// Returns [`DbError::Sqlite`] if the connection fails.
    pub async fn connect(config: &SqliteConfig) -> Result<Self, DbError> {
        let (connect_options, max_connections) = if config.is_in_memory() {
            // Every connection to `:memory:` is a separate database.
            let options: SqliteConnectOptions = "sqlite::memory:".parse()?;
            (options, 1)
        } else {
            if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await?;
            }
            let options = SqliteConnectOptions::new()
                .filename(&config.path)
                .create_if_missing(true);
            (options, config.max_connections.max(1))
        };

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(config.connect_timeout);
        // An idle in-memory connection must never be reaped: the data goes with it.
        pool_options = if config.is_in_memory() {
            pool_options
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
        } else {
            pool_options.idle_timeout(config.idle_timeout)
        };

        let pool = pool_options.connect_with(connect_options).await?;

        tracing::info!(
            path = %config.path.display(),
            max_connections,
            "Connected to SQLite"
        );

        Ok(Self { pool })
    }

    /// Return a reference to the underlying [`sqlx::SqlitePool`].
    pub const fn pool(&self) -> &SqlxPool {
        &self.pool
    }

    /// Close all connections in the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("SQLite pool closed");
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_storage_file() {
        let config = SqliteConfig::default();
        assert_eq!(config.path, PathBuf::from("storage.db"));
        assert!(!config.is_in_memory());
    }

    #[test]
    fn builder_overrides_apply() {
        let config = SqliteConfig::in_memory()
            .with_max_connections(9)
            .with_connect_timeout(Duration::from_millis(250));
        assert!(config.is_in_memory());
        assert_eq!(config.max_connections, 9);
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn creates_missing_file_and_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("storage.db");
        let pool = SqlitePool::connect(&SqliteConfig::new(&path))
            .await
            .expect("connect");
        assert!(path.exists());
        pool.close().await;
    }
}
