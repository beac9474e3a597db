//! # Database Connection Pool Module
//!
//! SQLite connection pooling for the stream catalog.
//!
//! ## Features
//!
//! - **WAL Mode**: concurrent readers while one unit writes
//! - **Connection Pooling**: configurable size and acquire timeout
//! - **Embedded Migrations**: `migrations/` is compiled in and applied on connect
//! - **Health Checks**: a `SELECT 1` before the pool is handed out
//!
//! ## Testing
//!
//! Every `:memory:` connection is its own database, so the test pool is
//! pinned to a single connection that never expires:
//!
//! ```rust,ignore
//! let pool = create_test_pool().await?;
//! ```

use crate::{CatalogError, Result};
use core_runtime::config::DatabaseSettings;
use core_runtime::logging::redact_url_credentials;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Database configuration for the SQLite connection pool
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// sqlx URL, e.g. `sqlite:kptv.db` or `sqlite::memory:`
    pub database_url: String,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Maximum time to wait for a connection from the pool
    pub acquire_timeout: Duration,

    /// Maximum lifetime of a connection
    pub max_lifetime: Option<Duration>,

    /// Maximum idle time for a connection before being closed
    pub idle_timeout: Option<Duration>,

    /// Prepared statements cached per connection
    pub statement_cache_capacity: usize,
}

impl DatabaseConfig {
    /// Create a configuration for a database URL
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// let config = DatabaseConfig::new("sqlite:kptv.db").max_connections(10);
    /// ```
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            min_connections: 1,
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: Some(Duration::from_secs(1800)),
            idle_timeout: Some(Duration::from_secs(600)),
            statement_cache_capacity: 100,
        }
    }

    /// Single-connection in-memory database
    pub fn in_memory() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            min_connections: 1,
            max_connections: 1,
            acquire_timeout: Duration::from_secs(30),
            max_lifetime: None,
            idle_timeout: None,
            statement_cache_capacity: 100,
        }
    }

    /// Pool settings from the `database` config section. An in-memory URL
    /// keeps the single-connection shape of [`DatabaseConfig::in_memory`].
    pub fn from_settings(settings: &DatabaseSettings) -> Self {
        let base = if settings.url.contains(":memory:") {
            Self::in_memory()
        } else {
            Self::new(settings.url.clone()).max_connections(settings.max_connections)
        };
        base.acquire_timeout(settings.acquire_timeout())
    }

    /// Set the minimum number of connections
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = min;
        self
    }

    /// Set the maximum number of connections
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the connection acquire timeout
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the statement cache capacity
    pub fn statement_cache_capacity(mut self, capacity: usize) -> Self {
        self.statement_cache_capacity = capacity;
        self
    }

    fn is_in_memory(&self) -> bool {
        self.database_url.contains(":memory:")
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Create a configured SQLite connection pool
///
/// Configures the connection options, opens the pool, applies pending
/// migrations and runs a health check.
///
/// # Errors
///
/// Returns an error if:
/// - The URL cannot be parsed or the file cannot be opened
/// - Migrations fail
/// - Health check fails
pub async fn create_pool(config: DatabaseConfig) -> Result<SqlitePool> {
    info!(
        database_url = %redact_url_credentials(&config.database_url),
        max_connections = config.max_connections,
        "Creating database connection pool"
    );

    let mut connect_options =
        SqliteConnectOptions::from_str(&config.database_url).map_err(CatalogError::Database)?;

    connect_options = connect_options
        .synchronous(SqliteSynchronous::Normal)
        .foreign_keys(true)
        .create_if_missing(true)
        .busy_timeout(config.acquire_timeout)
        .statement_cache_capacity(config.statement_cache_capacity);

    if !config.is_in_memory() {
        connect_options = connect_options.journal_mode(SqliteJournalMode::Wal);
    }

    debug!("SQLite connection options configured");

    let pool = SqlitePoolOptions::new()
        .min_connections(config.min_connections)
        .max_connections(config.max_connections)
        .acquire_timeout(config.acquire_timeout)
        .max_lifetime(config.max_lifetime)
        .idle_timeout(config.idle_timeout)
        .connect_with(connect_options)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to create connection pool");
            CatalogError::Database(e)
        })?;

    run_migrations(&pool).await?;
    health_check(&pool).await?;

    info!(connections = pool.size(), "Database connection pool ready");
    Ok(pool)
}

/// In-memory pool with migrations applied, for tests.
pub async fn create_test_pool() -> Result<SqlitePool> {
    create_pool(DatabaseConfig::in_memory()).await
}

async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    debug!("Running database migrations");

    sqlx::migrate!("./migrations").run(pool).await.map_err(|e| {
        warn!(error = %e, "Migration failed");
        CatalogError::Migration(e.to_string())
    })?;

    Ok(())
}

/// Execute a trivial query to prove the pool can reach the database.
pub async fn health_check(pool: &SqlitePool) -> Result<()> {
    sqlx::query("SELECT 1").fetch_one(pool).await.map_err(|e| {
        warn!(error = %e, "Database health check failed");
        CatalogError::Database(e)
    })?;

    debug!("Database health check passed");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::Row;

    #[tokio::test]
    async fn test_create_test_pool() {
        let pool = create_test_pool().await;
        assert!(pool.is_ok(), "Should create test pool successfully");
    }

    #[tokio::test]
    async fn test_migrations_create_tables() {
        let pool = create_test_pool().await.unwrap();

        let tables: Vec<String> = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' AND name != 'sqlite_sequence' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap()
        .into_iter()
        .map(|row| row.get::<String, _>("name"))
        .collect();

        assert_eq!(tables, vec!["providers", "stream_cleanup_work", "streams"]);
    }

    #[tokio::test]
    async fn test_file_backed_pool() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("kptv.db").display());

        let pool = create_pool(DatabaseConfig::new(url).max_connections(2))
            .await
            .unwrap();
        health_check(&pool).await.unwrap();
        pool.close().await;
    }

    #[tokio::test]
    async fn test_closed_pool_fails_health_check() {
        let pool = create_test_pool().await.unwrap();
        pool.close().await;
        assert!(matches!(
            health_check(&pool).await,
            Err(CatalogError::Database(_))
        ));
    }

    #[test]
    fn test_database_config_builder() {
        let config = DatabaseConfig::new("sqlite:kptv.db")
            .min_connections(2)
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(5))
            .statement_cache_capacity(50);

        assert_eq!(config.min_connections, 2);
        assert_eq!(config.max_connections, 8);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.statement_cache_capacity, 50);
        assert!(!config.is_in_memory());
        assert!(DatabaseConfig::in_memory().is_in_memory());
    }

    #[test]
    fn test_config_from_settings() {
        let file = DatabaseConfig::from_settings(&DatabaseSettings {
            url: "sqlite:/var/lib/kptv/kptv.db".to_string(),
            max_connections: 4,
            acquire_timeout_secs: 7,
        });
        assert_eq!(file.max_connections, 4);
        assert_eq!(file.acquire_timeout, Duration::from_secs(7));

        let memory = DatabaseConfig::from_settings(&DatabaseSettings {
            url: "sqlite::memory:".to_string(),
            max_connections: 4,
            acquire_timeout_secs: 7,
        });
        assert_eq!(memory.max_connections, 1);
        assert_eq!(memory.idle_timeout, None);
    }
}
