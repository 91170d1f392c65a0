/// Database connection pool management
///
/// The pool is built from discrete connection settings (host, port, database,
/// user, password, SSL mode) rather than a URL, and is created lazily: no
/// connection is opened until the first query. That keeps process startup
/// independent of database availability.
///
/// Every connection is opened with a server-side `statement_timeout`, so a
/// degraded database cannot block a request indefinitely.
///
/// # Example
///
/// ```no_run
/// use taskboard_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), sqlx::Error> {
/// let config = DatabaseConfig {
///     host: "localhost".to_string(),
///     password: "secret".to_string(),
///     ..Default::default()
/// };
///
/// let pool = create_pool(&config)?;
///
/// let row: (i64,) = sqlx::query_as("SELECT $1")
///     .bind(42i64)
///     .fetch_one(&pool)
///     .await?;
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgSslMode};
use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for the database connection pool
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database server host name
    pub host: String,

    /// Database server port
    pub port: u16,

    /// Database name
    pub database: String,

    /// Login role
    pub username: String,

    /// Login password (never logged)
    pub password: String,

    /// libpq-style SSL mode: disable, allow, prefer, require, verify-ca, verify-full
    pub ssl_mode: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// How long a request waits for a pooled connection (seconds)
    pub acquire_timeout_seconds: u64,

    /// How long a connection can remain idle before being closed (seconds)
    pub idle_timeout_seconds: Option<u64>,

    /// Server-side statement timeout applied to every connection (milliseconds)
    pub statement_timeout_ms: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            database: "taskboard".to_string(),
            username: "taskboard".to_string(),
            password: String::new(),
            ssl_mode: "prefer".to_string(),
            max_connections: 10,
            acquire_timeout_seconds: 5,
            idle_timeout_seconds: Some(600),
            statement_timeout_ms: 5_000,
        }
    }
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_seconds", &self.acquire_timeout_seconds)
            .field("idle_timeout_seconds", &self.idle_timeout_seconds)
            .field("statement_timeout_ms", &self.statement_timeout_ms)
            .finish()
    }
}

impl DatabaseConfig {
    /// Parses the configured SSL mode
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error::Configuration` for an unknown mode.
    pub fn parsed_ssl_mode(&self) -> Result<PgSslMode, sqlx::Error> {
        self.ssl_mode.parse::<PgSslMode>()
    }

    /// Builds driver connect options from the discrete settings
    pub fn connect_options(&self) -> Result<PgConnectOptions, sqlx::Error> {
        let statement_timeout = self.statement_timeout_ms.to_string();

        Ok(PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(&self.database)
            .username(&self.username)
            .password(&self.password)
            .ssl_mode(self.parsed_ssl_mode()?)
            .application_name("taskboard")
            .options([("statement_timeout", statement_timeout.as_str())]))
    }
}

/// Creates a lazily-connecting PostgreSQL pool
///
/// No connection is attempted here; the first query opens one. Use
/// [`health_check`] to check connectivity.
///
/// # Errors
///
/// Returns an error if the configuration cannot be turned into connect options
/// (for example an unknown SSL mode).
pub fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    info!(
        host = %config.host,
        port = config.port,
        database = %config.database,
        max_connections = config.max_connections,
        statement_timeout_ms = config.statement_timeout_ms,
        "Creating database connection pool"
    );

    let mut pool_options = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds));

    if let Some(idle_timeout) = config.idle_timeout_seconds {
        pool_options = pool_options.idle_timeout(Duration::from_secs(idle_timeout));
        debug!(idle_timeout_seconds = idle_timeout, "Set idle timeout");
    }

    Ok(pool_options.connect_lazy_with(config.connect_options()?))
}

/// Performs a health check on the database connection
///
/// Executes a simple query to verify the database is reachable and responding.
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    debug!("Performing database health check");

    let result: (i32,) = sqlx::query_as("SELECT 1").fetch_one(pool).await?;

    if result.0 == 1 {
        debug!("Database health check passed");
        Ok(())
    } else {
        warn!("Database health check returned unexpected value: {}", result.0);
        Err(sqlx::Error::Protocol(
            "Health check returned unexpected value".into(),
        ))
    }
}

/// Gracefully closes the connection pool
///
/// Called during shutdown so in-flight connections are returned and closed.
pub async fn close_pool(pool: &PgPool) {
    info!("Closing database connection pool");
    pool.close().await;
    info!("Database connection pool closed");
}
