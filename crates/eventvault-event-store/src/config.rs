//! Connection settings for the `SQLite` backend.

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;
use tracing::info;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Errors raised while reading configuration or opening the pool.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("{0} environment variable must be set")]
    Missing(&'static str),

    /// An environment variable holds a value that does not parse.
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        /// Variable name.
        name: &'static str,
        /// What the value should look like.
        expected: &'static str,
        /// The rejected value.
        value: String,
    },

    /// Database connection or pool error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// How to reach the event database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStoreConfig {
    /// `sqlite:` URL of the database.
    pub database_url: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
    /// How long a connection waits for `SQLite`'s write lock.
    pub busy_timeout: Duration,
    in_memory: bool,
}

impl SqlStoreConfig {
    /// Settings for the database at `database_url` with default limits.
    #[must_use]
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            in_memory: false,
        }
    }

    /// A private in-memory database.
    ///
    /// Each in-memory connection is its own database, so the pool holds a
    /// single connection that is never recycled.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            max_connections: 1,
            in_memory: true,
            ..Self::new("sqlite::memory:")
        }
    }

    /// Reads `DATABASE_URL`, `EVENTVAULT_MAX_CONNECTIONS` and
    /// `EVENTVAULT_BUSY_TIMEOUT_MS` from the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] without `DATABASE_URL` and
    /// [`ConfigError::Invalid`] for values that do not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// As [`SqlStoreConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// As [`SqlStoreConfig::from_env`].
    pub fn from_lookup(
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let mut config = Self::new(database_url);

        if let Some(value) = lookup("EVENTVAULT_MAX_CONNECTIONS") {
            config.max_connections = match value.parse() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "EVENTVAULT_MAX_CONNECTIONS",
                        expected: "a positive integer",
                        value,
                    });
                }
            };
        }
        if let Some(value) = lookup("EVENTVAULT_BUSY_TIMEOUT_MS") {
            let millis = value.parse().map_err(|_| ConfigError::Invalid {
                name: "EVENTVAULT_BUSY_TIMEOUT_MS",
                expected: "a number of milliseconds",
                value: value.clone(),
            })?;
            config.busy_timeout = Duration::from_millis(millis);
        }
        Ok(config)
    }

    /// Opens a connection pool, creating the database file if needed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Database`] when the URL is invalid or the
    /// database cannot be opened.
    pub async fn connect(&self) -> Result<SqlitePool, ConfigError> {
        let options = SqliteConnectOptions::from_str(&self.database_url)?
            .create_if_missing(true)
            .busy_timeout(self.busy_timeout);

        let mut pool = SqlitePoolOptions::new().max_connections(self.max_connections);
        if self.in_memory {
            pool = pool.idle_timeout(None).max_lifetime(None);
        }
        let pool = pool.connect_with(options).await?;

        info!(
            max_connections = self.max_connections,
            in_memory = self.in_memory,
            "Opened event database"
        );
        Ok(pool)
    }
}
