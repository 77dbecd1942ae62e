use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::SqlitePoolOptions;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::{PostgresDatabase, SqliteDatabase, TransactionError, TransactionResult};

pub const DATABASE_URL: &str = "DATABASE_URL";
pub const DATABASE_MAX_CONNECTIONS: &str = "DATABASE_MAX_CONNECTIONS";
pub const DATABASE_ACQUIRE_TIMEOUT_SECS: &str = "DATABASE_ACQUIRE_TIMEOUT_SECS";

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for building a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl DatabaseConfig {
    /// Create a new DatabaseConfig for `url` with the default pool settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
        }
    }

    /// Private in-memory SQLite database.
    ///
    /// Every pooled connection would see its own empty database, so the pool
    /// is pinned to a single connection. While a transaction holds that
    /// connection, statements must go through the runner handed to the work
    /// unit: a statement issued on the outer [`SqliteDatabase`] waits for
    /// `acquire_timeout` (30s by default) and then fails with
    /// `sqlx::Error::PoolTimedOut`.
    pub fn sqlite_memory() -> Self {
        Self {
            max_connections: 1,
            ..Self::new("sqlite::memory:")
        }
    }

    /// Read settings from `DATABASE_URL`, `DATABASE_MAX_CONNECTIONS` and
    /// `DATABASE_ACQUIRE_TIMEOUT_SECS`. Only the URL is required.
    pub fn from_env() -> TransactionResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> TransactionResult<Self> {
        let url = lookup(DATABASE_URL)
            .filter(|url| !url.trim().is_empty())
            .ok_or_else(|| TransactionError::InvalidConfig(format!("{} is not set", DATABASE_URL)))?;

        let mut config = Self::new(url);
        if let Some(raw) = lookup(DATABASE_MAX_CONNECTIONS) {
            config.max_connections = parse_var(DATABASE_MAX_CONNECTIONS, &raw)?;
            if config.max_connections == 0 {
                return Err(TransactionError::InvalidConfig(format!(
                    "{} must be at least 1",
                    DATABASE_MAX_CONNECTIONS
                )));
            }
        }
        if let Some(raw) = lookup(DATABASE_ACQUIRE_TIMEOUT_SECS) {
            config.acquire_timeout =
                Duration::from_secs(parse_var(DATABASE_ACQUIRE_TIMEOUT_SECS, &raw)?);
        }
        Ok(config)
    }

    fn is_sqlite_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }

    /// Open a SQLite pool with these settings.
    pub async fn connect_sqlite(&self) -> TransactionResult<SqliteDatabase> {
        let mut options = SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout);
        if self.is_sqlite_memory() {
            // Closing the last connection drops the database.
            options = options.min_connections(1).idle_timeout(None).max_lifetime(None);
        }
        let pool = options.connect(&self.url).await?;
        log::debug!("connected sqlite pool (max_connections={})", self.max_connections);
        Ok(SqliteDatabase::new(Arc::new(pool)))
    }

    /// Open a PostgreSQL pool with these settings.
    pub async fn connect_postgres(&self) -> TransactionResult<PostgresDatabase> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.url)
            .await?;
        log::debug!("connected postgres pool (max_connections={})", self.max_connections);
        Ok(PostgresDatabase::new(Arc::new(pool)))
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> TransactionResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|err| TransactionError::InvalidConfig(format!("{}={:?}: {}", key, raw, err)))
}
