//! SQLite database connection, transaction and migration management.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use futures_util::future::BoxFuture;
use sqlx::SqliteConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, warn};

use super::helpers::in_transaction;

use super::{
    SqliteAuthorRepository, SqliteBookRepository, SqliteChapterRepository,
    SqliteLocationRepository, SqliteMetadataRepository, SqliteSeriesRepository,
    SqliteTimelineRepository, SqliteTropeRepository,
};
use crate::db::{Database, DbError, DbResult, HealthStatus};

/// Pool size used when the caller does not pick one.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

/// How long a caller waits for a pooled connection before giving up.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite database implementation.
///
/// Owns the connection pool shared by every repository and tool handler.
/// Provides access to repositories via associated types, avoiding dynamic dispatch.
pub struct SqliteDatabase {
    pool: SqlitePool,
}

impl SqliteDatabase {
    /// Open (or create) a database file with the default pool size.
    pub async fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        Self::open_with(path, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Open (or create) a database file with a bounded pool of `max_connections`.
    pub async fn open_with<P: AsRef<Path>>(path: P, max_connections: u32) -> DbResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| DbError::Connection {
                message: e.to_string(),
            })?;

        debug!(path = %path.as_ref().display(), max_connections, "opened sqlite pool");
        Ok(Self { pool })
    }

    /// Create an in-memory database (useful for testing).
    ///
    /// Every SQLite in-memory connection is its own database, so the pool is
    /// pinned to a single connection that is never recycled.
    pub async fn in_memory() -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .acquire_timeout(ACQUIRE_TIMEOUT)
            .connect_with(options)
            .await
            .map_err(|e| DbError::Connection {
                message: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    /// The shared connection pool.
    ///
    /// Single statements run directly against the pool: a connection is
    /// leased for the statement and returned afterwards, also on error.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run `body` inside one transaction on one leased connection.
    ///
    /// Commits when `body` returns `Ok`, rolls back and returns the error otherwise.
    pub async fn transaction<T, F>(&self, body: F) -> DbResult<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut SqliteConnection) -> BoxFuture<'c, DbResult<T>> + Send,
    {
        in_transaction(&self.pool, body).await
    }
}

impl Database for SqliteDatabase {
    type Authors<'a> = SqliteAuthorRepository<'a>;
    type Series<'a> = SqliteSeriesRepository<'a>;
    type Books<'a> = SqliteBookRepository<'a>;
    type Chapters<'a> = SqliteChapterRepository<'a>;
    type Locations<'a> = SqliteLocationRepository<'a>;
    type Metadata<'a> = SqliteMetadataRepository<'a>;
    type Tropes<'a> = SqliteTropeRepository<'a>;
    type Timeline<'a> = SqliteTimelineRepository<'a>;

    async fn migrate(&self) -> DbResult<()> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> HealthStatus {
        match sqlx::query_scalar::<_, String>("SELECT datetime('now')")
            .fetch_one(&self.pool)
            .await
        {
            Ok(timestamp) => HealthStatus {
                healthy: true,
                timestamp: Some(timestamp),
                error: None,
            },
            Err(e) => {
                warn!(error = %e, "health check failed");
                HealthStatus {
                    healthy: false,
                    timestamp: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn authors(&self) -> Self::Authors<'_> {
        SqliteAuthorRepository { pool: &self.pool }
    }

    fn series(&self) -> Self::Series<'_> {
        SqliteSeriesRepository { pool: &self.pool }
    }

    fn books(&self) -> Self::Books<'_> {
        SqliteBookRepository { pool: &self.pool }
    }

    fn chapters(&self) -> Self::Chapters<'_> {
        SqliteChapterRepository { pool: &self.pool }
    }

    fn locations(&self) -> Self::Locations<'_> {
        SqliteLocationRepository { pool: &self.pool }
    }

    fn metadata(&self) -> Self::Metadata<'_> {
        SqliteMetadataRepository { pool: &self.pool }
    }

    fn tropes(&self) -> Self::Tropes<'_> {
        SqliteTropeRepository { pool: &self.pool }
    }

    fn timeline(&self) -> Self::Timeline<'_> {
        SqliteTimelineRepository { pool: &self.pool }
    }
}
