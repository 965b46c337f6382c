//! # Database Handle
//!
//! Opens the SQLite store that holds documents, series counters and the
//! stock ledger.
//!
//! ## Locking Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  file database                       in-memory database                │
//! │  ─────────────                       ──────────────────                │
//! │  WAL journal, N pooled connections   one connection, memory journal    │
//! │  readers never block the writer      every caller queues on the pool   │
//! │                                                                         │
//! │  A mutating transaction starts with a write (counter bump, row touch,  │
//! │  product lock) so it takes the RESERVED lock before it reads anything. │
//! │  Other writers wait in the busy handler until it commits.              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! With the in-memory store, never acquire a second connection while a
//! transaction is open: the pool has only one.

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::migrations;

/// Path understood as "no file, keep everything in memory".
pub const MEMORY_PATH: &str = ":memory:";

// =============================================================================
// Configuration
// =============================================================================

/// How to open the store.
///
/// ```rust,ignore
/// let config = DbConfig::new("/var/lib/fiscal/fiscal.db")
///     .max_connections(8)
///     .busy_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// SQLite file, created when missing, or [`MEMORY_PATH`].
    pub path: PathBuf,
    pub max_connections: u32,
    /// How long a queued writer waits for the lock before `SQLITE_BUSY`.
    pub busy_timeout: Duration,
    /// How long a caller waits for a free pooled connection.
    pub acquire_timeout: Duration,
    /// Apply embedded migrations when opening.
    pub migrate: bool,
}

impl DbConfig {
    pub fn new(path: impl AsRef<Path>) -> Self {
        DbConfig {
            path: path.as_ref().to_path_buf(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
            acquire_timeout: Duration::from_secs(30),
            migrate: true,
        }
    }

    /// Single-connection memory store, used by tests and demos.
    pub fn in_memory() -> Self {
        DbConfig {
            max_connections: 1,
            acquire_timeout: Duration::from_secs(5),
            ..DbConfig::new(MEMORY_PATH)
        }
    }

    /// Ignored for the in-memory store, which always has one connection.
    pub fn max_connections(mut self, max: u32) -> Self {
        if !self.is_in_memory() {
            self.max_connections = max;
        }
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn without_migrations(mut self) -> Self {
        self.migrate = false;
        self
    }

    pub fn is_in_memory(&self) -> bool {
        self.path == Path::new(MEMORY_PATH)
    }

    fn connect_options(&self) -> SqliteConnectOptions {
        let options = SqliteConnectOptions::new()
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout);

        if self.is_in_memory() {
            options
                .in_memory(true)
                .journal_mode(SqliteJournalMode::Memory)
        } else {
            options
                .filename(&self.path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal)
        }
    }
}

// =============================================================================
// Database
// =============================================================================

/// Cloneable handle over the pool.
///
/// Repositories borrow a connection from [`Database::begin`] or
/// [`Database::acquire`]; the caller decides what shares a transaction.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Opens the pool and applies pending migrations.
    pub async fn new(config: DbConfig) -> DbResult<Self> {
        info!(
            path = %config.path.display(),
            max_connections = config.max_connections,
            "Opening fiscal database"
        );

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout);
        if config.is_in_memory() {
            // The data dies with the last connection
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(config.connect_options())
            .await
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;
        debug!("Pool connected");

        let db = Database { pool };
        if config.migrate {
            db.run_migrations().await?;
        }
        Ok(db)
    }

    /// Applies pending migrations. Safe to call repeatedly.
    pub async fn run_migrations(&self) -> DbResult<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Starts a transaction. Dropping it without `commit` rolls back.
    pub async fn begin(&self) -> DbResult<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// A pooled connection for reads outside any transaction.
    pub async fn acquire(&self) -> DbResult<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        debug!("Closing fiscal database");
        self.pool.close().await;
    }

    /// True when the store answers a trivial query.
    pub async fn health_check(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}
