//! Engine construction: one connection pool per process, shaped by target.

use crate::session::{Connection, Session};
use crate::{DatabaseTarget, DbError, Dialect};
use aide_config::Settings;
use r2d2::Pool;
use r2d2_postgres::postgres::{Config as PgConfig, NoTls};
use r2d2_postgres::PostgresConnectionManager;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::OpenFlags;
use std::fmt;
use std::time::Duration;

/// Pool over the single embedded SQLite connection.
pub type FilePool = Pool<SqliteConnectionManager>;

/// Pool over Postgres client connections.
pub type NetworkPool = Pool<PostgresConnectionManager<NoTls>>;

/// Runtime tunables for engine construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    /// Log every executed statement at info level under `aide_db::echo`.
    pub echo: bool,

    /// Maximum pooled connections for networked targets. File-based targets
    /// always hold exactly one.
    pub pool_max_size: u32,

    /// How long to wait when establishing the pool or checking out a
    /// connection.
    ///
    /// On a file-based target only one session can be open at a time, so a
    /// second checkout blocks until the first session is released and fails
    /// with `DbError::Acquire` once this elapses. A thread that already holds
    /// a session and asks for another always hits this timeout.
    pub connection_timeout: Duration,

    /// Busy timeout for SQLite connections, in milliseconds.
    pub busy_timeout_ms: u64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            echo: false,
            pool_max_size: 5,
            connection_timeout: Duration::from_secs(30),
            busy_timeout_ms: 5_000,
        }
    }
}

#[derive(Clone)]
pub(crate) enum EnginePool {
    FileBased(FilePool),
    Networked(NetworkPool),
}

/// Snapshot of pool occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolState {
    /// Open physical connections.
    pub connections: u32,
    /// Connections sitting idle in the pool.
    pub idle_connections: u32,
}

/// A process-wide handle to one database target.
///
/// Cloning is cheap; all clones share the same pool.
#[derive(Clone)]
pub struct Engine {
    target: DatabaseTarget,
    pool: EnginePool,
    echo: bool,
}

impl Engine {
    /// Builds the engine for `url`.
    ///
    /// File-based targets get a pool of exactly one connection that is opened
    /// eagerly and never recycled, opened in serialized threading mode so it
    /// may be used from any thread. Sessions take turns on it. Networked
    /// targets get a regular pool of up to `options.pool_max_size`
    /// connections.
    ///
    /// # Errors
    ///
    /// `DbError::InvalidUrl` / `DbError::UnsupportedScheme` for a bad URL and
    /// `DbError::Connection` if the pool cannot be established within
    /// `options.connection_timeout`. No retry is attempted beyond that.
    pub fn connect(url: &str, options: EngineOptions) -> Result<Self, DbError> {
        let target = DatabaseTarget::parse(url)?;

        let pool = match &target {
            DatabaseTarget::FileBased { path } => file_pool(path.as_deref(), &options)
                .map(EnginePool::FileBased)
                .map_err(|source| DbError::Connection {
                    target: target.to_string(),
                    source,
                })?,
            DatabaseTarget::Networked { url } => {
                let config: PgConfig = url
                    .parse()
                    .map_err(|e: r2d2_postgres::postgres::Error| DbError::InvalidUrl(e.to_string()))?;
                network_pool(config, &options)
                    .map(EnginePool::Networked)
                    .map_err(|source| DbError::Connection {
                        target: target.to_string(),
                        source,
                    })?
            }
        };

        tracing::info!(database = %target, echo = options.echo, "database engine ready");

        Ok(Self {
            target,
            pool,
            echo: options.echo,
        })
    }

    /// Builds the engine from resolved settings: the absolute database URL,
    /// with statement echo following `debug`.
    ///
    /// # Errors
    ///
    /// See [`Engine::connect`].
    pub fn from_settings(settings: &Settings) -> Result<Self, DbError> {
        let options = EngineOptions {
            echo: settings.debug,
            ..EngineOptions::default()
        };
        Self::connect(&settings.resolved_database_url(), options)
    }

    /// The target this engine was built for.
    pub fn target(&self) -> &DatabaseTarget {
        &self.target
    }

    /// SQL dialect of the target.
    pub fn dialect(&self) -> Dialect {
        self.target.dialect()
    }

    /// Whether executed statements are logged.
    pub fn echo(&self) -> bool {
        self.echo
    }

    /// Current pool occupancy.
    pub fn state(&self) -> PoolState {
        let state = match &self.pool {
            EnginePool::FileBased(pool) => pool.state(),
            EnginePool::Networked(pool) => pool.state(),
        };
        PoolState {
            connections: state.connections,
            idle_connections: state.idle_connections,
        }
    }

    /// Checks out a connection and wraps it in a fresh session.
    pub(crate) fn session(&self) -> Result<Session, DbError> {
        let conn = match &self.pool {
            EnginePool::FileBased(pool) => Connection::FileBased(pool.get().map_err(DbError::Acquire)?),
            EnginePool::Networked(pool) => Connection::Networked(pool.get().map_err(DbError::Acquire)?),
        };
        Ok(Session::new(conn, self.echo))
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("target", &self.target)
            .field("echo", &self.echo)
            .field("state", &self.state())
            .finish()
    }
}

fn file_pool(path: Option<&str>, options: &EngineOptions) -> Result<FilePool, r2d2::Error> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let busy_timeout_ms = options.busy_timeout_ms;

    let manager = match path {
        Some(path) => SqliteConnectionManager::file(path),
        None => SqliteConnectionManager::memory(),
    };
    let manager = manager.with_flags(flags).with_init(move |conn| {
        // In-memory databases report "memory", which is fine.
        let journal_mode: String =
            conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;
        if journal_mode != "wal" && journal_mode != "memory" {
            return Err(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_ERROR),
                Some(format!("failed to set WAL journal mode, got: {journal_mode}")),
            ));
        }
        conn.execute_batch(&format!(
            "PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = {busy_timeout_ms};"
        ))
    });

    // One connection, opened now and kept for the life of the process. An
    // in-memory database only exists as long as its connection does.
    Pool::builder()
        .max_size(1)
        .min_idle(Some(1))
        .idle_timeout(None)
        .max_lifetime(None)
        .connection_timeout(options.connection_timeout)
        .build(manager)
}

fn network_pool(config: PgConfig, options: &EngineOptions) -> Result<NetworkPool, r2d2::Error> {
    let manager = PostgresConnectionManager::new(config, NoTls);
    Pool::builder()
        .max_size(options.pool_max_size)
        .connection_timeout(options.connection_timeout)
        .build(manager)
}
