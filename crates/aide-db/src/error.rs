//! Error types for engine construction and session work.

use thiserror::Error;

/// Errors raised by the database layer.
///
/// `InvalidUrl`, `UnsupportedScheme` and `Connection` occur while building
/// the engine and are fatal at startup. The rest surface during a unit of
/// work and are propagated to the caller unchanged.
#[derive(Debug, Error)]
pub enum DbError {
    /// The connection string could not be parsed.
    #[error("invalid database url: {0}")]
    InvalidUrl(String),

    /// The connection string names a scheme no engine variant handles.
    #[error("unsupported database scheme '{0}'")]
    UnsupportedScheme(String),

    /// The connection pool could not be established.
    #[error("failed to connect to {target}: {source}")]
    Connection {
        /// Redacted description of the database target.
        target: String,
        /// The underlying pool error.
        source: r2d2::Error,
    },

    /// A connection could not be checked out for a new session.
    #[error("failed to acquire database session: {0}")]
    Acquire(#[source] r2d2::Error),

    /// A SQLite statement failed.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A Postgres statement failed.
    #[error("postgres error: {0}")]
    Postgres(#[from] r2d2_postgres::postgres::Error),

    /// A column value could not be mapped to a [`crate::Value`].
    #[error("cannot decode column '{column}' of type {ty}; cast it to text in the query")]
    Decode {
        /// Column name.
        column: String,
        /// Backend type name.
        ty: String,
    },

    /// An entity definition was rejected by the schema registry.
    #[error("schema error: {0}")]
    Schema(String),
}
