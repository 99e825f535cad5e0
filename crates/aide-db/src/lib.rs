//! Database layer for the Aide service.
//!
//! Builds one process-wide [`Engine`] from a connection string and hands
//! out short-lived [`Session`]s through a [`SessionFactory`].
//!
//! # Design decisions
//!
//! - **Closed target set**: the URL scheme is inspected once, in
//!   [`DatabaseTarget::parse`], and yields either `FileBased` (SQLite) or
//!   `Networked` (Postgres). Each variant carries its own pool policy.
//! - **One SQLite connection**: an embedded database is served by a
//!   single connection opened in serialized mode and kept for the life of
//!   the process, so in-memory databases survive between sessions and
//!   sessions take turns instead of contending for the file.
//! - **`r2d2` pools for both variants**: checkout is the only
//!   synchronization point, and dropping a session returns its connection.
//! - **No implicit commits**: sessions open a transaction on first use and
//!   roll it back on release unless the caller committed.

mod engine;
mod error;
mod factory;
mod schema;
mod session;
mod target;
mod value;

pub use engine::{Engine, EngineOptions, FilePool, NetworkPool, PoolState};
pub use error::DbError;
pub use factory::SessionFactory;
pub use schema::{Column, ColumnType, Metadata, TableDef};
pub use session::Session;
pub use target::{DatabaseTarget, Dialect};
pub use value::{Row, Value};
