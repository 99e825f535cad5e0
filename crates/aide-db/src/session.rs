//! Units of work over a pooled connection.

use crate::value::{postgres as pg_value, sqlite as sqlite_value};
use crate::{DbError, Dialect, Row, Value};
use r2d2::PooledConnection;
use r2d2_postgres::postgres::types::ToSql;
use r2d2_postgres::postgres::NoTls;
use r2d2_postgres::PostgresConnectionManager;
use r2d2_sqlite::SqliteConnectionManager;
use std::borrow::Cow;

pub(crate) enum Connection {
    FileBased(PooledConnection<SqliteConnectionManager>),
    Networked(PooledConnection<PostgresConnectionManager<NoTls>>),
}

/// A single unit of work bound to one pooled connection.
///
/// Nothing is committed implicitly. The first statement opens a
/// transaction; [`Session::commit`] makes the work durable. Dropping the
/// session (or calling [`Session::close`]) rolls back whatever is still
/// pending and hands the connection back to the pool.
///
/// Placeholders are written `$1`, `$2`, … on both backends.
pub struct Session {
    conn: Connection,
    in_transaction: bool,
    echo: bool,
}

impl Session {
    pub(crate) fn new(conn: Connection, echo: bool) -> Self {
        Self {
            conn,
            in_transaction: false,
            echo,
        }
    }

    /// SQL dialect of the connection behind this session.
    pub fn dialect(&self) -> Dialect {
        match self.conn {
            Connection::FileBased(_) => Dialect::Sqlite,
            Connection::Networked(_) => Dialect::Postgres,
        }
    }

    /// Whether uncommitted work is pending.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Executes a statement and returns the number of affected rows.
    pub fn execute(&mut self, sql: &str, params: &[Value]) -> Result<usize, DbError> {
        self.begin()?;
        self.log_statement(sql, params);

        match &mut self.conn {
            Connection::FileBased(conn) => {
                let sql = sqlite_placeholders(sql);
                Ok(conn.execute(&sql, rusqlite::params_from_iter(params.iter()))?)
            }
            Connection::Networked(client) => {
                let params = pg_params(params);
                let affected = client.execute(sql, &params)?;
                Ok(usize::try_from(affected).unwrap_or(usize::MAX))
            }
        }
    }

    /// Runs a query and collects every row.
    pub fn query(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>, DbError> {
        self.begin()?;
        self.log_statement(sql, params);

        match &mut self.conn {
            Connection::FileBased(conn) => {
                let sql = sqlite_placeholders(sql);
                let mut stmt = conn.prepare(&sql)?;
                let columns: Vec<String> =
                    stmt.column_names().into_iter().map(str::to_string).collect();
                let rows = stmt.query_map(rusqlite::params_from_iter(params.iter()), |row| {
                    sqlite_value::decode_row(&columns, row)
                })?;
                Ok(rows.collect::<Result<Vec<_>, _>>()?)
            }
            Connection::Networked(client) => {
                let params = pg_params(params);
                client
                    .query(sql, &params)?
                    .iter()
                    .map(pg_value::decode_row)
                    .collect()
            }
        }
    }

    /// Runs the first row of a query, if any.
    pub fn query_one(&mut self, sql: &str, params: &[Value]) -> Result<Option<Row>, DbError> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Executes several parameterless statements separated by `;`.
    pub fn execute_batch(&mut self, sql: &str) -> Result<(), DbError> {
        self.begin()?;
        self.log_statement(sql, &[]);
        self.raw(sql)
    }

    /// Commits pending work. A no-op when nothing is pending.
    pub fn commit(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.log_statement("COMMIT", &[]);
        self.raw("COMMIT")?;
        self.in_transaction = false;
        Ok(())
    }

    /// Discards pending work. A no-op when nothing is pending.
    pub fn rollback(&mut self) -> Result<(), DbError> {
        if !self.in_transaction {
            return Ok(());
        }
        self.log_statement("ROLLBACK", &[]);
        // Cleared first: a failed ROLLBACK must not be retried on drop.
        self.in_transaction = false;
        self.raw("ROLLBACK")
    }

    /// Rolls back pending work and releases the connection.
    pub fn close(mut self) -> Result<(), DbError> {
        self.rollback()
    }

    fn begin(&mut self) -> Result<(), DbError> {
        if self.in_transaction {
            return Ok(());
        }
        self.log_statement("BEGIN", &[]);
        self.raw("BEGIN")?;
        self.in_transaction = true;
        Ok(())
    }

    fn raw(&mut self, sql: &str) -> Result<(), DbError> {
        match &mut self.conn {
            Connection::FileBased(conn) => conn.execute_batch(sql)?,
            Connection::Networked(client) => client.batch_execute(sql)?,
        }
        Ok(())
    }

    fn log_statement(&self, sql: &str, params: &[Value]) {
        if self.echo {
            tracing::info!(target: "aide_db::echo", %sql, ?params, "statement");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if let Err(e) = self.rollback() {
            tracing::warn!(error = %e, "rollback on session release failed");
        }
    }
}

fn pg_params(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

/// Rewrites `$N` placeholders to SQLite's `?N`, leaving quoted text alone.
pub(crate) fn sqlite_placeholders(sql: &str) -> Cow<'_, str> {
    if !sql.contains('$') {
        return Cow::Borrowed(sql);
    }

    let mut out = String::with_capacity(sql.len());
    let mut quote: Option<char> = None;
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (None, '\'' | '"') => quote = Some(c),
            (None, '$') if chars.peek().is_some_and(char::is_ascii_digit) => {
                out.push('?');
                continue;
            }
            _ => {}
        }
        out.push(c);
    }

    Cow::Owned(out)
}
