//! Connection-string parsing into a closed set of engine variants.

use crate::DbError;
use std::fmt;

/// Where the engine connects, decided once from the URL scheme.
#[derive(Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    /// An embedded single-file SQLite database.
    FileBased {
        /// Filesystem path of the database, or `None` for an in-memory one.
        path: Option<String>,
    },
    /// A Postgres server reached over the network.
    Networked {
        /// Connection string with any `+driver` suffix removed from the scheme.
        url: String,
    },
}

/// SQL dialect spoken by a target. Drives DDL rendering and placeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl DatabaseTarget {
    /// Parses a connection string.
    ///
    /// File-based URLs follow the `sqlite:///relative.db` /
    /// `sqlite:////absolute.db` convention; `sqlite://` and
    /// `sqlite:///:memory:` mean in-memory. A query string is ignored for
    /// file-based targets and preserved for networked ones.
    ///
    /// # Errors
    ///
    /// `DbError::InvalidUrl` if there is no `scheme://` separator,
    /// `DbError::UnsupportedScheme` for anything other than SQLite or Postgres.
    pub fn parse(url: &str) -> Result<Self, DbError> {
        let (scheme, rest) = url
            .split_once("://")
            .ok_or_else(|| DbError::InvalidUrl(format!("missing scheme in '{url}'")))?;
        let base_scheme = scheme.split('+').next().unwrap_or(scheme);

        let base_scheme = base_scheme.to_ascii_lowercase();

        match base_scheme.as_str() {
            "sqlite" => {
                let path = rest.strip_prefix('/').unwrap_or(rest);
                let path = path.split('?').next().unwrap_or(path);
                let path = match path {
                    "" | ":memory:" => None,
                    p => Some(p.to_string()),
                };
                Ok(Self::FileBased { path })
            }
            "postgres" | "postgresql" => Ok(Self::Networked {
                url: format!("{base_scheme}://{rest}"),
            }),
            other => Err(DbError::UnsupportedScheme(other.to_string())),
        }
    }

    /// The dialect this target speaks.
    pub fn dialect(&self) -> Dialect {
        match self {
            Self::FileBased { .. } => Dialect::Sqlite,
            Self::Networked { .. } => Dialect::Postgres,
        }
    }
}

/// Hides credentials embedded in networked URLs.
impl fmt::Display for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FileBased { path: Some(path) } => write!(f, "sqlite file {path}"),
            Self::FileBased { path: None } => f.write_str("sqlite in-memory"),
            Self::Networked { url } => {
                let (scheme, rest) = url.split_once("://").unwrap_or(("postgres", url));
                match rest.rsplit_once('@') {
                    Some((_, host)) => write!(f, "{scheme}://***@{host}"),
                    None => write!(f, "{scheme}://{rest}"),
                }
            }
        }
    }
}

impl fmt::Debug for DatabaseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatabaseTarget({self})")
    }
}
