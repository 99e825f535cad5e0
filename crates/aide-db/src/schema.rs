//! Registry of entity definitions and the DDL that materializes them.
//!
//! Tables are created in registration order and dropped in reverse, so a
//! table must be registered after every table it references.

use crate::{DbError, Dialect, Session};

/// Storage type of a column, rendered per dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Integer,
    BigInteger,
    Real,
    Text,
    Boolean,
    Blob,
    /// ISO-8601 text on both backends, so it reads back as `Value::Text`.
    Timestamp,
}

impl ColumnType {
    fn sql(self, dialect: Dialect) -> &'static str {
        match (dialect, self) {
            (Dialect::Sqlite, ColumnType::Integer | ColumnType::BigInteger | ColumnType::Boolean) => {
                "INTEGER"
            }
            (Dialect::Sqlite, ColumnType::Real) => "REAL",
            (Dialect::Sqlite, ColumnType::Text | ColumnType::Timestamp) => "TEXT",
            (Dialect::Sqlite, ColumnType::Blob) => "BLOB",
            (Dialect::Postgres, ColumnType::Integer) => "INTEGER",
            (Dialect::Postgres, ColumnType::BigInteger) => "BIGINT",
            (Dialect::Postgres, ColumnType::Real) => "DOUBLE PRECISION",
            (Dialect::Postgres, ColumnType::Text | ColumnType::Timestamp) => "TEXT",
            (Dialect::Postgres, ColumnType::Boolean) => "BOOLEAN",
            (Dialect::Postgres, ColumnType::Blob) => "BYTEA",
        }
    }

    fn is_integer(self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::BigInteger)
    }
}

/// A column definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    name: String,
    ty: ColumnType,
    primary_key: bool,
    autoincrement: bool,
    nullable: bool,
    unique: bool,
    default: Option<String>,
    references: Option<(String, String)>,
}

impl Column {
    /// A nullable column with no constraints.
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
            primary_key: false,
            autoincrement: false,
            nullable: true,
            unique: false,
            default: None,
            references: None,
        }
    }

    /// Part of the primary key. Implies `NOT NULL`.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Generated integer key. Only valid on a sole integer primary key.
    pub fn autoincrement(mut self) -> Self {
        self.autoincrement = true;
        self
    }

    /// Adds `NOT NULL`.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Adds `UNIQUE`.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// A raw SQL default expression, e.g. `0` or `CURRENT_TIMESTAMP`.
    pub fn default_sql(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Foreign key to `table(column)`.
    pub fn references(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.references = Some((table.into(), column.into()));
        self
    }

    /// Column name as registered.
    pub fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, dialect: Dialect, inline_pk: bool) -> String {
        let mut sql = format!("\"{}\" ", self.name);

        if self.autoincrement && dialect == Dialect::Postgres {
            sql.push_str(match self.ty {
                ColumnType::BigInteger => "BIGSERIAL",
                _ => "SERIAL",
            });
        } else {
            sql.push_str(self.ty.sql(dialect));
        }

        if self.primary_key && inline_pk {
            sql.push_str(" PRIMARY KEY");
            if self.autoincrement && dialect == Dialect::Sqlite {
                sql.push_str(" AUTOINCREMENT");
            }
        } else if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = &self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        if let Some((table, column)) = &self.references {
            sql.push_str(&format!(" REFERENCES \"{table}\" (\"{column}\")"));
        }
        sql
    }
}

/// A table definition: a name and its ordered columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDef {
    name: String,
    columns: Vec<Column>,
}

impl TableDef {
    /// An empty table definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    /// Appends a column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Table name as registered.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Columns in declaration order.
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// `CREATE TABLE IF NOT EXISTS` for this table in `dialect`.
    pub fn create_sql(&self, dialect: Dialect) -> String {
        let pk: Vec<&Column> = self.columns.iter().filter(|c| c.primary_key).collect();
        let inline_pk = pk.len() == 1;

        let mut parts: Vec<String> = self
            .columns
            .iter()
            .map(|c| c.render(dialect, inline_pk))
            .collect();
        if pk.len() > 1 {
            let names: Vec<String> = pk.iter().map(|c| format!("\"{}\"", c.name)).collect();
            parts.push(format!("PRIMARY KEY ({})", names.join(", ")));
        }

        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (\n    {}\n)",
            self.name,
            parts.join(",\n    ")
        )
    }

    /// `DROP TABLE IF EXISTS` for this table.
    pub fn drop_sql(&self) -> String {
        format!("DROP TABLE IF EXISTS \"{}\"", self.name)
    }
}

/// The set of registered entity definitions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    tables: Vec<TableDef>,
}

impl Metadata {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table after validating it.
    ///
    /// # Errors
    ///
    /// `DbError::Schema` for an invalid identifier, a duplicate table or
    /// column, an empty table, a misplaced `autoincrement`, or a reference to
    /// a table that is not yet registered.
    pub fn register(&mut self, table: TableDef) -> Result<(), DbError> {
        validate_identifier(&table.name)?;
        if self.table(&table.name).is_some() {
            return Err(DbError::Schema(format!("table '{}' is already registered", table.name)));
        }
        if table.columns.is_empty() {
            return Err(DbError::Schema(format!("table '{}' has no columns", table.name)));
        }

        let pk_count = table.columns.iter().filter(|c| c.primary_key).count();
        for (i, column) in table.columns.iter().enumerate() {
            validate_identifier(&column.name)?;
            if table.columns[..i].iter().any(|c| c.name == column.name) {
                return Err(DbError::Schema(format!(
                    "column '{}.{}' is defined twice",
                    table.name, column.name
                )));
            }
            if column.autoincrement && !(column.primary_key && pk_count == 1 && column.ty.is_integer()) {
                return Err(DbError::Schema(format!(
                    "column '{}.{}': autoincrement requires a sole integer primary key",
                    table.name, column.name
                )));
            }
            if let Some((ref_table, ref_column)) = &column.references {
                validate_identifier(ref_table)?;
                validate_identifier(ref_column)?;
                if ref_table != &table.name && self.table(ref_table).is_none() {
                    return Err(DbError::Schema(format!(
                        "column '{}.{}' references unregistered table '{ref_table}'",
                        table.name, column.name
                    )));
                }
            }
        }

        self.tables.push(table);
        Ok(())
    }

    /// Looks up a registered table by name.
    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.iter().find(|t| t.name == name)
    }

    /// Tables in registration order.
    pub fn tables(&self) -> &[TableDef] {
        &self.tables
    }

    /// `true` if no table is registered.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Creates every missing table, in registration order, and commits.
    pub(crate) fn create_all(&self, session: &mut Session) -> Result<(), DbError> {
        let dialect = session.dialect();
        for table in &self.tables {
            tracing::debug!(table = %table.name, "creating table if missing");
            session.execute_batch(&table.create_sql(dialect))?;
        }
        session.commit()
    }

    /// Drops every registered table, in reverse order, and commits.
    pub(crate) fn drop_all(&self, session: &mut Session) -> Result<(), DbError> {
        for table in self.tables.iter().rev() {
            tracing::debug!(table = %table.name, "dropping table");
            session.execute_batch(&table.drop_sql())?;
        }
        session.commit()
    }
}

fn validate_identifier(name: &str) -> Result<(), DbError> {
    let mut chars = name.chars();
    let valid = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(DbError::Schema(format!("invalid identifier '{name}'")))
    }
}
