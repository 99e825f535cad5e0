//! Backend-neutral parameter and result values.

use crate::DbError;

/// A single SQL value, bindable on either backend.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    /// Stored as `0`/`1` on SQLite.
    Bool(bool),
}

impl Value {
    /// `true` for SQL `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view. SQLite booleans come back as integers, so `Bool` maps too.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    /// Floating-point view; integers widen.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Real(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Text view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean view; non-zero integers are `true`.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            Value::Integer(i) => Some(*i != 0),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

/// One result row: column names alongside their values.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Row {
    pub(crate) fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        Self { columns, values }
    }

    /// Value at a column position.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Looks up a value by column name (exact match).
    pub fn by_name(&self, name: &str) -> Option<&Value> {
        let index = self.columns.iter().position(|c| c == name)?;
        self.values.get(index)
    }

    /// Column names in result order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// `true` if the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Consumes the row, keeping only its values.
    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

pub(crate) mod sqlite {
    use super::{Row, Value};
    use rusqlite::types::{ToSql, ToSqlOutput, Value as SqlValue, ValueRef};

    impl ToSql for Value {
        fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
            Ok(match self {
                Value::Null => ToSqlOutput::Owned(SqlValue::Null),
                Value::Integer(i) => ToSqlOutput::Owned(SqlValue::Integer(*i)),
                Value::Real(f) => ToSqlOutput::Owned(SqlValue::Real(*f)),
                Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
                Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
                Value::Bool(b) => ToSqlOutput::Owned(SqlValue::Integer(i64::from(*b))),
            })
        }
    }

    fn decode(value: ValueRef<'_>) -> Value {
        match value {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }

    pub(crate) fn decode_row(columns: &[String], row: &rusqlite::Row<'_>) -> rusqlite::Result<Row> {
        let mut values = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            values.push(decode(row.get_ref(index)?));
        }
        Ok(Row::new(columns.to_vec(), values))
    }
}

pub(crate) mod postgres {
    use super::{DbError, Row, Value};
    use bytes::BytesMut;
    use r2d2_postgres::postgres::types::{to_sql_checked, IsNull, ToSql, Type};
    use std::error::Error;

    type BoxError = Box<dyn Error + Sync + Send>;

    const TEXT_TYPES: [Type; 5] = [Type::TEXT, Type::VARCHAR, Type::BPCHAR, Type::NAME, Type::UNKNOWN];

    /// Encodes `value` as `T` after checking that `T` fits the parameter type.
    fn encode<T: ToSql>(value: &T, variant: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
        if !T::accepts(ty) {
            return Err(format!("cannot bind a {variant} value to a parameter of type {ty}").into());
        }
        value.to_sql(ty, out)
    }

    impl ToSql for Value {
        fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BoxError> {
            match self {
                Value::Null => Ok(IsNull::Yes),
                Value::Integer(i) => {
                    if *ty == Type::INT2 {
                        encode(&i16::try_from(*i)?, "integer", ty, out)
                    } else if *ty == Type::INT4 {
                        encode(&i32::try_from(*i)?, "integer", ty, out)
                    } else if *ty == Type::FLOAT8 {
                        encode(&(*i as f64), "integer", ty, out)
                    } else {
                        encode(i, "integer", ty, out)
                    }
                }
                Value::Real(f) => {
                    if *ty == Type::FLOAT4 {
                        encode(&(*f as f32), "real", ty, out)
                    } else {
                        encode(f, "real", ty, out)
                    }
                }
                Value::Text(s) => encode(s, "text", ty, out),
                Value::Blob(b) => encode(b, "blob", ty, out),
                Value::Bool(b) => encode(b, "boolean", ty, out),
            }
        }

        /// Types some variant can encode. The variant itself is checked in
        /// `to_sql`.
        fn accepts(ty: &Type) -> bool {
            [
                Type::BOOL,
                Type::INT2,
                Type::INT4,
                Type::INT8,
                Type::FLOAT4,
                Type::FLOAT8,
                Type::BYTEA,
            ]
            .contains(ty)
                || TEXT_TYPES.contains(ty)
        }

        to_sql_checked!();
    }

    fn decode(row: &r2d2_postgres::postgres::Row, index: usize) -> Result<Value, DbError> {
        let column = &row.columns()[index];
        let ty = column.type_();

        let value = if *ty == Type::BOOL {
            row.try_get::<_, Option<bool>>(index)?.map(Value::Bool)
        } else if *ty == Type::INT2 {
            row.try_get::<_, Option<i16>>(index)?.map(|v| Value::Integer(i64::from(v)))
        } else if *ty == Type::INT4 {
            row.try_get::<_, Option<i32>>(index)?.map(|v| Value::Integer(i64::from(v)))
        } else if *ty == Type::INT8 {
            row.try_get::<_, Option<i64>>(index)?.map(Value::Integer)
        } else if *ty == Type::FLOAT4 {
            row.try_get::<_, Option<f32>>(index)?.map(|v| Value::Real(f64::from(v)))
        } else if *ty == Type::FLOAT8 {
            row.try_get::<_, Option<f64>>(index)?.map(Value::Real)
        } else if *ty == Type::BYTEA {
            row.try_get::<_, Option<Vec<u8>>>(index)?.map(Value::Blob)
        } else if TEXT_TYPES.contains(ty) {
            row.try_get::<_, Option<String>>(index)?.map(Value::Text)
        } else {
            return Err(DbError::Decode {
                column: column.name().to_string(),
                ty: ty.name().to_string(),
            });
        };

        Ok(value.unwrap_or(Value::Null))
    }

    pub(crate) fn decode_row(row: &r2d2_postgres::postgres::Row) -> Result<Row, DbError> {
        let columns: Vec<String> = row.columns().iter().map(|c| c.name().to_string()).collect();
        let mut values = Vec::with_capacity(columns.len());
        for index in 0..columns.len() {
            values.push(decode(row, index)?);
        }
        Ok(Row::new(columns, values))
    }

}
