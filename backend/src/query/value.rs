//! Bindable SQL values
//!
//! Filter values arrive as untyped strings from the query string. They are
//! coerced against the declared [`ColumnKind`] of the column they target so
//! that `active=true`, `active=1` and `active[]=1` all bind the same value.

use chrono::{DateTime, Utc};
use sqlx::Sqlite;
use sqlx::query::{Query, QueryScalar};
use sqlx::sqlite::SqliteArguments;

use super::entity::ColumnKind;

/// Represents a SQL value that can be bound to a query.
///
/// Used by filters to collect values for parameterized queries.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl SqlValue {
    /// Coerce a raw parameter string into a value of the column's kind.
    ///
    /// Strings that do not parse as the column's kind are bound as text,
    /// which simply never matches a numeric column.
    pub fn coerce(raw: &str, kind: ColumnKind) -> Self {
        let raw = raw.trim();
        match kind {
            ColumnKind::Integer => raw
                .parse::<i64>()
                .map(SqlValue::Int)
                .ok()
                .or_else(|| parse_bool(raw).map(|b| SqlValue::Int(b as i64)))
                .unwrap_or_else(|| SqlValue::String(raw.to_string())),
            ColumnKind::Boolean => parse_bool(raw)
                .map(SqlValue::Bool)
                .unwrap_or_else(|| SqlValue::String(raw.to_string())),
            ColumnKind::Real => raw
                .parse::<f64>()
                .map(SqlValue::Float)
                .unwrap_or_else(|_| SqlValue::String(raw.to_string())),
            ColumnKind::Text | ColumnKind::Timestamp => SqlValue::String(raw.to_string()),
        }
    }

    /// Interpret this value as an integer relation key.
    pub fn as_key(&self) -> Option<i64> {
        match self {
            SqlValue::Int(i) => Some(*i),
            SqlValue::Bool(b) => Some(*b as i64),
            SqlValue::String(s) => s.parse().ok(),
            SqlValue::Float(_) | SqlValue::Null => None,
        }
    }

    /// Bind this value to a sqlx query builder
    pub fn bind_to_query<'q>(
        &'q self,
        query: Query<'q, Sqlite, SqliteArguments<'q>>,
    ) -> Query<'q, Sqlite, SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(if *b { 1i32 } else { 0i32 }),
            SqlValue::Null => query.bind(None::<String>),
        }
    }

    /// Bind this value to a scalar query (used for COUNT queries)
    pub fn bind_to_scalar<'q, O>(
        &'q self,
        query: QueryScalar<'q, Sqlite, O, SqliteArguments<'q>>,
    ) -> QueryScalar<'q, Sqlite, O, SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(if *b { 1i32 } else { 0i32 }),
            SqlValue::Null => query.bind(None::<String>),
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Some(true),
        "0" | "false" | "off" | "no" => Some(false),
        _ => None,
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(v as i64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::String(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_string())
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::String(v.format(crate::resource::TIMESTAMP_FORMAT).to_string())
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}
