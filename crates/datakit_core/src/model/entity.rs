//! Entity mapping contract.
//!
//! # Responsibility
//! - Bind a Rust type to a table name, a column list and a primary key.
//! - Convert entity values to and from ordered SQL value lists.
//!
//! # Invariants
//! - `to_values()` and `from_values()` use the order of `COLUMNS`.
//! - `PRIMARY_KEY` names one of `COLUMNS`.
//! - A primary key that is NULL, `0` or empty text is a "zero" key: the
//!   entity has not been persisted yet.

use crate::db::{DbError, DbResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::{FromSql, Value, ValueRef};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// One mapped column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub name: &'static str,
    /// Declared SQLite type used by `auto_migrate`, e.g. `INTEGER` or `TEXT NOT NULL`.
    pub sql_type: &'static str,
}

impl Column {
    pub const fn new(name: &'static str, sql_type: &'static str) -> Self {
        Self { name, sql_type }
    }
}

/// A type stored as rows of one table.
///
/// `Default` provides the zero value that `first` decodes into.
pub trait Entity: Default {
    const TABLE: &'static str;
    const PRIMARY_KEY: &'static str;
    const COLUMNS: &'static [Column];

    /// Field values in `COLUMNS` order.
    fn to_values(&self) -> Vec<Value>;

    /// Builds an entity from values in `COLUMNS` order.
    fn from_values(values: Vec<Value>) -> DbResult<Self>;

    fn primary_key(&self) -> Value;

    /// Receives the rowid generated for an entity inserted with a zero key.
    fn set_generated_key(&mut self, _key: i64) {}
}

/// Returns whether `value` marks an entity that has no identity yet.
pub fn is_zero_key(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Integer(key) => *key == 0,
        Value::Text(key) => key.is_empty(),
        _ => false,
    }
}

/// Rejects anything that cannot be interpolated into SQL as a bare name.
pub fn validate_identifier(name: &str) -> DbResult<&str> {
    if IDENTIFIER_RE.is_match(name) {
        Ok(name)
    } else {
        Err(DbError::InvalidIdentifier(name.to_string()))
    }
}

/// Sequential reader used by `Entity::from_values` implementations.
///
/// ```
/// use datakit_core::ValueReader;
/// use rusqlite::types::Value;
///
/// let mut reader = ValueReader::new("users", vec![Value::Integer(7), Value::Text("ada".into())]);
/// let id: i64 = reader.next().unwrap();
/// let name: String = reader.next().unwrap();
/// assert_eq!((id, name.as_str()), (7, "ada"));
/// ```
pub struct ValueReader {
    table: &'static str,
    position: usize,
    values: std::vec::IntoIter<Value>,
}

impl ValueReader {
    pub fn new(table: &'static str, values: Vec<Value>) -> Self {
        Self {
            table,
            position: 0,
            values: values.into_iter(),
        }
    }

    pub fn for_entity<T: Entity>(values: Vec<Value>) -> Self {
        Self::new(T::TABLE, values)
    }

    /// Decodes the next value with rusqlite's `FromSql` rules.
    pub fn next<V: FromSql>(&mut self) -> DbResult<V> {
        let position = self.position;
        self.position += 1;
        let value = self.values.next().ok_or_else(|| {
            DbError::InvalidData(format!(
                "missing value at position {position} for {}",
                self.table
            ))
        })?;
        V::column_result(ValueRef::from(&value)).map_err(|err| {
            DbError::InvalidData(format!(
                "cannot decode position {position} of {}: {err}",
                self.table
            ))
        })
    }
}
