//! Inline query conditions passed through `find`, `first` and `delete`.
//!
//! # Invariants
//! - Conditions are forwarded unchanged through sessions and repositories;
//!   only the backend interprets them.
//! - Multiple conditions combine with `AND`.

use crate::db::{DbError, DbResult};
use crate::model::entity::{validate_identifier, Entity};
use rusqlite::types::Value;

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Raw SQL fragment with `?` placeholders bound to `args` in order.
    Where { clause: String, args: Vec<Value> },
    /// `column = value`; the column must be one of the entity's columns.
    Eq { column: String, value: Value },
    /// Match on the entity's primary key.
    PrimaryKey(Value),
}

impl Condition {
    pub fn sql(clause: impl Into<String>, args: impl IntoIterator<Item = Value>) -> Self {
        Self::Where {
            clause: clause.into(),
            args: args.into_iter().collect(),
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::Eq {
            column: column.into(),
            value: value.into(),
        }
    }

    pub fn primary_key(value: impl Into<Value>) -> Self {
        Self::PrimaryKey(value.into())
    }
}

/// SQL `WHERE` body and its bound arguments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedFilter {
    pub clause: String,
    pub args: Vec<Value>,
}

impl RenderedFilter {
    pub fn is_empty(&self) -> bool {
        self.clause.is_empty()
    }

    /// Appends one `AND`-joined term.
    pub fn push(&mut self, term: &str, args: impl IntoIterator<Item = Value>) {
        if !self.clause.is_empty() {
            self.clause.push_str(" AND ");
        }
        self.clause.push('(');
        self.clause.push_str(term);
        self.clause.push(')');
        self.args.extend(args);
    }

    /// ` WHERE ...` suffix, or empty when there is nothing to filter on.
    pub fn where_sql(&self) -> String {
        if self.clause.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clause)
        }
    }
}

/// Renders conditions for entity type `T`.
pub fn render<T: Entity>(conditions: &[Condition]) -> DbResult<RenderedFilter> {
    let mut filter = RenderedFilter::default();
    for condition in conditions {
        match condition {
            Condition::Where { clause, args } => filter.push(clause, args.iter().cloned()),
            Condition::Eq { column, value } => {
                let column = known_column::<T>(column)?;
                filter.push(&format!("{column} = ?"), [value.clone()]);
            }
            Condition::PrimaryKey(value) => {
                let key = validate_identifier(T::PRIMARY_KEY)?;
                filter.push(&format!("{key} = ?"), [value.clone()]);
            }
        }
    }
    Ok(filter)
}

fn known_column<T: Entity>(name: &str) -> DbResult<&str> {
    validate_identifier(name)?;
    if T::COLUMNS.iter().any(|column| column.name == name) {
        Ok(name)
    } else {
        Err(DbError::InvalidIdentifier(format!("{}.{name}", T::TABLE)))
    }
}

#[cfg(test)]
mod tests {
    use super::{render, Condition};
    use crate::db::{DbError, DbResult};
    use crate::model::entity::{Column, Entity, ValueReader};
    use rusqlite::types::Value;

    #[derive(Debug, Default)]
    struct Pet {
        id: i64,
        name: String,
    }

    impl Entity for Pet {
        const TABLE: &'static str = "pets";
        const PRIMARY_KEY: &'static str = "id";
        const COLUMNS: &'static [Column] =
            &[Column::new("id", "INTEGER"), Column::new("name", "TEXT")];

        fn to_values(&self) -> Vec<Value> {
            vec![Value::Integer(self.id), Value::Text(self.name.clone())]
        }

        fn from_values(values: Vec<Value>) -> DbResult<Self> {
            let mut reader = ValueReader::for_entity::<Self>(values);
            Ok(Self {
                id: reader.next()?,
                name: reader.next()?,
            })
        }

        fn primary_key(&self) -> Value {
            Value::Integer(self.id)
        }
    }

    #[test]
    fn no_conditions_render_no_where_clause() {
        let filter = render::<Pet>(&[]).unwrap();
        assert!(filter.is_empty());
        assert_eq!(filter.where_sql(), "");
    }

    #[test]
    fn conditions_are_and_joined_in_order() {
        let filter = render::<Pet>(&[
            Condition::sql(
                "name = ? OR name = ?",
                [Value::from("a".to_string()), Value::from("b".to_string())],
            ),
            Condition::eq("id", 3_i64),
            Condition::primary_key(4_i64),
        ])
        .unwrap();

        assert_eq!(
            filter.where_sql(),
            " WHERE (name = ? OR name = ?) AND (id = ?) AND (id = ?)"
        );
        assert_eq!(filter.args.len(), 4);
        assert_eq!(filter.args[2], Value::Integer(3));
    }

    #[derive(Debug, Default)]
    struct BadKey;

    impl Entity for BadKey {
        const TABLE: &'static str = "bad_keys";
        const PRIMARY_KEY: &'static str = "id) OR (1 = 1";
        const COLUMNS: &'static [Column] = &[Column::new("id", "INTEGER")];

        fn to_values(&self) -> Vec<Value> {
            vec![Value::Null]
        }

        fn from_values(_values: Vec<Value>) -> DbResult<Self> {
            Ok(Self)
        }

        fn primary_key(&self) -> Value {
            Value::Null
        }
    }

    #[test]
    fn primary_key_condition_validates_the_key_column() {
        let err = render::<BadKey>(&[Condition::primary_key(1_i64)]).unwrap_err();
        assert!(matches!(err, DbError::InvalidIdentifier(_)));
    }

    #[test]
    fn equality_on_unknown_column_is_rejected() {
        let err = render::<Pet>(&[Condition::eq("owner", 1_i64)]).unwrap_err();
        assert_eq!(err, DbError::InvalidIdentifier("pets.owner".to_string()));
    }
}
