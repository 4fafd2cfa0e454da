//! SQLite connection bootstrap and the uniform error type.
//!
//! # Responsibility
//! - Open and configure SQLite connections used by the live backend.
//! - Define `DbError`, the single error type surfaced by sessions,
//!   transactions and repositories.
//!
//! # Invariants
//! - `DbError` is `Clone + PartialEq` so a recorded error can be handed out
//!   repeatedly and compared against the value a caller receives.
//! - Errors are never reclassified on their way up; the variant produced by
//!   the backend is the variant the caller sees.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

mod open;

pub use open::{open_db, open_db_in_memory, BackendConfig};

use crate::session::Method;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug, Clone, PartialEq)]
pub enum DbError {
    /// Failure reported by the SQLite engine.
    Sqlite(Arc<rusqlite::Error>),
    /// `first` matched no row.
    RecordNotFound,
    /// `delete` without a primary key and without conditions.
    MissingWhereClause,
    /// Commit or rollback on a handle that is not an active transaction.
    InvalidTransaction,
    /// `begin` on a non-transaction handle while another handle holds an
    /// open transaction on the same connection.
    TransactionBusy,
    DeadlineExceeded,
    Cancelled,
    /// Table or column name that is not a plain SQL identifier.
    InvalidIdentifier(String),
    /// A stored value could not be converted into the entity field.
    InvalidData(String),
    /// The call recorder received a call it had no expectation for.
    UnexpectedCall(Method),
    Other(String),
}

impl DbError {
    /// Builds a free-form error, mostly useful for programming test doubles.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound)
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::RecordNotFound => write!(f, "record not found"),
            Self::MissingWhereClause => {
                write!(f, "delete requires a primary key or at least one condition")
            }
            Self::InvalidTransaction => write!(f, "handle is not an active transaction"),
            Self::TransactionBusy => {
                write!(f, "another transaction is already open on this connection")
            }
            Self::DeadlineExceeded => write!(f, "context deadline exceeded"),
            Self::Cancelled => write!(f, "context cancelled"),
            Self::InvalidIdentifier(name) => write!(f, "invalid sql identifier `{name}`"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::UnexpectedCall(method) => write!(f, "unexpected call to `{method}`"),
            Self::Other(message) => write!(f, "{message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(Arc::new(value))
    }
}
