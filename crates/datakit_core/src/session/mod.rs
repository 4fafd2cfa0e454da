//! Dual-mode delegating session.
//!
//! # Responsibility
//! - Present one chained, entity-generic surface for data access.
//! - Provide two interchangeable implementations: `LiveSession`, which
//!   forwards to a `Backend`, and `RecordingSession`, which records calls
//!   against a `CallRecorder` and returns programmed results.
//! - Layer the begin/commit/rollback protocol on top (`Session::transaction`).
//!
//! # Invariants
//! - A session never raises errors itself. After each call the outcome is
//!   read from `backend().error`.
//! - Chained calls mutate the session in place and return it, so
//!   `session.with_context(&ctx).create(&mut v).backend()` sees the outcome
//!   of `create`.
//! - Calling code is written once against `Session` and never branches on
//!   which implementation it holds.

use crate::backend::BackendState;
use crate::context::Context;
use crate::db::DbError;
use crate::model::condition::Condition;
use crate::model::entity::Entity;
use std::fmt::{Display, Formatter};

mod live;
pub mod recorder;
mod transaction;

pub use live::{LiveSession, SqliteSession};
pub use recorder::{Arg, ArgMatcher, CallRecorder, Expectation, RecordedCall, RecordingSession};

/// Names of the session operations, as seen by the call recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    WithContext,
    Create,
    Find,
    First,
    Save,
    Delete,
    Begin,
    Commit,
    Rollback,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::WithContext => "with_context",
            Self::Create => "create",
            Self::Find => "find",
            Self::First => "first",
            Self::Save => "save",
            Self::Delete => "delete",
            Self::Begin => "begin",
            Self::Commit => "commit",
            Self::Rollback => "rollback",
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Chained data-access session.
///
/// Sessions are not meant to be shared between concurrent operations; each
/// caller holds its own session or transaction handle.
pub trait Session: Sized {
    fn with_context(&mut self, ctx: &Context) -> &mut Self;

    fn create<T: Entity>(&mut self, value: &mut T) -> &mut Self;

    /// Replaces `out` with every row matching all `conditions`.
    fn find<T: Entity>(&mut self, out: &mut Vec<T>, conditions: &[Condition]) -> &mut Self;

    /// Loads the first row by primary key order; no match is `RecordNotFound`.
    fn first<T: Entity>(&mut self, out: &mut T, conditions: &[Condition]) -> &mut Self;

    fn save<T: Entity>(&mut self, value: &mut T) -> &mut Self;

    fn delete<T: Entity>(&mut self, value: &T, conditions: &[Condition]) -> &mut Self;

    /// Opens a transaction and returns the handle scoped to it.
    ///
    /// A failure to open is reported in the returned handle's slot.
    fn begin(&mut self) -> Self;

    fn commit(&mut self) -> &mut Self;

    fn rollback(&mut self) -> &mut Self;

    /// Outcome of the most recent call on this session.
    fn backend(&self) -> &BackendState;

    /// Runs `f` inside a transaction.
    ///
    /// # Contract
    /// - If `begin()` fails, its error is returned and `f` never runs.
    /// - If `f` fails, the transaction is rolled back once and `f`'s error is
    ///   returned unchanged.
    /// - If `f` succeeds, the transaction is committed once; a commit failure
    ///   is returned, otherwise `f`'s value.
    /// - Exactly one of commit and rollback runs per successful `begin()`.
    ///
    /// `f` must turn a failed operation into an `Err`; an error left only in
    /// the handle's slot does not stop the commit.
    fn transaction<R, E, F>(&mut self, f: F) -> Result<R, E>
    where
        F: FnOnce(&mut Self) -> Result<R, E>,
        E: From<DbError>,
    {
        transaction::run(self, f)
    }
}
