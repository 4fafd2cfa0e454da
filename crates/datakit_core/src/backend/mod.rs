//! Backend contract consumed by live sessions.
//!
//! # Responsibility
//! - Define the record-level operations a relational store must offer.
//! - Define `BackendState`, the per-handle error slot.
//!
//! # Invariants
//! - Operations never return errors directly; each one overwrites
//!   `state()` with its own outcome, so the slot always reflects the most
//!   recent call and nothing earlier.
//! - `begin()` yields a new handle of the same type scoped to the transaction.

use crate::context::Context;
use crate::db::{DbError, DbResult};
use crate::model::condition::Condition;
use crate::model::entity::Entity;

pub mod sqlite;

/// Outcome of the most recent operation on a handle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendState {
    pub error: Option<DbError>,
    pub rows_affected: u64,
}

impl BackendState {
    pub fn failed(error: DbError) -> Self {
        Self {
            error: Some(error),
            rows_affected: 0,
        }
    }

    /// The slot as a `Result`, cloning the stored error.
    pub fn result(&self) -> DbResult<()> {
        match &self.error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    /// Replaces the slot with `outcome`.
    pub fn record(&mut self, outcome: DbResult<u64>) {
        *self = match outcome {
            Ok(rows_affected) => Self {
                error: None,
                rows_affected,
            },
            Err(err) => Self::failed(err),
        };
    }
}

/// Record-level operations of a relational store.
///
/// Every call is synchronous and honors the context installed by
/// `with_context` as far as the store can.
pub trait Backend: Sized {
    fn with_context(&mut self, ctx: &Context);
    fn create<T: Entity>(&mut self, value: &mut T);
    fn find<T: Entity>(&mut self, out: &mut Vec<T>, conditions: &[Condition]);
    fn first<T: Entity>(&mut self, out: &mut T, conditions: &[Condition]);
    /// Upsert by primary key.
    fn save<T: Entity>(&mut self, value: &mut T);
    fn delete<T: Entity>(&mut self, value: &T, conditions: &[Condition]);
    fn begin(&mut self) -> Self;
    fn commit(&mut self);
    fn rollback(&mut self);
    fn state(&self) -> &BackendState;
}
