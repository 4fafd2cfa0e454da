//! Entity repository contract and its session-backed implementation.
//!
//! # Responsibility
//! - Translate entity-shaped calls into session calls.
//! - Keep callers independent of whether the session is live or recorded.
//!
//! # Invariants
//! - Errors are the session slot's error, returned verbatim.
//! - `find` on an empty match is `Ok(vec![])`, while `first` on an empty
//!   match is `Err(DbError::RecordNotFound)`.

use crate::context::Context;
use crate::db::DbResult;
use crate::model::condition::Condition;
use crate::model::entity::Entity;
use crate::session::Session;
use std::marker::PhantomData;

/// Repository interface for one entity type.
pub trait Repository<T> {
    fn create(&mut self, ctx: &Context, obj: T) -> DbResult<()>;
    fn find(&mut self, ctx: &Context, conditions: &[Condition]) -> DbResult<Vec<T>>;
    fn first(&mut self, ctx: &Context, conditions: &[Condition]) -> DbResult<T>;
    fn save(&mut self, ctx: &Context, obj: T) -> DbResult<()>;
    fn delete(&mut self, ctx: &Context, obj: T) -> DbResult<()>;
}

/// Repository over a borrowed session.
///
/// Holds nothing but the session reference; entity values stay owned by
/// the caller.
pub struct SessionRepository<'s, T, S> {
    session: &'s mut S,
    _entity: PhantomData<fn() -> T>,
}

impl<'s, T: Entity, S: Session> SessionRepository<'s, T, S> {
    pub fn new(session: &'s mut S) -> Self {
        Self {
            session,
            _entity: PhantomData,
        }
    }

    pub fn session(&mut self) -> &mut S {
        self.session
    }

    /// Like `find`, but leaves whatever was loaded in `out` when it fails.
    pub fn find_into(
        &mut self,
        ctx: &Context,
        out: &mut Vec<T>,
        conditions: &[Condition],
    ) -> DbResult<()> {
        self.session
            .with_context(ctx)
            .find(out, conditions)
            .backend()
            .result()
    }
}

impl<T: Entity, S: Session> Repository<T> for SessionRepository<'_, T, S> {
    fn create(&mut self, ctx: &Context, mut obj: T) -> DbResult<()> {
        self.session
            .with_context(ctx)
            .create(&mut obj)
            .backend()
            .result()
    }

    fn find(&mut self, ctx: &Context, conditions: &[Condition]) -> DbResult<Vec<T>> {
        let mut results = Vec::new();
        self.find_into(ctx, &mut results, conditions)?;
        Ok(results)
    }

    fn first(&mut self, ctx: &Context, conditions: &[Condition]) -> DbResult<T> {
        let mut result = T::default();
        self.session
            .with_context(ctx)
            .first(&mut result, conditions)
            .backend()
            .result()?;
        Ok(result)
    }

    fn save(&mut self, ctx: &Context, mut obj: T) -> DbResult<()> {
        self.session
            .with_context(ctx)
            .save(&mut obj)
            .backend()
            .result()
    }

    fn delete(&mut self, ctx: &Context, obj: T) -> DbResult<()> {
        self.session
            .with_context(ctx)
            .delete(&obj, &[])
            .backend()
            .result()
    }
}
