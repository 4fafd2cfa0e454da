//! Session variant that forwards every call to a live backend.

use super::Session;
use crate::backend::sqlite::SqliteBackend;
use crate::backend::{Backend, BackendState};
use crate::context::Context;
use crate::model::condition::Condition;
use crate::model::entity::Entity;

/// Session over a live backend handle.
pub struct LiveSession<B: Backend> {
    inner: B,
}

pub type SqliteSession = LiveSession<SqliteBackend>;

impl<B: Backend> LiveSession<B> {
    pub fn new(backend: B) -> Self {
        Self { inner: backend }
    }

    /// The wrapped backend handle.
    pub fn handle(&self) -> &B {
        &self.inner
    }

    pub fn into_inner(self) -> B {
        self.inner
    }
}

impl<B: Backend> Session for LiveSession<B> {
    fn with_context(&mut self, ctx: &Context) -> &mut Self {
        self.inner.with_context(ctx);
        self
    }

    fn create<T: Entity>(&mut self, value: &mut T) -> &mut Self {
        self.inner.create(value);
        self
    }

    fn find<T: Entity>(&mut self, out: &mut Vec<T>, conditions: &[Condition]) -> &mut Self {
        self.inner.find(out, conditions);
        self
    }

    fn first<T: Entity>(&mut self, out: &mut T, conditions: &[Condition]) -> &mut Self {
        self.inner.first(out, conditions);
        self
    }

    fn save<T: Entity>(&mut self, value: &mut T) -> &mut Self {
        self.inner.save(value);
        self
    }

    fn delete<T: Entity>(&mut self, value: &T, conditions: &[Condition]) -> &mut Self {
        self.inner.delete(value, conditions);
        self
    }

    fn begin(&mut self) -> Self {
        Self {
            inner: self.inner.begin(),
        }
    }

    fn commit(&mut self) -> &mut Self {
        self.inner.commit();
        self
    }

    fn rollback(&mut self) -> &mut Self {
        self.inner.rollback();
        self
    }

    fn backend(&self) -> &BackendState {
        self.inner.state()
    }
}
