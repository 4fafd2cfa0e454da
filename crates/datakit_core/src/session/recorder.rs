//! Call recorder and the session variant that uses it.
//!
//! # Responsibility
//! - Record every session call with its arguments.
//! - Answer each call with the result programmed on the first matching
//!   expectation, without touching any store.
//! - Verify afterwards that the programmed expectations were met.
//!
//! # Invariants
//! - A `RecordingSession` performs no I/O.
//! - All sessions derived from one recorder (transaction handles included)
//!   share its expectations and call log.
//! - A call without a matching expectation is logged as unexpected and
//!   answered with `DbError::UnexpectedCall`.

use super::{Method, Session};
use crate::backend::BackendState;
use crate::context::Context;
use crate::db::DbError;
use crate::model::condition::Condition;
use crate::model::entity::Entity;
use log::{debug, warn};
use rusqlite::types::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Argument captured from a session call.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Context(Context),
    /// Snapshot of an entity passed by value or reference.
    Entity {
        table: &'static str,
        values: Vec<Value>,
    },
    /// Output destination of `find`/`first`.
    Output { table: &'static str },
    Conditions(Vec<Condition>),
}

impl Arg {
    pub fn entity<T: Entity>(value: &T) -> Self {
        Self::Entity {
            table: T::TABLE,
            values: value.to_values(),
        }
    }

    pub fn output<T: Entity>() -> Self {
        Self::Output { table: T::TABLE }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ArgMatcher {
    Any,
    Exactly(Arg),
}

impl ArgMatcher {
    fn matches(&self, arg: &Arg) -> bool {
        match self {
            Self::Any => true,
            Self::Exactly(expected) => expected == arg,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedCall {
    pub method: Method,
    pub args: Vec<Arg>,
}

#[derive(Debug, Clone, Default)]
struct Reply {
    error: Option<DbError>,
    rows_affected: u64,
    rows: Option<Vec<Vec<Value>>>,
}

#[derive(Debug)]
struct ExpectationSpec {
    method: Method,
    args: Option<Vec<ArgMatcher>>,
    limit: Option<usize>,
    reply: Reply,
    calls: usize,
}

impl ExpectationSpec {
    fn accepts(&self, call: &RecordedCall) -> bool {
        if self.method != call.method {
            return false;
        }
        if self.limit.is_some_and(|limit| self.calls >= limit) {
            return false;
        }
        match &self.args {
            None => true,
            Some(matchers) => {
                matchers.len() == call.args.len()
                    && matchers
                        .iter()
                        .zip(&call.args)
                        .all(|(matcher, arg)| matcher.matches(arg))
            }
        }
    }
}

#[derive(Debug, Default)]
struct RecorderState {
    expectations: Vec<ExpectationSpec>,
    calls: Vec<RecordedCall>,
    unexpected: Vec<RecordedCall>,
}

/// Shared expectation table and call log.
#[derive(Debug, Clone, Default)]
pub struct CallRecorder {
    state: Arc<Mutex<RecorderState>>,
}

impl CallRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an expectation for `method`.
    ///
    /// Without further configuration it accepts any arguments, any number of
    /// times, and answers with success.
    pub fn expect(&self, method: Method) -> Expectation {
        let mut state = self.lock();
        state.expectations.push(ExpectationSpec {
            method,
            args: None,
            limit: None,
            reply: Reply::default(),
            calls: 0,
        });
        Expectation {
            recorder: self.clone(),
            index: state.expectations.len() - 1,
        }
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    pub fn call_count(&self, method: Method) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.method == method)
            .count()
    }

    /// Drops every expectation and recorded call.
    pub fn reset(&self) {
        *self.lock() = RecorderState::default();
    }

    /// Checks call counts against expectations.
    ///
    /// # Errors
    /// - An expectation limited with `once()`/`times(n)` was not called
    ///   exactly that many times.
    /// - An unlimited expectation was never called.
    /// - Any call had no matching expectation.
    pub fn assert_expectations(&self) -> Result<(), String> {
        let state = self.lock();
        let mut failures = Vec::new();

        for expectation in &state.expectations {
            match expectation.limit {
                Some(limit) if expectation.calls != limit => failures.push(format!(
                    "expected `{}` to be called {limit} time(s), got {}",
                    expectation.method, expectation.calls
                )),
                None if expectation.calls == 0 => failures.push(format!(
                    "expected `{}` to be called at least once",
                    expectation.method
                )),
                _ => {}
            }
        }
        for call in &state.unexpected {
            failures.push(format!("unexpected call to `{}`", call.method));
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(failures.join("; "))
        }
    }

    fn dispatch(&self, call: RecordedCall) -> Reply {
        let mut state = self.lock();
        state.calls.push(call.clone());

        let matched = state
            .expectations
            .iter_mut()
            .find(|expectation| expectation.accepts(&call));
        if let Some(expectation) = matched {
            expectation.calls += 1;
            debug!(
                "event=recorded_call module=recorder status=ok method={}",
                call.method
            );
            return expectation.reply.clone();
        }

        warn!(
            "event=recorded_call module=recorder status=unexpected method={}",
            call.method
        );
        let method = call.method;
        state.unexpected.push(call);
        Reply {
            error: Some(DbError::UnexpectedCall(method)),
            ..Reply::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, RecorderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for one registered expectation.
pub struct Expectation {
    recorder: CallRecorder,
    index: usize,
}

impl Expectation {
    /// Restricts the expectation to calls whose arguments match one to one.
    pub fn with_args(self, matchers: Vec<ArgMatcher>) -> Self {
        self.update(|spec| spec.args = Some(matchers))
    }

    pub fn once(self) -> Self {
        self.times(1)
    }

    pub fn times(self, count: usize) -> Self {
        self.update(|spec| spec.limit = Some(count))
    }

    /// Leaves `error` in the session's slot after the call.
    pub fn fails_with(self, error: DbError) -> Self {
        self.update(|spec| spec.reply.error = Some(error))
    }

    pub fn rows_affected(self, rows: u64) -> Self {
        self.update(|spec| spec.reply.rows_affected = rows)
    }

    /// Rows decoded into the output of `find` or `first`, in `COLUMNS` order.
    pub fn returning_rows(self, rows: Vec<Vec<Value>>) -> Self {
        self.update(|spec| spec.reply.rows = Some(rows))
    }

    fn update(self, apply: impl FnOnce(&mut ExpectationSpec)) -> Self {
        if let Some(spec) = self.recorder.lock().expectations.get_mut(self.index) {
            apply(spec);
        }
        self
    }
}

/// Session variant answering from a `CallRecorder`.
pub struct RecordingSession {
    recorder: CallRecorder,
    state: BackendState,
}

impl RecordingSession {
    pub fn new(recorder: CallRecorder) -> Self {
        Self {
            recorder,
            state: BackendState::default(),
        }
    }

    pub fn recorder(&self) -> &CallRecorder {
        &self.recorder
    }

    fn record(&mut self, method: Method, args: Vec<Arg>) -> Option<Vec<Vec<Value>>> {
        let reply = self.recorder.dispatch(RecordedCall { method, args });
        self.state = BackendState {
            error: reply.error,
            rows_affected: reply.rows_affected,
        };
        if self.state.error.is_some() {
            return None;
        }
        reply.rows
    }
}

impl Session for RecordingSession {
    fn with_context(&mut self, ctx: &Context) -> &mut Self {
        self.record(Method::WithContext, vec![Arg::Context(ctx.clone())]);
        self
    }

    fn create<T: Entity>(&mut self, value: &mut T) -> &mut Self {
        self.record(Method::Create, vec![Arg::entity(value)]);
        self
    }

    fn find<T: Entity>(&mut self, out: &mut Vec<T>, conditions: &[Condition]) -> &mut Self {
        out.clear();
        let args = vec![Arg::output::<T>(), Arg::Conditions(conditions.to_vec())];
        if let Some(rows) = self.record(Method::Find, args) {
            for row in rows {
                match T::from_values(row) {
                    Ok(value) => out.push(value),
                    Err(err) => {
                        self.state = BackendState::failed(err);
                        break;
                    }
                }
            }
        }
        self
    }

    fn first<T: Entity>(&mut self, out: &mut T, conditions: &[Condition]) -> &mut Self {
        let args = vec![Arg::output::<T>(), Arg::Conditions(conditions.to_vec())];
        if let Some(rows) = self.record(Method::First, args) {
            match rows.into_iter().next().map(T::from_values) {
                Some(Ok(value)) => *out = value,
                Some(Err(err)) => self.state = BackendState::failed(err),
                None => self.state = BackendState::failed(DbError::RecordNotFound),
            }
        }
        self
    }

    fn save<T: Entity>(&mut self, value: &mut T) -> &mut Self {
        self.record(Method::Save, vec![Arg::entity(value)]);
        self
    }

    fn delete<T: Entity>(&mut self, value: &T, conditions: &[Condition]) -> &mut Self {
        self.record(
            Method::Delete,
            vec![Arg::entity(value), Arg::Conditions(conditions.to_vec())],
        );
        self
    }

    fn begin(&mut self) -> Self {
        let mut handle = Self::new(self.recorder.clone());
        handle.record(Method::Begin, Vec::new());
        handle
    }

    fn commit(&mut self) -> &mut Self {
        self.record(Method::Commit, Vec::new());
        self
    }

    fn rollback(&mut self) -> &mut Self {
        self.record(Method::Rollback, Vec::new());
        self
    }

    fn backend(&self) -> &BackendState {
        &self.state
    }
}
