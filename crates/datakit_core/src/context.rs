//! Deadline and cancellation carried into every data-access call.
//!
//! # Invariants
//! - A `Context` never enforces anything by itself; backends call
//!   [`Context::check`] before doing work and clamp their own waits with
//!   [`Context::remaining`].
//! - Clones share the same cancellation flags.
//! - Derived contexts keep every parent flag: cancelling a parent cancels
//!   all contexts derived from it.

use crate::db::{DbError, DbResult};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct Context {
    deadline: Option<Instant>,
    cancelled: Vec<Arc<AtomicBool>>,
}

/// Handle that cancels every clone of the context it was created with.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }
}

impl Context {
    /// Context without deadline or cancellation.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        });
        self
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Returns a cancellable copy of this context and the handle cancelling it.
    ///
    /// The copy still observes any cancellation inherited from `self`.
    pub fn with_cancel(mut self) -> (Self, CancelHandle) {
        let flag = Arc::new(AtomicBool::new(false));
        self.cancelled.push(Arc::clone(&flag));
        (self, CancelHandle { flag })
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline, `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
            .iter()
            .any(|flag| flag.load(Ordering::SeqCst))
    }

    /// Fails with `Cancelled` or `DeadlineExceeded` when work must not start.
    pub fn check(&self) -> DbResult<()> {
        if self.is_cancelled() {
            return Err(DbError::Cancelled);
        }
        match self.remaining() {
            Some(left) if left.is_zero() => Err(DbError::DeadlineExceeded),
            _ => Ok(()),
        }
    }
}

// Two contexts are equal when they carry the same deadline and share the same
// cancellation flags.
impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline
            && self.cancelled.len() == other.cancelled.len()
            && self
                .cancelled
                .iter()
                .zip(&other.cancelled)
                .all(|(left, right)| Arc::ptr_eq(left, right))
    }
}
