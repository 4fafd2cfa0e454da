//! Typed repositories over a swappable data-access session.
//!
//! Call sites are written once against [`Session`] and [`Repository`]; the
//! session is either a [`LiveSession`] forwarding to a relational backend
//! or a [`RecordingSession`] answering from a [`CallRecorder`] in tests.

pub mod backend;
pub mod context;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod session;

pub use backend::sqlite::SqliteBackend;
pub use backend::{Backend, BackendState};
pub use context::{CancelHandle, Context};
pub use db::{BackendConfig, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::condition::Condition;
pub use model::entity::{is_zero_key, Column, Entity, ValueReader};
pub use repo::entity_repo::{Repository, SessionRepository};
pub use session::{
    Arg, ArgMatcher, CallRecorder, Expectation, LiveSession, Method, RecordedCall,
    RecordingSession, Session, SqliteSession,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
