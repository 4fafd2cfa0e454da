//! Typed repository layer.
//!
//! # Responsibility
//! - Bind one entity type to a session and expose create/find/first/save/delete.
//! - Surface the session's error slot as each call's return value.
//!
//! # Invariants
//! - Every repository call is one round-trip: apply the context, forward once,
//!   read the slot. No retries, no error translation.

pub mod entity_repo;
