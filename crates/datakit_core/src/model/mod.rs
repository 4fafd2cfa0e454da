//! Compile-time entity mapping and query conditions.
//!
//! # Responsibility
//! - Describe how an entity type maps onto a table (`Entity`).
//! - Carry inline query conditions from callers to the backend (`Condition`).
//!
//! # Invariants
//! - Entity values cross the backend boundary as `rusqlite::types::Value`
//!   lists ordered exactly like `Entity::COLUMNS`.

pub mod condition;
pub mod entity;
