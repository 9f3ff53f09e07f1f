//! Board domain model.
//!
//! # Responsibility
//! - Define engram and vote shapes shared by every storage backend.
//!
//! # Invariants
//! - Every engram is identified by a stable `EngramId`.
//! - Vote state is scoped to one device identifier.

pub mod engram;
pub mod vote;
