//! Cached per-space item counts.
//!
//! # Responsibility
//! - Serialize count writes per space without a global lock.
//! - Keep the cached count persisted alongside space metadata.
//!
//! # Invariants
//! - Count writes require a `CountPermit` for the target space.
//! - A cached count never goes below zero.

pub mod count_cache;
pub mod keyed_lock;
