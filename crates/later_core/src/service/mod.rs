//! Count use-case services.
//!
//! # Responsibility
//! - Pair item mutations with count adjustments (`mutation_gateway`).
//! - Repair drifted counts (`reconciler`).
//! - Expose one facade to FFI/CLI callers (`count_service`).

pub mod count_service;
pub mod error;
pub mod events;
pub mod mutation_gateway;
pub mod reconciler;
