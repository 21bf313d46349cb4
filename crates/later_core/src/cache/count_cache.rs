//! Persisted per-space item counter.
//!
//! # Responsibility
//! - Hold the fast-path aggregate shown to users.
//! - Apply increment/decrement/set as read-modify-write under the space's
//!   permit.
//!
//! # Invariants
//! - Writes happen only through `increment`, `decrement` and `set`, each of
//!   which requires a `CountPermit` for the target space and stores the
//!   value with `ContainerStore::write_count`.
//! - `decrement` floors at zero and reports the clamp instead of failing.
//! - Holding two permits for the same space in one task deadlocks; callers
//!   take each space's permit at most once.

use super::keyed_lock::{KeyedGuard, KeyedLock};
use crate::model::container::Container;
use crate::model::ContainerId;
use crate::repo::container_repo::ContainerStore;
use crate::repo::{StoreError, StoreResult};
use log::{debug, warn};
use std::sync::Arc;

/// Exclusive right to write one space's cached count.
pub struct CountPermit {
    guard: KeyedGuard<ContainerId>,
}

impl CountPermit {
    pub fn container_id(&self) -> ContainerId {
        *self.guard.key()
    }
}

/// Result of a decrement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    /// Count went down by one to `count`.
    Decremented { count: u64 },
    /// Count was already zero and stayed there.
    Clamped,
}

/// Cached item counts keyed by space.
pub struct CountCache {
    containers: Arc<dyn ContainerStore>,
    locks: KeyedLock<ContainerId>,
}

impl CountCache {
    pub fn new(containers: Arc<dyn ContainerStore>) -> Self {
        Self {
            containers,
            locks: KeyedLock::new(),
        }
    }

    /// Waits for exclusive write access to one space's count.
    pub async fn lock(&self, container_id: ContainerId) -> CountPermit {
        CountPermit {
            guard: self.locks.acquire(container_id).await,
        }
    }

    /// Reads the cached count without taking the permit.
    pub async fn get(&self, container_id: ContainerId) -> StoreResult<u64> {
        Ok(self.load(container_id).await?.item_count())
    }

    /// Adds one to the cached count and returns the new value.
    pub async fn increment(&self, permit: &CountPermit) -> StoreResult<u64> {
        let space_id = permit.container_id();
        let next = self.get(space_id).await?.saturating_add(1);
        self.containers.write_count(permit, next).await?;
        debug!("event=count_increment module=cache status=ok space_id={space_id} count={next}");
        Ok(next)
    }

    /// Subtracts one from the cached count, flooring at zero.
    pub async fn decrement(&self, permit: &CountPermit) -> StoreResult<DecrementOutcome> {
        let space_id = permit.container_id();
        let current = self.get(space_id).await?;
        if current == 0 {
            warn!(
                "event=count_decrement module=cache status=warn space_id={space_id} reason=floor_clamp"
            );
            return Ok(DecrementOutcome::Clamped);
        }

        let next = current - 1;
        self.containers.write_count(permit, next).await?;
        debug!("event=count_decrement module=cache status=ok space_id={space_id} count={next}");
        Ok(DecrementOutcome::Decremented { count: next })
    }

    /// Overwrites the cached count and returns the previous value.
    pub async fn set(&self, permit: &CountPermit, value: u64) -> StoreResult<u64> {
        let space_id = permit.container_id();
        let previous = self.get(space_id).await?;
        self.containers.write_count(permit, value).await?;
        debug!(
            "event=count_set module=cache status=ok space_id={space_id} previous={previous} count={value}"
        );
        Ok(previous)
    }

    async fn load(&self, container_id: ContainerId) -> StoreResult<Container> {
        self.containers
            .get(container_id)
            .await?
            .ok_or(StoreError::ContainerNotFound(container_id))
    }
}
