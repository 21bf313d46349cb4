//! Mutation gateway: the only path that creates, deletes or moves items.
//!
//! # Responsibility
//! - Pair every successful item write with exactly one count adjustment.
//! - Surface primary write failures; downgrade adjustment failures to
//!   desync journal events.
//!
//! # Invariants
//! - The item write and its count adjustment run under the space's
//!   `CountPermit`, so adjustments apply in the order writes were issued.
//! - The item write completes before the adjustment is attempted.
//! - Once started, a mutation runs to completion even if the caller stops
//!   waiting for it.

use crate::cache::count_cache::{CountCache, CountPermit, DecrementOutcome};
use crate::model::item::{Item, ItemPayload};
use crate::model::{ContainerId, ItemId};
use crate::repo::item_repo::ItemStore;
use crate::service::error::{CountError, CountResult};
use crate::service::events::{CountOperation, DesyncEvent, DesyncJournal};
use log::{error, info};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

const MAX_LOCK_ATTEMPTS: usize = 3;

/// Serialized entry point for item mutations.
#[derive(Clone)]
pub struct MutationGateway {
    items: Arc<dyn ItemStore>,
    cache: Arc<CountCache>,
    journal: Arc<DesyncJournal>,
}

impl MutationGateway {
    pub fn new(
        items: Arc<dyn ItemStore>,
        cache: Arc<CountCache>,
        journal: Arc<DesyncJournal>,
    ) -> Self {
        Self {
            items,
            cache,
            journal,
        }
    }

    /// Creates an item in `container_id` and bumps the space's count.
    ///
    /// # Errors
    /// - `InvalidPayload` for a blank title.
    /// - `ContainerNotFound` when the space does not exist.
    /// - `StoreUnavailable` when the item could not be written.
    pub async fn create_item(
        &self,
        container_id: ContainerId,
        payload: ItemPayload,
    ) -> CountResult<Item> {
        let gateway = self.clone();
        run_detached("item_create", async move {
            gateway.create_item_locked(container_id, payload).await
        })
        .await
    }

    /// Deletes an item and lowers its space's count, flooring at zero.
    pub async fn delete_item(&self, item_id: ItemId) -> CountResult<()> {
        let gateway = self.clone();
        run_detached("item_delete", async move {
            gateway.delete_item_locked(item_id).await
        })
        .await
    }

    /// Moves an item to `target` and shifts one count from source to target.
    ///
    /// Moving an item into the space it already belongs to is a no-op.
    pub async fn move_item(&self, item_id: ItemId, target: ContainerId) -> CountResult<Item> {
        let gateway = self.clone();
        run_detached("item_move", async move {
            gateway.move_item_locked(item_id, target).await
        })
        .await
    }

    async fn create_item_locked(
        &self,
        container_id: ContainerId,
        payload: ItemPayload,
    ) -> CountResult<Item> {
        let started_at = Instant::now();
        let item = Item::new(container_id, payload)?;
        let permit = self.cache.lock(container_id).await;

        self.cache.get(container_id).await?;
        let stored = self.items.create(&item).await?;

        if let Err(err) = self.cache.increment(&permit).await {
            self.journal.record(DesyncEvent::cache_adjust_failed(
                container_id,
                stored.id,
                CountOperation::Increment,
                err.to_string(),
            ));
        }

        info!(
            "event=item_create module=gateway status=ok space_id={container_id} item_id={} kind={} duration_ms={}",
            stored.id,
            stored.kind.as_str(),
            started_at.elapsed().as_millis()
        );
        Ok(stored)
    }

    async fn delete_item_locked(&self, item_id: ItemId) -> CountResult<()> {
        let started_at = Instant::now();
        let (item, permit) = self.lock_item_space(item_id).await?;

        self.items.delete(item_id).await?;
        self.apply_decrement(&permit, item_id).await;

        info!(
            "event=item_delete module=gateway status=ok space_id={} item_id={item_id} duration_ms={}",
            item.container_id,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    async fn move_item_locked(&self, item_id: ItemId, target: ContainerId) -> CountResult<Item> {
        let started_at = Instant::now();
        for _ in 0..MAX_LOCK_ATTEMPTS {
            let observed = self.load_item(item_id).await?;
            let source = observed.container_id;
            if source == target {
                return Ok(observed);
            }

            let (source_permit, target_permit) = self.lock_pair(source, target).await;
            let current = self.load_item(item_id).await?;
            if current.container_id != source {
                continue;
            }

            self.cache.get(target).await?;
            let moved = self.items.move_to(item_id, target).await?;
            self.apply_decrement(&source_permit, item_id).await;
            if let Err(err) = self.cache.increment(&target_permit).await {
                self.journal.record(DesyncEvent::cache_adjust_failed(
                    target,
                    item_id,
                    CountOperation::Increment,
                    err.to_string(),
                ));
            }

            info!(
                "event=item_move module=gateway status=ok item_id={item_id} from_space_id={source} to_space_id={target} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            return Ok(moved);
        }

        Err(CountError::Interrupted(format!(
            "item {item_id} kept changing space during move"
        )))
    }

    async fn apply_decrement(&self, permit: &CountPermit, item_id: ItemId) {
        let container_id = permit.container_id();
        match self.cache.decrement(permit).await {
            Ok(DecrementOutcome::Decremented { .. }) => {}
            Ok(DecrementOutcome::Clamped) => self
                .journal
                .record(DesyncEvent::floor_clamped(container_id, item_id)),
            Err(err) => self.journal.record(DesyncEvent::cache_adjust_failed(
                container_id,
                item_id,
                CountOperation::Decrement,
                err.to_string(),
            )),
        }
    }

    /// Loads an item and locks its space, re-checking the owner after the
    /// permit is held.
    async fn lock_item_space(&self, item_id: ItemId) -> CountResult<(Item, CountPermit)> {
        for _ in 0..MAX_LOCK_ATTEMPTS {
            let observed = self.load_item(item_id).await?;
            let permit = self.cache.lock(observed.container_id).await;
            let current = self.load_item(item_id).await?;
            if current.container_id == observed.container_id {
                return Ok((current, permit));
            }
        }

        Err(CountError::Interrupted(format!(
            "item {item_id} kept changing space while locking"
        )))
    }

    /// Locks two distinct spaces in id order; returns `(source, target)`.
    async fn lock_pair(
        &self,
        source: ContainerId,
        target: ContainerId,
    ) -> (CountPermit, CountPermit) {
        if source < target {
            let source_permit = self.cache.lock(source).await;
            let target_permit = self.cache.lock(target).await;
            (source_permit, target_permit)
        } else {
            let target_permit = self.cache.lock(target).await;
            let source_permit = self.cache.lock(source).await;
            (source_permit, target_permit)
        }
    }

    async fn load_item(&self, item_id: ItemId) -> CountResult<Item> {
        self.items
            .get(item_id)
            .await?
            .ok_or(CountError::ItemNotFound(item_id))
    }
}

async fn run_detached<T, F>(operation: &'static str, task: F) -> CountResult<T>
where
    T: Send + 'static,
    F: Future<Output = CountResult<T>> + Send + 'static,
{
    tokio::spawn(task).await.map_err(|err| {
        error!("event={operation} module=gateway status=error error_code=task_failed error={err}");
        CountError::Interrupted(err.to_string())
    })?
}
