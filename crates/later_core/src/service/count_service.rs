//! Facade over spaces, items, cached counts and reconciliation.
//!
//! # Responsibility
//! - Wire stores, count cache, gateway and reconciler together.
//! - Apply the configured reconciliation triggers (on view, startup sweep).
//!
//! # Invariants
//! - Item mutations only go through the mutation gateway.
//! - `get_count` returns the cached value, which may be stale.
//! - The startup sweep runs at most once per service instance.

use crate::cache::count_cache::CountCache;
use crate::config::ReconcileConfig;
use crate::db::{open_db, open_db_in_memory};
use crate::model::container::Container;
use crate::model::item::{Item, ItemKind, ItemPayload};
use crate::model::{ContainerId, ItemId};
use crate::repo::container_repo::{ContainerStore, SqliteContainerStore};
use crate::repo::item_repo::{ItemStore, SqliteItemStore};
use crate::repo::{share_connection, StoreError};
use crate::service::error::{CountError, CountResult};
use crate::service::events::{DesyncEvent, DesyncJournal};
use crate::service::mutation_gateway::MutationGateway;
use crate::service::reconciler::{ReconciliationResult, Reconciler};
use log::info;
use rusqlite::Connection;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Application-facing entry point for space item counts.
pub struct CountService {
    items: Arc<dyn ItemStore>,
    containers: Arc<dyn ContainerStore>,
    cache: Arc<CountCache>,
    gateway: MutationGateway,
    reconciler: Reconciler,
    journal: Arc<DesyncJournal>,
    config: ReconcileConfig,
    startup_swept: AtomicBool,
}

impl CountService {
    /// Builds a service over the given stores.
    pub fn new(
        items: Arc<dyn ItemStore>,
        containers: Arc<dyn ContainerStore>,
        config: ReconcileConfig,
    ) -> Self {
        let journal = Arc::new(DesyncJournal::new(config.journal_capacity));
        let cache = Arc::new(CountCache::new(Arc::clone(&containers)));
        let gateway = MutationGateway::new(
            Arc::clone(&items),
            Arc::clone(&cache),
            Arc::clone(&journal),
        );
        let reconciler = Reconciler::new(
            Arc::clone(&items),
            Arc::clone(&containers),
            Arc::clone(&cache),
            Arc::clone(&journal),
            config.clone(),
        );

        Self {
            items,
            containers,
            cache,
            gateway,
            reconciler,
            journal,
            config,
            startup_swept: AtomicBool::new(false),
        }
    }

    /// Opens (and migrates) a SQLite database file.
    pub fn open_sqlite(path: impl AsRef<Path>, config: ReconcileConfig) -> CountResult<Self> {
        let conn = open_db(path).map_err(StoreError::from)?;
        Self::from_connection(conn, config)
    }

    /// Opens a private in-memory SQLite database.
    pub fn open_sqlite_in_memory(config: ReconcileConfig) -> CountResult<Self> {
        let conn = open_db_in_memory().map_err(StoreError::from)?;
        Self::from_connection(conn, config)
    }

    /// Builds SQLite stores over an already migrated connection.
    pub fn from_connection(conn: Connection, config: ReconcileConfig) -> CountResult<Self> {
        let shared = share_connection(conn);
        let items = SqliteItemStore::try_new(Arc::clone(&shared))?;
        let containers = SqliteContainerStore::try_new(shared)?;
        Ok(Self::new(Arc::new(items), Arc::new(containers), config))
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Creates an empty space.
    pub async fn create_container(
        &self,
        name: impl Into<String>,
        icon: Option<String>,
    ) -> CountResult<Container> {
        let container = Container::new(name, icon)?;
        self.containers.create(&container).await?;
        info!(
            "event=space_create module=service status=ok space_id={}",
            container.id
        );
        Ok(container)
    }

    /// Renames a space; its cached count is left as stored.
    pub async fn rename_container(
        &self,
        container_id: ContainerId,
        name: impl Into<String>,
        icon: Option<String>,
    ) -> CountResult<Container> {
        let mut container = self.get_container(container_id).await?;
        container.rename(name, icon)?;
        self.containers.update(&container).await?;
        info!("event=space_rename module=service status=ok space_id={container_id}");
        self.get_container(container_id).await
    }

    /// Loads a space as stored, without reconciling.
    pub async fn get_container(&self, container_id: ContainerId) -> CountResult<Container> {
        self.containers
            .get(container_id)
            .await?
            .ok_or(CountError::ContainerNotFound(container_id))
    }

    /// Loads a space for display, reconciling it first when configured.
    pub async fn container_detail(&self, container_id: ContainerId) -> CountResult<Container> {
        if self.config.reconcile_on_view {
            self.reconciler.reconcile(container_id).await?;
        }
        self.get_container(container_id).await
    }

    /// Lists every space, oldest first; ties keep insertion order.
    pub async fn list_containers(&self) -> CountResult<Vec<Container>> {
        let mut spaces = Vec::new();
        for id in self.containers.list_ids().await? {
            if let Some(space) = self.containers.get(id).await? {
                spaces.push(space);
            }
        }
        Ok(spaces)
    }

    pub async fn create_item(
        &self,
        container_id: ContainerId,
        payload: ItemPayload,
    ) -> CountResult<Item> {
        self.gateway.create_item(container_id, payload).await
    }

    pub async fn delete_item(&self, item_id: ItemId) -> CountResult<()> {
        self.gateway.delete_item(item_id).await
    }

    pub async fn move_item(&self, item_id: ItemId, target: ContainerId) -> CountResult<Item> {
        self.gateway.move_item(item_id, target).await
    }

    /// Cached item count for a space; may be stale until reconciled.
    pub async fn get_count(&self, container_id: ContainerId) -> CountResult<u64> {
        Ok(self.cache.get(container_id).await?)
    }

    /// Authoritative item count from the item store, optionally per kind.
    pub async fn count_items(
        &self,
        container_id: ContainerId,
        kind: Option<ItemKind>,
    ) -> CountResult<u64> {
        self.get_container(container_id).await?;
        Ok(self.items.count_by(container_id, kind).await?)
    }

    pub async fn list_items(&self, container_id: ContainerId) -> CountResult<Vec<Item>> {
        self.get_container(container_id).await?;
        Ok(self.items.list_by(container_id).await?)
    }

    pub async fn reconcile(&self, container_id: ContainerId) -> CountResult<ReconciliationResult> {
        self.reconciler.reconcile(container_id).await
    }

    pub async fn reconcile_all(&self) -> Vec<ReconciliationResult> {
        self.reconciler.reconcile_all().await
    }

    /// Runs the once-per-session sweep.
    ///
    /// Returns `None` when the sweep is disabled or has already run.
    pub async fn run_startup_sweep(&self) -> Option<Vec<ReconciliationResult>> {
        if !self.config.startup_sweep || self.startup_swept.swap(true, Ordering::AcqRel) {
            return None;
        }
        Some(self.reconciler.reconcile_all().await)
    }

    /// Retained desync events, oldest first.
    pub fn recent_events(&self) -> Vec<DesyncEvent> {
        self.journal.snapshot()
    }

    /// Removes and returns retained desync events.
    pub fn drain_events(&self) -> Vec<DesyncEvent> {
        self.journal.drain()
    }
}
