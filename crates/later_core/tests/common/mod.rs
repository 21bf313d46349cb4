#![allow(dead_code)]

use async_trait::async_trait;
use later_core::db::open_db_in_memory;
use later_core::{
    share_connection, Container, ContainerId, ContainerStore, CountPermit, CountService, Item,
    ItemId,
    ItemKind, ItemPayload, ItemStore, ReconcileConfig, SharedConnection, SqliteContainerStore,
    SqliteItemStore, StoreError, StoreResult,
};
use rusqlite::params;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

/// Service over SQLite stores wrapped with switchable failures.
pub struct Harness {
    pub conn: SharedConnection,
    pub items: Arc<FlakyItemStore>,
    pub containers: Arc<FlakyContainerStore>,
    pub service: CountService,
}

pub fn fast_config() -> ReconcileConfig {
    ReconcileConfig {
        retry_backoff_ms: 0,
        ..ReconcileConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(fast_config())
}

pub fn harness_with(config: ReconcileConfig) -> Harness {
    let conn = share_connection(open_db_in_memory().unwrap());
    let items = Arc::new(FlakyItemStore::new(
        SqliteItemStore::try_new(Arc::clone(&conn)).unwrap(),
    ));
    let containers = Arc::new(FlakyContainerStore::new(
        SqliteContainerStore::try_new(Arc::clone(&conn)).unwrap(),
    ));
    let service = CountService::new(
        Arc::clone(&items) as Arc<dyn ItemStore>,
        Arc::clone(&containers) as Arc<dyn ContainerStore>,
        config,
    );
    Harness {
        conn,
        items,
        containers,
        service,
    }
}

pub fn note(title: &str) -> ItemPayload {
    ItemPayload::new(ItemKind::Note, title, "")
}

/// Overwrites the cached count with raw SQL, bypassing the gateway.
pub fn force_cached_count(conn: &SharedConnection, id: ContainerId, value: i64) {
    conn.lock()
        .unwrap()
        .execute(
            "UPDATE spaces SET item_count = ?2 WHERE uuid = ?1;",
            params![id.to_string(), value],
        )
        .unwrap();
}

/// Inserts an item row with raw SQL, leaving the cached count untouched.
pub fn insert_item_behind_cache(conn: &SharedConnection, id: ContainerId) -> ItemId {
    let item_id = ItemId::new();
    conn.lock()
        .unwrap()
        .execute(
            "INSERT INTO items (uuid, space_uuid, kind, title, content, created_at, updated_at)
             VALUES (?1, ?2, 'note', 'untracked', '', 0, 0);",
            params![item_id.to_string(), id.to_string()],
        )
        .unwrap();
    item_id
}

/// Counts item rows with raw SQL.
pub fn stored_item_count(conn: &SharedConnection, id: ContainerId) -> u64 {
    let count: i64 = conn
        .lock()
        .unwrap()
        .query_row(
            "SELECT COUNT(*) FROM items WHERE space_uuid = ?1;",
            [id.to_string()],
            |row| row.get(0),
        )
        .unwrap();
    count as u64
}

fn unavailable(operation: &str) -> StoreError {
    StoreError::Unavailable(format!("injected {operation} failure"))
}

/// Item store that can fail writes and count queries on demand.
pub struct FlakyItemStore {
    inner: SqliteItemStore,
    fail_writes: AtomicBool,
    failing_counts: AtomicUsize,
    count_calls: AtomicUsize,
}

impl FlakyItemStore {
    pub fn new(inner: SqliteItemStore) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            failing_counts: AtomicUsize::new(0),
            count_calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_writes(&self, enabled: bool) {
        self.fail_writes.store(enabled, Ordering::SeqCst);
    }

    /// Makes the next `times` calls to `count_by` fail.
    pub fn fail_next_counts(&self, times: usize) {
        self.failing_counts.store(times, Ordering::SeqCst);
    }

    pub fn count_calls(&self) -> usize {
        self.count_calls.load(Ordering::SeqCst)
    }

    fn check_writes(&self, operation: &str) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(unavailable(operation));
        }
        Ok(())
    }
}

#[async_trait]
impl ItemStore for FlakyItemStore {
    async fn create(&self, item: &Item) -> StoreResult<Item> {
        self.check_writes("create")?;
        self.inner.create(item).await
    }

    async fn delete(&self, id: ItemId) -> StoreResult<()> {
        self.check_writes("delete")?;
        self.inner.delete(id).await
    }

    async fn get(&self, id: ItemId) -> StoreResult<Option<Item>> {
        self.inner.get(id).await
    }

    async fn count_by(
        &self,
        container_id: ContainerId,
        kind: Option<ItemKind>,
    ) -> StoreResult<u64> {
        self.count_calls.fetch_add(1, Ordering::SeqCst);
        let consumed = self
            .failing_counts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if consumed {
            return Err(unavailable("count"));
        }
        self.inner.count_by(container_id, kind).await
    }

    async fn list_by(&self, container_id: ContainerId) -> StoreResult<Vec<Item>> {
        self.inner.list_by(container_id).await
    }

    async fn move_to(&self, id: ItemId, container_id: ContainerId) -> StoreResult<Item> {
        self.check_writes("move")?;
        self.inner.move_to(id, container_id).await
    }
}

/// Space store that can fail count writes on demand.
pub struct FlakyContainerStore {
    inner: SqliteContainerStore,
    fail_count_writes: AtomicBool,
    fail_listing: AtomicBool,
}

impl FlakyContainerStore {
    pub fn new(inner: SqliteContainerStore) -> Self {
        Self {
            inner,
            fail_count_writes: AtomicBool::new(false),
            fail_listing: AtomicBool::new(false),
        }
    }

    pub fn fail_count_writes(&self, enabled: bool) {
        self.fail_count_writes.store(enabled, Ordering::SeqCst);
    }

    pub fn fail_listing(&self, enabled: bool) {
        self.fail_listing.store(enabled, Ordering::SeqCst);
    }
}

#[async_trait]
impl ContainerStore for FlakyContainerStore {
    async fn create(&self, container: &Container) -> StoreResult<()> {
        self.inner.create(container).await
    }

    async fn get(&self, id: ContainerId) -> StoreResult<Option<Container>> {
        self.inner.get(id).await
    }

    async fn update(&self, container: &Container) -> StoreResult<()> {
        self.inner.update(container).await
    }

    async fn write_count(&self, permit: &CountPermit, value: u64) -> StoreResult<()> {
        if self.fail_count_writes.load(Ordering::SeqCst) {
            return Err(unavailable("write_count"));
        }
        self.inner.write_count(permit, value).await
    }

    async fn list_ids(&self) -> StoreResult<Vec<ContainerId>> {
        if self.fail_listing.load(Ordering::SeqCst) {
            return Err(unavailable("list"));
        }
        self.inner.list_ids().await
    }
}
