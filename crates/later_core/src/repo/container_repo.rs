//! Space store contract and SQLite implementation.
//!
//! # Invariants
//! - `update` persists metadata only and never touches `item_count`.
//! - `item_count` changes only through `write_count`, which takes the
//!   space's `CountPermit`.
//! - New spaces are stored with a zero count.
//! - Listing order is insertion order: `created_at ASC, rowid ASC`.

use super::{
    count_from_db, count_to_db, ensure_connection_ready, with_connection, SharedConnection,
    StoreError, StoreResult,
};
use crate::cache::count_cache::CountPermit;
use crate::model::container::Container;
use crate::model::{now_epoch_ms, ContainerId};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::PoisonError;

const SPACE_COLUMNS: [&str; 6] = [
    "uuid",
    "name",
    "icon",
    "item_count",
    "created_at",
    "updated_at",
];

const SPACE_SELECT_SQL: &str = "SELECT
    uuid,
    name,
    icon,
    item_count,
    created_at,
    updated_at
FROM spaces";

/// Authoritative persistence for space metadata and cached counts.
#[async_trait]
pub trait ContainerStore: Send + Sync {
    /// Persists a new space with a zero count.
    async fn create(&self, container: &Container) -> StoreResult<()>;
    /// Loads one space by id.
    async fn get(&self, id: ContainerId) -> StoreResult<Option<Container>>;
    /// Overwrites name and icon; `ContainerNotFound` when the space is gone.
    async fn update(&self, container: &Container) -> StoreResult<()>;
    /// Stores the cached count of the permit's space.
    async fn write_count(&self, permit: &CountPermit, value: u64) -> StoreResult<()>;
    /// Lists ids of every stored space.
    async fn list_ids(&self) -> StoreResult<Vec<ContainerId>>;
}

/// SQLite-backed space store.
#[derive(Clone)]
pub struct SqliteContainerStore {
    conn: SharedConnection,
}

impl SqliteContainerStore {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: SharedConnection) -> StoreResult<Self> {
        {
            let guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            ensure_connection_ready(&guard, "spaces", &SPACE_COLUMNS)?;
        }
        Ok(Self { conn })
    }
}

#[async_trait]
impl ContainerStore for SqliteContainerStore {
    async fn create(&self, container: &Container) -> StoreResult<()> {
        let container = container.clone();
        with_connection(&self.conn, "space_create", move |conn| {
            conn.execute(
                "INSERT INTO spaces (
                    uuid,
                    name,
                    icon,
                    item_count,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, 0, ?4, ?5);",
                params![
                    container.id.to_string(),
                    container.name.as_str(),
                    container.icon.as_deref(),
                    container.created_at,
                    container.updated_at,
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, id: ContainerId) -> StoreResult<Option<Container>> {
        with_connection(&self.conn, "space_get", move |conn| load_space(conn, id)).await
    }

    async fn update(&self, container: &Container) -> StoreResult<()> {
        let container = container.clone();
        with_connection(&self.conn, "space_update", move |conn| {
            let changed = conn.execute(
                "UPDATE spaces
                 SET
                    name = ?2,
                    icon = ?3,
                    updated_at = MAX(updated_at, ?4)
                 WHERE uuid = ?1;",
                params![
                    container.id.to_string(),
                    container.name.as_str(),
                    container.icon.as_deref(),
                    container.updated_at,
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::ContainerNotFound(container.id));
            }
            Ok(())
        })
        .await
    }

    async fn write_count(&self, permit: &CountPermit, value: u64) -> StoreResult<()> {
        let id = permit.container_id();
        let now = now_epoch_ms();
        with_connection(&self.conn, "space_write_count", move |conn| {
            let changed = conn.execute(
                "UPDATE spaces
                 SET
                    item_count = ?2,
                    updated_at = MAX(updated_at, ?3)
                 WHERE uuid = ?1;",
                params![id.to_string(), count_to_db(value, "spaces.item_count")?, now],
            )?;
            if changed == 0 {
                return Err(StoreError::ContainerNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn list_ids(&self) -> StoreResult<Vec<ContainerId>> {
        with_connection(&self.conn, "space_list_ids", |conn| {
            let mut stmt =
                conn.prepare("SELECT uuid FROM spaces ORDER BY created_at ASC, rowid ASC;")?;
            let mut rows = stmt.query([])?;
            let mut ids = Vec::new();
            while let Some(row) = rows.next()? {
                let value: String = row.get(0)?;
                ids.push(ContainerId::parse(&value)?);
            }
            Ok(ids)
        })
        .await
    }
}

fn load_space(conn: &Connection, id: ContainerId) -> StoreResult<Option<Container>> {
    let mut stmt = conn.prepare(&format!("{SPACE_SELECT_SQL} WHERE uuid = ?1;"))?;
    let space = stmt
        .query_row([id.to_string()], |row| Ok(parse_space_row(row)))
        .optional()?;
    space.transpose()
}

fn parse_space_row(row: &Row<'_>) -> StoreResult<Container> {
    let uuid_text: String = row.get("uuid")?;
    let id = ContainerId::parse(&uuid_text)?;
    let item_count = count_from_db(row.get("item_count")?, "spaces.item_count")?;

    Ok(Container::restore(
        id,
        row.get("name")?,
        row.get("icon")?,
        item_count,
        row.get("created_at")?,
        row.get("updated_at")?,
    ))
}
