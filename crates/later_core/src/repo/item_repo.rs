//! Item store contract and SQLite implementation.
//!
//! # Invariants
//! - Items always reference an existing space (foreign key).
//! - `count_by` is the authoritative count the reconciler compares against.
//! - Listing order is insertion order: `created_at ASC, rowid ASC`.

use super::{
    count_from_db, ensure_connection_ready, with_connection, SharedConnection, StoreError,
    StoreResult,
};
use crate::model::item::{Item, ItemKind};
use crate::model::{now_epoch_ms, ContainerId, ItemId};
use async_trait::async_trait;
use rusqlite::{ffi, params, Connection, OptionalExtension, Row};
use std::sync::PoisonError;

const ITEM_COLUMNS: [&str; 7] = [
    "uuid",
    "space_uuid",
    "kind",
    "title",
    "content",
    "created_at",
    "updated_at",
];

const ITEM_SELECT_SQL: &str = "SELECT
    uuid,
    space_uuid,
    kind,
    title,
    content,
    created_at,
    updated_at
FROM items";

/// Authoritative persistence for items.
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Persists a new item and returns the stored record.
    async fn create(&self, item: &Item) -> StoreResult<Item>;
    /// Removes one item; `ItemNotFound` when it does not exist.
    async fn delete(&self, id: ItemId) -> StoreResult<()>;
    /// Loads one item by id.
    async fn get(&self, id: ItemId) -> StoreResult<Option<Item>>;
    /// Counts items in a space, optionally restricted to one kind.
    async fn count_by(&self, container_id: ContainerId, kind: Option<ItemKind>)
        -> StoreResult<u64>;
    /// Lists items in a space.
    async fn list_by(&self, container_id: ContainerId) -> StoreResult<Vec<Item>>;
    /// Re-parents one item and returns the stored record.
    async fn move_to(&self, id: ItemId, container_id: ContainerId) -> StoreResult<Item>;
}

/// SQLite-backed item store.
#[derive(Clone)]
pub struct SqliteItemStore {
    conn: SharedConnection,
}

impl SqliteItemStore {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: SharedConnection) -> StoreResult<Self> {
        {
            let guard = conn.lock().unwrap_or_else(PoisonError::into_inner);
            ensure_connection_ready(&guard, "items", &ITEM_COLUMNS)?;
        }
        Ok(Self { conn })
    }
}

#[async_trait]
impl ItemStore for SqliteItemStore {
    async fn create(&self, item: &Item) -> StoreResult<Item> {
        let item = item.clone();
        with_connection(&self.conn, "item_create", move |conn| {
            conn.execute(
                "INSERT INTO items (
                    uuid,
                    space_uuid,
                    kind,
                    title,
                    content,
                    created_at,
                    updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    item.id.to_string(),
                    item.container_id.to_string(),
                    item.kind.as_str(),
                    item.title.as_str(),
                    item.content.as_str(),
                    item.created_at,
                    item.updated_at,
                ],
            )
            .map_err(|err| map_space_reference_error(err, item.container_id))?;

            load_item(conn, item.id)?.ok_or_else(|| {
                StoreError::InvalidData(format!("item {} missing after insert", item.id))
            })
        })
        .await
    }

    async fn delete(&self, id: ItemId) -> StoreResult<()> {
        with_connection(&self.conn, "item_delete", move |conn| {
            let changed = conn.execute("DELETE FROM items WHERE uuid = ?1;", [id.to_string()])?;
            if changed == 0 {
                return Err(StoreError::ItemNotFound(id));
            }
            Ok(())
        })
        .await
    }

    async fn get(&self, id: ItemId) -> StoreResult<Option<Item>> {
        with_connection(&self.conn, "item_get", move |conn| load_item(conn, id)).await
    }

    async fn count_by(
        &self,
        container_id: ContainerId,
        kind: Option<ItemKind>,
    ) -> StoreResult<u64> {
        with_connection(&self.conn, "item_count_by", move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*)
                 FROM items
                 WHERE space_uuid = ?1
                   AND (?2 IS NULL OR kind = ?2);",
                params![container_id.to_string(), kind.map(ItemKind::as_str)],
                |row| row.get(0),
            )?;
            count_from_db(count, "COUNT(items)")
        })
        .await
    }

    async fn list_by(&self, container_id: ContainerId) -> StoreResult<Vec<Item>> {
        with_connection(&self.conn, "item_list_by", move |conn| {
            let mut stmt = conn.prepare(&format!(
                "{ITEM_SELECT_SQL}
                 WHERE space_uuid = ?1
                 ORDER BY created_at ASC, rowid ASC;"
            ))?;
            let mut rows = stmt.query([container_id.to_string()])?;
            let mut items = Vec::new();
            while let Some(row) = rows.next()? {
                items.push(parse_item_row(row)?);
            }
            Ok(items)
        })
        .await
    }

    async fn move_to(&self, id: ItemId, container_id: ContainerId) -> StoreResult<Item> {
        with_connection(&self.conn, "item_move", move |conn| {
            let changed = conn
                .execute(
                    "UPDATE items
                     SET space_uuid = ?2,
                         updated_at = ?3
                     WHERE uuid = ?1;",
                    params![id.to_string(), container_id.to_string(), now_epoch_ms()],
                )
                .map_err(|err| map_space_reference_error(err, container_id))?;
            if changed == 0 {
                return Err(StoreError::ItemNotFound(id));
            }
            load_item(conn, id)?.ok_or(StoreError::ItemNotFound(id))
        })
        .await
    }
}

fn load_item(conn: &Connection, id: ItemId) -> StoreResult<Option<Item>> {
    let mut stmt = conn.prepare(&format!("{ITEM_SELECT_SQL} WHERE uuid = ?1;"))?;
    let item = stmt
        .query_row([id.to_string()], |row| Ok(parse_item_row(row)))
        .optional()?;
    item.transpose()
}

fn parse_item_row(row: &Row<'_>) -> StoreResult<Item> {
    let uuid_text: String = row.get("uuid")?;
    let space_text: String = row.get("space_uuid")?;
    let kind_text: String = row.get("kind")?;
    let kind = ItemKind::parse(&kind_text).ok_or_else(|| {
        StoreError::InvalidData(format!("invalid item kind `{kind_text}` in items.kind"))
    })?;

    Ok(Item {
        id: ItemId::parse(&uuid_text)?,
        kind,
        container_id: ContainerId::parse(&space_text)?,
        title: row.get("title")?,
        content: row.get("content")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn map_space_reference_error(err: rusqlite::Error, container_id: ContainerId) -> StoreError {
    if let rusqlite::Error::SqliteFailure(failure, _) = &err {
        if failure.extended_code == ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
            return StoreError::ContainerNotFound(container_id);
        }
    }
    StoreError::from(err)
}
