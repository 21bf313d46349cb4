//! Item model: notes, todo lists and reference lists.
//!
//! # Invariants
//! - `kind` is a closed set; counting is kind-agnostic unless a caller asks
//!   for a per-kind count explicitly.
//! - `title` is trimmed and non-empty.

use super::kind_detector::detect_item_kind;
use super::{now_epoch_ms, ContainerId, ItemId, ModelValidationError};
use serde::{Deserialize, Serialize};

/// Content discriminator for items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    /// Free-form text note.
    Note,
    /// Checklist of actionable entries.
    TodoList,
    /// Reference list (books, places, ideas).
    List,
}

impl ItemKind {
    pub const ALL: [ItemKind; 3] = [ItemKind::Note, ItemKind::TodoList, ItemKind::List];

    /// Stable storage/wire label.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::TodoList => "todo_list",
            Self::List => "list",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "note" => Some(Self::Note),
            "todo_list" => Some(Self::TodoList),
            "list" => Some(Self::List),
            _ => None,
        }
    }
}

/// Caller input for creating an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemPayload {
    pub kind: ItemKind,
    pub title: String,
    #[serde(default)]
    pub content: String,
}

impl ItemPayload {
    pub fn new(kind: ItemKind, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            content: content.into(),
        }
    }

    /// Builds a payload whose kind is suggested by the kind detector.
    pub fn detect(title: impl Into<String>, content: impl Into<String>) -> Self {
        let title = title.into();
        let content = content.into();
        let suggestion = detect_item_kind(&format!("{title}\n{content}"));
        Self::new(suggestion.kind, title, content)
    }

    pub fn validate(&self) -> Result<(), ModelValidationError> {
        if self.title.trim().is_empty() {
            return Err(ModelValidationError::BlankItemTitle);
        }
        Ok(())
    }
}

/// Unit of user content owned by exactly one space.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    pub container_id: ContainerId,
    pub title: String,
    pub content: String,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds.
    pub updated_at: i64,
}

impl Item {
    /// Creates a new item in `container_id` from a validated payload.
    pub fn new(
        container_id: ContainerId,
        payload: ItemPayload,
    ) -> Result<Self, ModelValidationError> {
        payload.validate()?;
        let now = now_epoch_ms();
        Ok(Self {
            id: ItemId::new(),
            kind: payload.kind,
            container_id,
            title: payload.title.trim().to_string(),
            content: payload.content,
            created_at: now,
            updated_at: now,
        })
    }
}
