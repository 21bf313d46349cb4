//! Space ("container") model.
//!
//! # Invariants
//! - `name` is trimmed and non-empty.
//! - `item_count` is a snapshot of the stored count. Only `CountCache`
//!   writes the stored value, under the space's `CountPermit`; nothing done
//!   to a `Container` value changes it.

use super::{now_epoch_ms, ContainerId, ModelValidationError};
use serde::Serialize;

/// Top-level organizational unit holding items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Container {
    pub id: ContainerId,
    pub name: String,
    pub icon: Option<String>,
    /// Cached number of items; may lag the item store until reconciled.
    item_count: u64,
    /// Unix epoch milliseconds.
    pub created_at: i64,
    /// Unix epoch milliseconds, bumped on metadata and count changes.
    pub updated_at: i64,
}

impl Container {
    /// Creates an empty space with a generated id.
    pub fn new(
        name: impl Into<String>,
        icon: Option<String>,
    ) -> Result<Self, ModelValidationError> {
        let name = normalize_name(name)?;
        let now = now_epoch_ms();
        Ok(Self {
            id: ContainerId::new(),
            name,
            icon: normalize_icon(icon),
            item_count: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Rebuilds a space from a stored row.
    pub(crate) fn restore(
        id: ContainerId,
        name: String,
        icon: Option<String>,
        item_count: u64,
        created_at: i64,
        updated_at: i64,
    ) -> Self {
        Self {
            id,
            name,
            icon,
            item_count,
            created_at,
            updated_at,
        }
    }

    /// Cached item count.
    pub fn item_count(&self) -> u64 {
        self.item_count
    }

    /// Changes name and icon; the cached count is not part of metadata.
    pub fn rename(
        &mut self,
        name: impl Into<String>,
        icon: Option<String>,
    ) -> Result<(), ModelValidationError> {
        self.name = normalize_name(name)?;
        self.icon = normalize_icon(icon);
        self.updated_at = now_epoch_ms().max(self.updated_at);
        Ok(())
    }
}

fn normalize_name(name: impl Into<String>) -> Result<String, ModelValidationError> {
    let name = name.into().trim().to_string();
    if name.is_empty() {
        return Err(ModelValidationError::BlankSpaceName);
    }
    Ok(name)
}

fn normalize_icon(icon: Option<String>) -> Option<String> {
    icon.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::Container;
    use crate::model::{ContainerId, ModelValidationError};

    #[test]
    fn new_space_starts_empty_with_trimmed_fields() {
        let space = Container::new("  Groceries ", Some("  ".to_string())).unwrap();
        assert_eq!(space.name, "Groceries");
        assert_eq!(space.icon, None);
        assert_eq!(space.item_count(), 0);
        assert_eq!(space.created_at, space.updated_at);
    }

    #[test]
    fn blank_name_is_rejected() {
        assert_eq!(
            Container::new(" \t", None).unwrap_err(),
            ModelValidationError::BlankSpaceName
        );
    }

    #[test]
    fn rename_validates_and_keeps_count_snapshot() {
        let mut space = Container::restore(ContainerId::new(), "Work".to_string(), None, 4, 1, 1);

        space.rename(" Office ", Some("🏢".to_string())).unwrap();
        assert_eq!(space.name, "Office");
        assert_eq!(space.icon.as_deref(), Some("🏢"));
        assert_eq!(space.item_count(), 4);
        assert!(space.updated_at >= 1);

        assert_eq!(
            space.rename("  ", None).unwrap_err(),
            ModelValidationError::BlankSpaceName
        );
        assert_eq!(space.name, "Office");
    }
}
