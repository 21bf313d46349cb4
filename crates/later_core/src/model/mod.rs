//! Domain model for spaces and the items they hold.
//!
//! # Responsibility
//! - Define canonical data structures used by count bookkeeping.
//! - Keep identifiers strongly typed so space and item ids never mix.
//!
//! # Invariants
//! - Every item belongs to exactly one space.
//! - A space's cached item count is never negative.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

pub mod container;
pub mod item;
pub mod kind_detector;

/// Error returned when an identifier string is not a valid UUID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdParseError {
    pub kind: &'static str,
    pub value: String,
}

impl Display for IdParseError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid {} id `{}`", self.kind, self.value)
    }
}

impl Error for IdParseError {}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a fresh random id.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parses a hyphenated UUID string.
            pub fn parse(value: &str) -> Result<Self, IdParseError> {
                Uuid::parse_str(value.trim())
                    .map(Self)
                    .map_err(|_| IdParseError {
                        kind: $label,
                        value: value.to_string(),
                    })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_id!(
    /// Stable identifier of a space.
    ContainerId,
    "space"
);
define_id!(
    /// Stable identifier of an item.
    ItemId,
    "item"
);

/// Validation failures for caller-supplied model data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelValidationError {
    BlankSpaceName,
    BlankItemTitle,
}

impl Display for ModelValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankSpaceName => write!(f, "space name must not be blank"),
            Self::BlankItemTitle => write!(f, "item title must not be blank"),
        }
    }
}

impl Error for ModelValidationError {}

/// Current wall-clock time in unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}
