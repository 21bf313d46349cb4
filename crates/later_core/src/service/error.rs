//! Error taxonomy exposed by the count service.

use crate::model::{ContainerId, ItemId, ModelValidationError};
use crate::repo::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type CountResult<T> = Result<T, CountError>;

/// Errors surfaced to callers of the count service.
///
/// Cache drift is never one of them; it is reported through the desync
/// journal instead.
#[derive(Debug)]
pub enum CountError {
    /// Referenced space does not exist.
    ContainerNotFound(ContainerId),
    /// Referenced item does not exist.
    ItemNotFound(ItemId),
    /// Caller input failed validation.
    InvalidPayload(ModelValidationError),
    /// The store could not perform the primary write or read.
    StoreUnavailable(StoreError),
    /// The mutation task stopped before reporting back.
    Interrupted(String),
}

impl Display for CountError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContainerNotFound(id) => write!(f, "space not found: {id}"),
            Self::ItemNotFound(id) => write!(f, "item not found: {id}"),
            Self::InvalidPayload(err) => write!(f, "{err}"),
            Self::StoreUnavailable(err) => write!(f, "{err}"),
            Self::Interrupted(message) => write!(f, "mutation interrupted: {message}"),
        }
    }
}

impl Error for CountError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidPayload(err) => Some(err),
            Self::StoreUnavailable(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StoreError> for CountError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::ContainerNotFound(id) => Self::ContainerNotFound(id),
            StoreError::ItemNotFound(id) => Self::ItemNotFound(id),
            other => Self::StoreUnavailable(other),
        }
    }
}

impl From<ModelValidationError> for CountError {
    fn from(value: ModelValidationError) -> Self {
        Self::InvalidPayload(value)
    }
}

impl CountError {
    /// Stable machine-readable code for envelopes and log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ContainerNotFound(_) => "space_not_found",
            Self::ItemNotFound(_) => "item_not_found",
            Self::InvalidPayload(_) => "invalid_payload",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Interrupted(_) => "interrupted",
        }
    }
}
