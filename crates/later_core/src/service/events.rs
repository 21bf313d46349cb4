//! Desync journal: the observable trail of cache drift.
//!
//! # Invariants
//! - The journal is bounded; the oldest event is dropped first.
//! - Every recorded event is also written to the log.

use crate::model::{now_epoch_ms, ContainerId, ItemId};
use log::{info, warn};
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Item mutation whose cache adjustment is being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CountOperation {
    Increment,
    Decrement,
}

impl CountOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Increment => "increment",
            Self::Decrement => "decrement",
        }
    }
}

/// One observed drift symptom or correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DesyncEvent {
    /// Item write succeeded but the paired count adjustment did not.
    CacheAdjustFailed {
        container_id: ContainerId,
        item_id: ItemId,
        operation: CountOperation,
        reason: String,
        at: i64,
    },
    /// A decrement found the count already at zero.
    FloorClamped {
        container_id: ContainerId,
        item_id: ItemId,
        at: i64,
    },
    /// The reconciler overwrote a drifted count.
    Corrected {
        container_id: ContainerId,
        cached: u64,
        actual: u64,
        at: i64,
    },
    /// A reconciliation pass gave up without touching the cache.
    ReconcileSkipped {
        container_id: ContainerId,
        reason: String,
        at: i64,
    },
}

impl DesyncEvent {
    pub fn cache_adjust_failed(
        container_id: ContainerId,
        item_id: ItemId,
        operation: CountOperation,
        reason: impl Into<String>,
    ) -> Self {
        Self::CacheAdjustFailed {
            container_id,
            item_id,
            operation,
            reason: reason.into(),
            at: now_epoch_ms(),
        }
    }

    pub fn floor_clamped(container_id: ContainerId, item_id: ItemId) -> Self {
        Self::FloorClamped {
            container_id,
            item_id,
            at: now_epoch_ms(),
        }
    }

    pub fn corrected(container_id: ContainerId, cached: u64, actual: u64) -> Self {
        Self::Corrected {
            container_id,
            cached,
            actual,
            at: now_epoch_ms(),
        }
    }

    pub fn reconcile_skipped(container_id: ContainerId, reason: impl Into<String>) -> Self {
        Self::ReconcileSkipped {
            container_id,
            reason: reason.into(),
            at: now_epoch_ms(),
        }
    }

    pub fn container_id(&self) -> ContainerId {
        match self {
            Self::CacheAdjustFailed { container_id, .. }
            | Self::FloorClamped { container_id, .. }
            | Self::Corrected { container_id, .. }
            | Self::ReconcileSkipped { container_id, .. } => *container_id,
        }
    }

    fn log(&self) {
        match self {
            Self::CacheAdjustFailed {
                container_id,
                item_id,
                operation,
                reason,
                ..
            } => warn!(
                "event=cache_desync module=gateway status=warn space_id={container_id} item_id={item_id} operation={} reason={reason}",
                operation.as_str()
            ),
            Self::FloorClamped {
                container_id,
                item_id,
                ..
            } => warn!(
                "event=cache_desync module=gateway status=warn space_id={container_id} item_id={item_id} operation=decrement reason=floor_clamp"
            ),
            Self::Corrected {
                container_id,
                cached,
                actual,
                ..
            } => info!(
                "event=count_reconcile module=reconciler status=corrected space_id={container_id} cached={cached} actual={actual}"
            ),
            Self::ReconcileSkipped {
                container_id,
                reason,
                ..
            } => warn!(
                "event=count_reconcile module=reconciler status=skip space_id={container_id} reason={reason}"
            ),
        }
    }
}

/// Bounded in-memory record of desync events.
pub struct DesyncJournal {
    capacity: usize,
    events: Mutex<VecDeque<DesyncEvent>>,
}

impl DesyncJournal {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            events: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Logs and retains one event.
    pub fn record(&self, event: DesyncEvent) {
        event.log();
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        if events.len() == self.capacity {
            events.pop_front();
        }
        events.push_back(event);
    }

    /// Copies retained events, oldest first.
    pub fn snapshot(&self) -> Vec<DesyncEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    /// Removes and returns retained events, oldest first.
    pub fn drain(&self) -> Vec<DesyncEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }
}
