//! Drift detection and repair between cached counts and the item store.
//!
//! # Responsibility
//! - Recompute a space's item count from the item store and overwrite the
//!   cached count when they differ.
//! - Sweep every space on demand.
//!
//! # Invariants
//! - A pass reads, compares and writes under the space's `CountPermit`.
//! - A failed pass writes nothing; it is retried, then reported as skipped.
//! - Store failures never reach the caller.

use crate::cache::count_cache::CountCache;
use crate::config::ReconcileConfig;
use crate::model::ContainerId;
use crate::repo::container_repo::ContainerStore;
use crate::repo::item_repo::ItemStore;
use crate::repo::{StoreError, StoreResult};
use crate::service::error::{CountError, CountResult};
use crate::service::events::{DesyncEvent, DesyncJournal};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;

/// What a reconciliation pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// Cached count already matched the store.
    Unchanged { count: u64 },
    /// Cached count was overwritten with the store's count.
    Corrected { cached: u64, actual: u64 },
    /// The store could not be queried; the cache was left as is.
    Skipped { reason: String },
}

/// Per-space reconciliation report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub container_id: ContainerId,
    #[serde(flatten)]
    pub outcome: ReconcileOutcome,
}

impl ReconciliationResult {
    /// Whether the cached count was changed.
    pub fn corrected(&self) -> bool {
        matches!(self.outcome, ReconcileOutcome::Corrected { .. })
    }

    /// Cached count after the pass, when the pass completed.
    pub fn count_after(&self) -> Option<u64> {
        match self.outcome {
            ReconcileOutcome::Unchanged { count } => Some(count),
            ReconcileOutcome::Corrected { actual, .. } => Some(actual),
            ReconcileOutcome::Skipped { .. } => None,
        }
    }
}

/// Corrective pass over cached counts.
pub struct Reconciler {
    items: Arc<dyn ItemStore>,
    containers: Arc<dyn ContainerStore>,
    cache: Arc<CountCache>,
    journal: Arc<DesyncJournal>,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(
        items: Arc<dyn ItemStore>,
        containers: Arc<dyn ContainerStore>,
        cache: Arc<CountCache>,
        journal: Arc<DesyncJournal>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            items,
            containers,
            cache,
            journal,
            config,
        }
    }

    /// Reconciles one space.
    ///
    /// # Errors
    /// - `ContainerNotFound` when the space does not exist. Store failures
    ///   are reported as `ReconcileOutcome::Skipped`, never as errors.
    pub async fn reconcile(&self, container_id: ContainerId) -> CountResult<ReconciliationResult> {
        let attempts = self.config.max_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            match self.try_pass(container_id).await {
                Ok(outcome) => {
                    return Ok(ReconciliationResult {
                        container_id,
                        outcome,
                    })
                }
                Err(StoreError::ContainerNotFound(id)) => {
                    return Err(CountError::ContainerNotFound(id))
                }
                Err(err) => {
                    debug!(
                        "event=count_reconcile module=reconciler status=retry space_id={container_id} attempt={attempt} error={err}"
                    );
                    last_error = err.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.config.retry_backoff() * attempt).await;
                    }
                }
            }
        }

        self.journal
            .record(DesyncEvent::reconcile_skipped(container_id, last_error.clone()));
        Ok(ReconciliationResult {
            container_id,
            outcome: ReconcileOutcome::Skipped { reason: last_error },
        })
    }

    /// Reconciles every space; spaces that vanish mid-sweep are left out.
    pub async fn reconcile_all(&self) -> Vec<ReconciliationResult> {
        let started_at = Instant::now();
        let ids = match self.containers.list_ids().await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(
                    "event=count_sweep module=reconciler status=skip error_code=list_failed error={err}"
                );
                return Vec::new();
            }
        };

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            match self.reconcile(id).await {
                Ok(result) => results.push(result),
                Err(err) => debug!(
                    "event=count_reconcile module=reconciler status=skip space_id={id} error={err}"
                ),
            }
        }

        let corrected = results.iter().filter(|result| result.corrected()).count();
        let skipped = results
            .iter()
            .filter(|result| result.count_after().is_none())
            .count();
        info!(
            "event=count_sweep module=reconciler status=ok spaces={} corrected={corrected} skipped={skipped} duration_ms={}",
            results.len(),
            started_at.elapsed().as_millis()
        );
        results
    }

    async fn try_pass(&self, container_id: ContainerId) -> StoreResult<ReconcileOutcome> {
        let permit = self.cache.lock(container_id).await;
        let cached = self.cache.get(container_id).await?;
        let actual = self.items.count_by(container_id, None).await?;

        if actual == cached {
            return Ok(ReconcileOutcome::Unchanged { count: cached });
        }

        self.cache.set(&permit, actual).await?;
        self.journal
            .record(DesyncEvent::corrected(container_id, cached, actual));
        Ok(ReconcileOutcome::Corrected { cached, actual })
    }
}
