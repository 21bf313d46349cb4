//! Core domain logic for Later spaces and their item counts.
//! This crate is the single source of truth for count invariants.

pub mod cache;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use cache::count_cache::{CountCache, CountPermit, DecrementOutcome};
pub use config::{ConfigError, CoreConfig, ReconcileConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::container::Container;
pub use model::item::{Item, ItemKind, ItemPayload};
pub use model::kind_detector::{detect_item_kind, KindSuggestion};
pub use model::{ContainerId, IdParseError, ItemId, ModelValidationError};
pub use repo::container_repo::{ContainerStore, SqliteContainerStore};
pub use repo::item_repo::{ItemStore, SqliteItemStore};
pub use repo::{share_connection, SharedConnection, StoreError, StoreResult};
pub use service::count_service::CountService;
pub use service::error::{CountError, CountResult};
pub use service::events::{CountOperation, DesyncEvent, DesyncJournal};
pub use service::mutation_gateway::MutationGateway;
pub use service::reconciler::{ReconcileOutcome, ReconciliationResult, Reconciler};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::{core_version, ping};

    #[test]
    fn ping_returns_pong() {
        assert_eq!(ping(), "pong");
    }

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
