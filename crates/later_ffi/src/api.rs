//! FFI use-case API for Flutter-facing calls.
//!
//! # Responsibility
//! - Expose space and item count use cases to Dart via FRB.
//! - Translate core errors into envelopes with stable error codes.
//!
//! # Invariants
//! - Exported functions must not panic across FFI boundary.
//! - One count service and one tokio runtime exist per process; every call
//!   goes through them so per-space ordering holds across calls.
//! - Ids cross the boundary as UUID strings.

use later_core::{
    core_version as core_version_inner, detect_item_kind as detect_item_kind_inner,
    init_logging as init_logging_inner, ping as ping_inner, ContainerId, CoreConfig, CountError,
    CountResult, CountService, ItemId, ItemKind, ItemPayload, ReconcileOutcome,
    ReconciliationResult,
};
use log::warn;
use once_cell::sync::OnceCell;
use std::future::Future;
use tokio::runtime::Runtime;

const DEFAULT_DB_FILE_NAME: &str = "later_counts.sqlite3";
static RUNTIME: OnceCell<Runtime> = OnceCell::new();
static SERVICE: OnceCell<CountService> = OnceCell::new();

/// Minimal health-check API for FRB smoke integration.
///
/// # FFI contract
/// - Sync call, non-blocking.
/// - Never throws; always returns a UTF-8 string.
#[flutter_rust_bridge::frb(sync)]
pub fn ping() -> String {
    ping_inner().to_owned()
}

/// Expose core crate version through FFI.
#[flutter_rust_bridge::frb(sync)]
pub fn core_version() -> String {
    core_version_inner().to_owned()
}

/// Initializes Rust core logging once per process.
///
/// Input semantics:
/// - `level`: one of `trace|debug|info|warn|error` (case-insensitive).
/// - `log_dir`: absolute directory path where rolling logs are written.
///
/// # FFI contract
/// - Safe to call repeatedly with the same `level + log_dir` (idempotent).
/// - Reconfiguration attempts with different level or directory return error.
/// - Never panics; returns empty string on success and error message on failure.
#[flutter_rust_bridge::frb(sync)]
pub fn init_logging(level: String, log_dir: String) -> String {
    match init_logging_inner(level.as_str(), log_dir.as_str()) {
        Ok(()) => String::new(),
        Err(err) => err.to_string(),
    }
}

/// Action response envelope for space and item calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountActionResponse {
    /// Whether operation succeeded.
    pub ok: bool,
    /// Space the call acted on, when known.
    pub space_id: Option<String>,
    /// Created or moved item, when any.
    pub item_id: Option<String>,
    /// Space item count after the call, when read.
    pub item_count: Option<u64>,
    /// Stable machine-readable failure code (`space_not_found`, ...).
    pub error_code: Option<String>,
    /// Human-readable response message for diagnostics/UI.
    pub message: String,
}

impl CountActionResponse {
    fn success(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            space_id: None,
            item_id: None,
            item_count: None,
            error_code: None,
            message: message.into(),
        }
    }

    fn failure(operation: &str, failure: FfiFailure) -> Self {
        Self {
            ok: false,
            space_id: None,
            item_id: None,
            item_count: None,
            error_code: Some(failure.code.to_string()),
            message: format!("{operation} failed: {}", failure.message),
        }
    }

    fn with_space(mut self, space_id: ContainerId) -> Self {
        self.space_id = Some(space_id.to_string());
        self
    }

    fn with_item(mut self, item_id: ItemId) -> Self {
        self.item_id = Some(item_id.to_string());
        self
    }

    fn with_count(mut self, item_count: u64) -> Self {
        self.item_count = Some(item_count);
        self
    }
}

/// Outcome of reconciling one space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileResponse {
    pub ok: bool,
    pub space_id: Option<String>,
    /// `unchanged|corrected|skipped`; empty when the call failed.
    pub status: String,
    /// Cached count before correction (corrected only).
    pub cached: Option<u64>,
    /// Count after the pass (unchanged and corrected).
    pub item_count: Option<u64>,
    pub error_code: Option<String>,
    pub message: String,
}

impl ReconcileResponse {
    fn failure(operation: &str, failure: FfiFailure) -> Self {
        Self {
            ok: false,
            space_id: None,
            status: String::new(),
            cached: None,
            item_count: None,
            error_code: Some(failure.code.to_string()),
            message: format!("{operation} failed: {}", failure.message),
        }
    }
}

impl From<ReconciliationResult> for ReconcileResponse {
    fn from(result: ReconciliationResult) -> Self {
        let item_count = result.count_after();
        let (status, cached, message) = match result.outcome {
            ReconcileOutcome::Unchanged { .. } => {
                ("unchanged", None, "Count is accurate.".to_string())
            }
            ReconcileOutcome::Corrected { cached, actual } => (
                "corrected",
                Some(cached),
                format!("Count corrected from {cached} to {actual}."),
            ),
            ReconcileOutcome::Skipped { reason } => {
                ("skipped", None, format!("Reconciliation skipped: {reason}"))
            }
        };
        Self {
            ok: true,
            space_id: Some(result.container_id.to_string()),
            status: status.to_string(),
            cached,
            item_count,
            error_code: None,
            message,
        }
    }
}

/// Sweep response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SweepResponse {
    pub ok: bool,
    /// Whether the sweep actually ran (startup sweep runs once per process).
    pub ran: bool,
    pub results: Vec<ReconcileResponse>,
    /// Set only when the sweep itself could not run.
    pub error_code: Option<String>,
    pub message: String,
}

impl SweepResponse {
    fn from_results(results: Vec<ReconciliationResult>) -> Self {
        let results: Vec<ReconcileResponse> =
            results.into_iter().map(ReconcileResponse::from).collect();
        let corrected = results
            .iter()
            .filter(|result| result.status == "corrected")
            .count();
        Self {
            ok: true,
            ran: true,
            message: format!("Checked {} space(s), corrected {corrected}.", results.len()),
            results,
            error_code: None,
        }
    }

    fn not_run(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            ran: false,
            results: Vec::new(),
            error_code: None,
            message: message.into(),
        }
    }

    fn failure(operation: &str, failure: FfiFailure) -> Self {
        Self {
            ok: false,
            ran: false,
            results: Vec::new(),
            error_code: Some(failure.code.to_string()),
            message: format!("{operation} failed: {}", failure.message),
        }
    }
}

/// Kind suggestion for free text.
#[derive(Debug, Clone, PartialEq)]
pub struct KindSuggestionResponse {
    /// `note|todo_list|list`.
    pub kind: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
}

/// Creates an empty space.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Returns the created space ID with count 0 on success.
#[flutter_rust_bridge::frb(sync)]
pub fn space_create(name: String, icon: Option<String>) -> CountActionResponse {
    match block_on_service(|service| service.create_container(name, icon)) {
        Ok(space) => CountActionResponse::success("Space created.")
            .with_space(space.id)
            .with_count(space.item_count()),
        Err(failure) => CountActionResponse::failure("space_create", failure),
    }
}

/// Creates an item in a space.
///
/// Input semantics:
/// - `kind`: `note|todo_list|list`; `None` lets the kind detector choose.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Returns the created item ID and the space's cached count.
#[flutter_rust_bridge::frb(sync)]
pub fn item_create(
    space_id: String,
    title: String,
    content: String,
    kind: Option<String>,
) -> CountActionResponse {
    let result = parse_space_id(&space_id).and_then(|space_id| {
        let payload = match kind.as_deref().map(str::trim) {
            None | Some("") => ItemPayload::detect(title, content),
            Some(raw) => ItemPayload::new(parse_kind(raw)?, title, content),
        };
        block_on_service(|service| async move {
            let item = service.create_item(space_id, payload).await?;
            let count = service.get_count(space_id).await?;
            Ok::<_, CountError>((item, count))
        })
    });

    match result {
        Ok((item, count)) => CountActionResponse::success("Item created.")
            .with_space(item.container_id)
            .with_item(item.id)
            .with_count(count),
        Err(failure) => CountActionResponse::failure("item_create", failure),
    }
}

/// Deletes an item and lowers its space's count.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
#[flutter_rust_bridge::frb(sync)]
pub fn item_delete(item_id: String) -> CountActionResponse {
    let result = parse_item_id(&item_id).and_then(|item_id| {
        block_on_service(|service| async move {
            service.delete_item(item_id).await?;
            Ok::<_, CountError>(item_id)
        })
    });

    match result {
        Ok(item_id) => CountActionResponse::success("Item deleted.").with_item(item_id),
        Err(failure) => CountActionResponse::failure("item_delete", failure),
    }
}

/// Moves an item to another space.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Returns the target space's cached count.
#[flutter_rust_bridge::frb(sync)]
pub fn item_move(item_id: String, target_space_id: String) -> CountActionResponse {
    let result = parse_item_id(&item_id).and_then(|item_id| {
        let target = parse_space_id(&target_space_id)?;
        block_on_service(|service| async move {
            let item = service.move_item(item_id, target).await?;
            let count = service.get_count(target).await?;
            Ok::<_, CountError>((item, count))
        })
    });

    match result {
        Ok((item, count)) => CountActionResponse::success("Item moved.")
            .with_space(item.container_id)
            .with_item(item.id)
            .with_count(count),
        Err(failure) => CountActionResponse::failure("item_move", failure),
    }
}

/// Reads a space's cached item count without reconciling.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - The value may be stale until the space is reconciled.
#[flutter_rust_bridge::frb(sync)]
pub fn space_item_count(space_id: String) -> CountActionResponse {
    let result = parse_space_id(&space_id).and_then(|space_id| {
        block_on_service(|service| async move {
            Ok::<_, CountError>((space_id, service.get_count(space_id).await?))
        })
    });

    match result {
        Ok((space_id, count)) => CountActionResponse::success("Count loaded.")
            .with_space(space_id)
            .with_count(count),
        Err(failure) => CountActionResponse::failure("space_item_count", failure),
    }
}

/// Loads a space for its detail view.
///
/// Reconciles the space first unless `LATER_RECONCILE_ON_VIEW` is off.
#[flutter_rust_bridge::frb(sync)]
pub fn space_detail(space_id: String) -> CountActionResponse {
    let result = parse_space_id(&space_id)
        .and_then(|space_id| block_on_service(|service| service.container_detail(space_id)));

    match result {
        Ok(space) => CountActionResponse::success(space.name.clone())
            .with_space(space.id)
            .with_count(space.item_count()),
        Err(failure) => CountActionResponse::failure("space_detail", failure),
    }
}

/// Reconciles one space's cached count against its items.
///
/// # FFI contract
/// - Sync call, DB-backed execution.
/// - Never panics.
/// - Store trouble is reported as `status = skipped`, not as failure.
#[flutter_rust_bridge::frb(sync)]
pub fn space_reconcile(space_id: String) -> ReconcileResponse {
    let result = parse_space_id(&space_id)
        .and_then(|space_id| block_on_service(|service| service.reconcile(space_id)));

    match result {
        Ok(result) => ReconcileResponse::from(result),
        Err(failure) => ReconcileResponse::failure("space_reconcile", failure),
    }
}

/// Reconciles every space.
#[flutter_rust_bridge::frb(sync)]
pub fn spaces_reconcile_all() -> SweepResponse {
    match block_on_service(|service| async move { Ok(service.reconcile_all().await) }) {
        Ok(results) => SweepResponse::from_results(results),
        Err(failure) => SweepResponse::failure("spaces_reconcile_all", failure),
    }
}

/// Runs the once-per-session startup sweep.
///
/// # FFI contract
/// - Returns `ran = false` when disabled or already run in this process.
#[flutter_rust_bridge::frb(sync)]
pub fn startup_sweep() -> SweepResponse {
    match block_on_service(|service| async move { Ok(service.run_startup_sweep().await) }) {
        Ok(Some(results)) => SweepResponse::from_results(results),
        Ok(None) => SweepResponse::not_run("Startup sweep disabled or already done."),
        Err(failure) => SweepResponse::failure("startup_sweep", failure),
    }
}

/// Drains retained desync events as JSON objects, oldest first.
#[flutter_rust_bridge::frb(sync)]
pub fn desync_events_drain() -> Vec<String> {
    let events = match service() {
        Ok(service) => service.drain_events(),
        Err(failure) => {
            warn!(
                "event=ffi_call module=ffi status=error operation=desync_events_drain error_code={}",
                failure.code
            );
            return Vec::new();
        }
    };
    events
        .iter()
        .filter_map(|event| serde_json::to_string(event).ok())
        .collect()
}

/// Suggests an item kind for free text.
#[flutter_rust_bridge::frb(sync)]
pub fn detect_item_kind(text: String) -> KindSuggestionResponse {
    let suggestion = detect_item_kind_inner(&text);
    KindSuggestionResponse {
        kind: suggestion.kind.as_str().to_string(),
        confidence: suggestion.confidence,
    }
}

#[derive(Debug)]
struct FfiFailure {
    code: &'static str,
    message: String,
}

impl FfiFailure {
    fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<CountError> for FfiFailure {
    fn from(err: CountError) -> Self {
        Self::new(err.code(), err.to_string())
    }
}

fn runtime() -> Result<&'static Runtime, FfiFailure> {
    RUNTIME
        .get_or_try_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .thread_name("later-core")
                .build()
        })
        .map_err(|err| FfiFailure::new("runtime_unavailable", err.to_string()))
}

fn service() -> Result<&'static CountService, FfiFailure> {
    SERVICE.get_or_try_init(|| {
        let config = CoreConfig::from_env()
            .map_err(|err| FfiFailure::new("invalid_config", err.to_string()))?;
        let db_path = config
            .db_path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join(DEFAULT_DB_FILE_NAME));
        CountService::open_sqlite(&db_path, config.reconcile).map_err(FfiFailure::from)
    })
}

fn block_on_service<T, F, Fut>(work: F) -> Result<T, FfiFailure>
where
    F: FnOnce(&'static CountService) -> Fut,
    Fut: Future<Output = CountResult<T>>,
{
    let runtime = runtime()?;
    let service = service()?;
    runtime.block_on(work(service)).map_err(FfiFailure::from)
}

fn parse_space_id(raw: &str) -> Result<ContainerId, FfiFailure> {
    ContainerId::parse(raw.trim()).map_err(|err| FfiFailure::new("invalid_id", err.to_string()))
}

fn parse_item_id(raw: &str) -> Result<ItemId, FfiFailure> {
    ItemId::parse(raw.trim()).map_err(|err| FfiFailure::new("invalid_id", err.to_string()))
}

fn parse_kind(raw: &str) -> Result<ItemKind, FfiFailure> {
    ItemKind::parse(raw).ok_or_else(|| {
        FfiFailure::new(
            "invalid_kind",
            format!("unsupported item kind `{raw}`; expected note|todo_list|list"),
        )
    })
}
