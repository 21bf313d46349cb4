//! Runtime configuration for the count core.
//!
//! Values come from built-in defaults, optionally a JSON document (the
//! shape the Flutter shell passes through FFI), then `LATER_*` environment
//! overrides. Invalid values are errors; nothing is silently ignored.

use crate::logging::default_log_level;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DB_PATH: &str = "LATER_DB_PATH";
pub const ENV_LOG_LEVEL: &str = "LATER_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "LATER_LOG_DIR";
pub const ENV_RECONCILE_ON_VIEW: &str = "LATER_RECONCILE_ON_VIEW";
pub const ENV_STARTUP_SWEEP: &str = "LATER_STARTUP_SWEEP";
pub const ENV_RECONCILE_MAX_ATTEMPTS: &str = "LATER_RECONCILE_MAX_ATTEMPTS";

/// Configuration errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// JSON document could not be parsed.
    InvalidJson(String),
    /// One value has the wrong shape.
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },
    /// One value parsed but is outside its allowed range.
    OutOfRange { key: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidJson(message) => write!(f, "invalid config json: {message}"),
            Self::InvalidValue {
                key,
                value,
                expected,
            } => write!(f, "invalid value `{value}` for {key}; expected {expected}"),
            Self::OutOfRange { key, message } => write!(f, "{key} out of range: {message}"),
        }
    }
}

impl Error for ConfigError {}

/// When and how drift correction runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Reconcile a space right before its detail view is read.
    pub reconcile_on_view: bool,
    /// Sweep every space once per session.
    pub startup_sweep: bool,
    /// Store attempts per reconciliation pass before it is skipped.
    pub max_attempts: u32,
    /// Delay before retry `n` is `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,
    /// Number of desync events retained in memory.
    pub journal_capacity: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            reconcile_on_view: true,
            startup_sweep: true,
            max_attempts: 3,
            retry_backoff_ms: 25,
            journal_capacity: 256,
        }
    }
}

impl ReconcileConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::OutOfRange {
                key: "reconcile.max_attempts",
                message: "must be at least 1".to_string(),
            });
        }
        if self.journal_capacity == 0 {
            return Err(ConfigError::OutOfRange {
                key: "reconcile.journal_capacity",
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Top-level core configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Database file; `None` lets the host pick its default location.
    pub db_path: Option<PathBuf>,
    pub log_level: String,
    /// Absolute log directory; `None` leaves file logging off.
    pub log_dir: Option<PathBuf>,
    pub reconcile: ReconcileConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            log_level: default_log_level().to_string(),
            log_dir: None,
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Parses a JSON document; missing fields keep their defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::InvalidJson(err.to_string()))?;
        config.reconcile.validate()?;
        Ok(config)
    }

    /// Defaults overridden by `LATER_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup` (environment-shaped keys).
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let read = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(value) = read(ENV_DB_PATH) {
            self.db_path = Some(PathBuf::from(value));
        }
        if let Some(value) = read(ENV_LOG_LEVEL) {
            self.log_level = value;
        }
        if let Some(value) = read(ENV_LOG_DIR) {
            self.log_dir = Some(PathBuf::from(value));
        }
        if let Some(value) = read(ENV_RECONCILE_ON_VIEW) {
            self.reconcile.reconcile_on_view = parse_flag(ENV_RECONCILE_ON_VIEW, &value)?;
        }
        if let Some(value) = read(ENV_STARTUP_SWEEP) {
            self.reconcile.startup_sweep = parse_flag(ENV_STARTUP_SWEEP, &value)?;
        }
        if let Some(value) = read(ENV_RECONCILE_MAX_ATTEMPTS) {
            self.reconcile.max_attempts =
                value.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
                    key: ENV_RECONCILE_MAX_ATTEMPTS,
                    value: value.clone(),
                    expected: "a positive integer",
                })?;
        }

        self.reconcile.validate()?;
        Ok(self)
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: value.to_string(),
            expected: "true|false",
        }),
    }
}
