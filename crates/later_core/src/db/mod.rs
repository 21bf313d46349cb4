//! SQLite bootstrap for the Later count store.
//!
//! # Responsibility
//! - Open connections with foreign keys and a busy timeout configured.
//! - Bring the `spaces` / `items` schema to the version this build expects.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Stores refuse connections that did not come through `open_db*`.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Errors raised while opening or migrating a database.
#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// One migration script failed; nothing from the batch was kept.
    MigrationFailed {
        version: u32,
        source: rusqlite::Error,
    },
}

impl DbError {
    /// Stable code used in `db_open` / `db_migrate` log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "sqlite",
            Self::UnsupportedSchemaVersion { .. } => "schema_too_new",
            Self::MigrationFailed { .. } => "migration_failed",
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "count store schema v{db_version} is newer than this build (v{latest_supported})"
            ),
            Self::MigrationFailed { version, source } => {
                write!(f, "count store migration v{version} failed: {source}")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::MigrationFailed { source: err, .. } => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
