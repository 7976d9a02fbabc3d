//! Error types for the sync runtime.

use std::io;
use std::path::PathBuf;

use sb_core::schedule::ScheduleError;
use sb_core::site::SiteError;

/// Persistence boundary failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to read '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to write '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid settings data: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Malformed storage document: {0}")]
    Malformed(String),
    #[error("Settings store unavailable: {0}")]
    Unavailable(String),
}

/// Rule engine rejected or failed a call.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Rule {id} rejected: {reason}")]
    InvalidRule { id: u32, reason: String },
    #[error("Duplicate rule id {0}")]
    DuplicateId(u32),
    #[error("Rule file '{}' failed: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid ruleset data: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("Rule engine unavailable: {0}")]
    Unavailable(String),
}

/// Reconciliation failure.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Rule engine failed after {attempts} attempt(s): {source}")]
    Engine {
        attempts: u32,
        #[source]
        source: EngineError,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Settings edit failure.
#[derive(Debug, thiserror::Error)]
pub enum EditError {
    #[error("Invalid site: {0}")]
    InvalidSite(#[from] SiteError),
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(#[from] ScheduleError),
    #[error("Focus duration must be between 1 and {max} minutes, got {minutes}")]
    InvalidDuration { minutes: u32, max: u32 },
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl EditError {
    /// Storage failures can be retried with the identical operation;
    /// validation failures cannot.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(_))
    }
}

/// Configuration file failure.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}
