//! Runtime configuration.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use sb_core::types::STORAGE_KEY;

use crate::error::ConfigError;

/// How a reconciliation turns the installed rules into the desired ones.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// Remove every installed rule, then add the full desired set.
    Replace,
    /// Only touch rules that differ. Same end state as `Replace`.
    #[default]
    Incremental,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub reconcile_mode: ReconcileMode,
    /// Extra full reconcile attempts after an engine failure.
    pub reconcile_retries: u32,
    pub schedule_interval_secs: u64,
    pub store_poll_interval_ms: u64,
    pub storage_key: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            reconcile_mode: ReconcileMode::Incremental,
            reconcile_retries: 1,
            schedule_interval_secs: 60,
            store_poll_interval_ms: 1000,
            storage_key: STORAGE_KEY.to_string(),
        }
    }
}

impl SyncConfig {
    /// Load from a JSON file; absent fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn schedule_interval(&self) -> Duration {
        Duration::from_secs(self.schedule_interval_secs.max(1))
    }

    pub fn store_poll_interval(&self) -> Duration {
        Duration::from_millis(self.store_poll_interval_ms.max(10))
    }
}
