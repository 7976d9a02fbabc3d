//! SiteBlockr Sync Runtime
//!
//! Keeps a browser rule engine in step with the persisted settings.
//!
//! # Architecture
//!
//! The [`SettingsStore`] is the source of truth and reports every save to its
//! subscribers. A [`ReconcileQueue`] owns the only [`Reconciler`] and runs one
//! reconciliation at a time; snapshots that arrive meanwhile collapse into a
//! single pending slot. The [`ScheduleTask`] watches the clock and writes the
//! blocking flag back through the same store, so its changes flow through the
//! queue like any other edit.
//!
//! # Modules
//!
//! - `store`: Settings persistence and change notification
//! - `engine`: Rule engine boundary and its in-memory/file implementations
//! - `reconciler`: Settings to rule-set reconciliation and its queue
//! - `scheduler`: Schedule and focus-mode task
//! - `editor`: Validated settings mutations
//! - `service`: Background wiring of all of the above
//! - `config`: Runtime configuration

pub mod config;
pub mod editor;
pub mod engine;
pub mod error;
pub mod reconciler;
pub mod scheduler;
pub mod service;
pub mod store;

#[cfg(test)]
mod testing;

pub use config::{ReconcileMode, SyncConfig};
pub use editor::{with_retries, Edit, SettingsEditor};
pub use engine::{JsonRuleFile, MemoryRuleEngine, RuleEngine};
pub use error::{ConfigError, EditError, EngineError, StoreError, SyncError};
pub use reconciler::{plan_changes, ReconcileQueue, ReconcileReport, Reconciler, RulePlan};
pub use scheduler::{Clock, ScheduleTask, SystemClock};
pub use service::Background;
pub use store::{JsonFileStore, MemoryStore, SettingsStore, Subscription};
