//! SiteBlockr Core Library
//!
//! This crate holds the settings model shared by every SiteBlockr component
//! together with the pieces that must stay free of I/O: site-entry
//! normalisation, the navigation URL matcher and schedule evaluation.
//!
//! # Architecture
//!
//! A single [`Settings`] aggregate is the source of truth. Site entries are
//! normalised into [`SitePattern`]s, which both the declarative rule compiler
//! and the in-process [`SiteMatcher`] consume, so a rule installed in the
//! browser engine and a fallback decision made here always agree.
//!
//! # Modules
//!
//! - `hash`: Murmur3 hashing used for stable rule identifiers
//! - `url`: Fast URL parsing without allocations
//! - `site`: Site entry validation and filter patterns
//! - `matcher`: Navigation block/allow decision
//! - `schedule`: Schedule windows and focus mode evaluation
//! - `types`: Shared type definitions

pub mod hash;
pub mod matcher;
pub mod schedule;
pub mod site;
pub mod types;
pub mod url;

// Re-export commonly used types
pub use hash::{murmur3_32, rule_id_for};
pub use matcher::{is_url_blocked, SiteMatcher};
pub use schedule::{evaluate, DayMask, Evaluation, ScheduleError, ScheduleWindow};
pub use site::{SiteError, SitePattern};
pub use types::{FocusMode, ResourceType, Rule, RuleAction, Schedule, Settings, SiteEntry, STORAGE_KEY};
