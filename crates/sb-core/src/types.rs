//! Core type definitions for SiteBlockr
//!
//! These types map directly to the persisted settings record and to the
//! JSON shape of declarative rules, and are used throughout the workspace.

use serde::{Deserialize, Serialize};

/// Storage key the settings aggregate lives under.
pub const STORAGE_KEY: &str = "blockedSites";

/// Priority given to every block rule.
pub const DEFAULT_RULE_PRIORITY: u32 = 1;

// =============================================================================
// Settings
// =============================================================================

/// One blocked site as typed by the user.
///
/// `url` is a bare domain or substring, not necessarily a valid URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "SiteEntryRepr")]
pub struct SiteEntry {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl SiteEntry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category: None,
        }
    }

    pub fn with_category(url: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            category: Some(category.into()),
        }
    }
}

// Older revisions persisted plain strings instead of objects.
#[derive(Deserialize)]
#[serde(untagged)]
enum SiteEntryRepr {
    Bare(String),
    Full {
        url: String,
        #[serde(default)]
        category: Option<String>,
    },
}

impl From<SiteEntryRepr> for SiteEntry {
    fn from(repr: SiteEntryRepr) -> Self {
        match repr {
            SiteEntryRepr::Bare(url) => Self { url, category: None },
            SiteEntryRepr::Full { url, category } => Self { url, category },
        }
    }
}

/// Timed state that forces blocking on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FocusMode {
    pub is_active: bool,
    /// Epoch milliseconds at which the session ends.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<i64>,
    /// Session length in minutes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
}

impl FocusMode {
    /// Active and not yet past its end time.
    pub fn is_running_at(&self, now_ms: i64) -> bool {
        self.is_active && self.end_time.map_or(true, |end| now_ms < end)
    }

    /// Still flagged active although its end time has passed.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.is_active && self.end_time.is_some_and(|end| now_ms >= end)
    }
}

/// Weekly blocking window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Schedule {
    /// "HH:MM", inclusive
    pub start_time: String,
    /// "HH:MM", exclusive
    pub end_time: String,
    /// 0 = Sunday .. 6 = Saturday
    pub days: Vec<u8>,
}

impl Schedule {
    /// A schedule without any day never drives the blocking flag.
    pub fn is_configured(&self) -> bool {
        !self.days.is_empty()
    }
}

/// The persisted settings aggregate.
///
/// Always read and written as a whole; the last writer wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "SettingsRepr")]
pub struct Settings {
    pub sites: Vec<SiteEntry>,
    pub is_blocking_enabled: bool,
    pub focus_mode: FocusMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sites: Vec::new(),
            is_blocking_enabled: true,
            focus_mode: FocusMode::default(),
            schedule: None,
        }
    }
}

impl Settings {
    /// Whether block rules should be installed for this snapshot.
    pub fn blocking_enabled(&self) -> bool {
        self.is_blocking_enabled || self.focus_mode.is_active
    }

    /// Like [`Settings::blocking_enabled`], but a focus session counts only
    /// until its end time.
    pub fn blocking_enabled_at(&self, now_ms: i64) -> bool {
        self.is_blocking_enabled || self.focus_mode.is_running_at(now_ms)
    }

    /// The schedule, if one with at least one day is set.
    pub fn active_schedule(&self) -> Option<&Schedule> {
        self.schedule.as_ref().filter(|s| s.is_configured())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SettingsRepr {
    Legacy(Vec<SiteEntry>),
    Current(SettingsRecord),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct SettingsRecord {
    sites: Vec<SiteEntry>,
    is_blocking_enabled: bool,
    focus_mode: FocusMode,
    schedule: Option<Schedule>,
}

impl Default for SettingsRecord {
    fn default() -> Self {
        let defaults = Settings::default();
        Self {
            sites: defaults.sites,
            is_blocking_enabled: defaults.is_blocking_enabled,
            focus_mode: defaults.focus_mode,
            schedule: defaults.schedule,
        }
    }
}

impl From<SettingsRepr> for Settings {
    fn from(repr: SettingsRepr) -> Self {
        match repr {
            SettingsRepr::Legacy(sites) => Self {
                sites,
                ..Self::default()
            },
            SettingsRepr::Current(record) => Self {
                sites: record.sites,
                is_blocking_enabled: record.is_blocking_enabled,
                focus_mode: record.focus_mode,
                schedule: record.schedule,
            },
        }
    }
}

// =============================================================================
// Declarative Rules
// =============================================================================

/// Action of a declarative rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RuleAction {
    /// Cancels the request
    Block,
    /// Lets the request through regardless of other rules
    Allow,
}

/// Resource types a declarative rule condition can be restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Stylesheet,
    Script,
    Image,
    Font,
    Object,
    Xmlhttprequest,
    Ping,
    CspReport,
    Media,
    Websocket,
    Webtransport,
    Webbundle,
    Other,
}

/// Match condition of a declarative rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    #[serde(default)]
    pub url_filter: String,
    #[serde(default)]
    pub resource_types: Vec<ResourceType>,
}

/// A declarative rule as understood by the browser rule engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub id: u32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

impl Rule {
    /// Block top-level navigations matching `url_filter`.
    pub fn block_navigation(id: u32, url_filter: impl Into<String>) -> Self {
        Self {
            id,
            priority: DEFAULT_RULE_PRIORITY,
            action: RuleAction::Block,
            condition: RuleCondition {
                url_filter: url_filter.into(),
                resource_types: vec![ResourceType::MainFrame],
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_use_defaults() {
        let settings: Settings = serde_json::from_str("{}").unwrap();
        assert!(settings.sites.is_empty());
        assert!(settings.is_blocking_enabled);
        assert!(!settings.focus_mode.is_active);
        assert!(settings.schedule.is_none());
    }

    #[test]
    fn legacy_string_list_loads() {
        let settings: Settings = serde_json::from_str(r#"["twitter.com", "reddit.com"]"#).unwrap();
        assert_eq!(
            settings.sites,
            vec![SiteEntry::new("twitter.com"), SiteEntry::new("reddit.com")]
        );
        assert!(settings.is_blocking_enabled);
    }

    #[test]
    fn current_shape_round_trips_field_names() {
        let json = r#"{
            "sites": [{"url": "facebook.com", "category": "social"}, "youtube.com"],
            "isBlockingEnabled": false,
            "focusMode": {"isActive": true, "endTime": 1700000000000, "duration": 25},
            "schedule": {"startTime": "09:00", "endTime": "17:00", "days": [1, 2, 3, 4, 5]}
        }"#;
        let settings: Settings = serde_json::from_str(json).unwrap();
        assert_eq!(settings.sites[0].category.as_deref(), Some("social"));
        assert_eq!(settings.sites[1], SiteEntry::new("youtube.com"));
        assert!(!settings.is_blocking_enabled);
        assert!(settings.blocking_enabled());
        assert_eq!(settings.focus_mode.duration, Some(25));

        let value = serde_json::to_value(&settings).unwrap();
        assert_eq!(value["isBlockingEnabled"], false);
        assert_eq!(value["focusMode"]["endTime"], 1700000000000i64);
        assert_eq!(value["schedule"]["startTime"], "09:00");
        assert!(value["sites"][1].get("category").is_none());
    }

    #[test]
    fn rule_serializes_to_declarative_shape() {
        let rule = Rule::block_navigation(7, "||example.com^");
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "id": 7,
                "priority": 1,
                "action": {"type": "block"},
                "condition": {"urlFilter": "||example.com^", "resourceTypes": ["main_frame"]}
            })
        );
    }

    #[test]
    fn focus_mode_expiry() {
        let focus = FocusMode {
            is_active: true,
            end_time: Some(1_000),
            duration: Some(1),
        };
        assert!(focus.is_running_at(999));
        assert!(!focus.is_expired_at(999));
        assert!(!focus.is_running_at(1_000));
        assert!(focus.is_expired_at(1_000));

        let open_ended = FocusMode {
            is_active: true,
            ..FocusMode::default()
        };
        assert!(open_ended.is_running_at(i64::MAX));
        assert!(!open_ended.is_expired_at(i64::MAX));
    }
}
