//! WebAssembly bindings for SiteBlockr
//!
//! The extension's background page owns a [`SiteBlocker`] and feeds it every
//! settings snapshot it loads. Navigation checks are synchronous and never
//! touch storage.

use chrono::{DateTime, FixedOffset, Utc};
use wasm_bindgen::prelude::*;

use sb_compiler::{compile_settings, CompiledRuleSet};
use sb_core::{evaluate, Evaluation, Settings, SiteMatcher, SitePattern};

fn parse_settings(json: &str) -> Result<Settings, String> {
    serde_json::from_str(json).map_err(|e| format!("Invalid settings: {e}"))
}

/// Local time for an epoch timestamp and a JS `getTimezoneOffset()` value
/// (minutes, positive west of UTC).
fn local_time(epoch_ms: f64, timezone_offset_min: f64) -> Option<DateTime<FixedOffset>> {
    let offset = FixedOffset::west_opt((timezone_offset_min * 60.0) as i32)?;
    let utc = DateTime::<Utc>::from_timestamp_millis(epoch_ms as i64)?;
    Some(utc.with_timezone(&offset))
}

fn evaluate_at(settings: &Settings, epoch_ms: f64, timezone_offset_min: f64) -> Option<Evaluation> {
    local_time(epoch_ms, timezone_offset_min).map(|now| evaluate(settings, &now))
}

fn set(target: &js_sys::Object, key: &str, value: &JsValue) {
    let _ = js_sys::Reflect::set(target, &key.into(), value);
}

fn compiled_to_js(compiled: &CompiledRuleSet) -> Result<JsValue, JsValue> {
    let rules_json = sb_compiler::ruleset_to_json(&compiled.rules)
        .map_err(|e| JsValue::from_str(&format!("Failed to encode rules: {e}")))?;
    let rules = js_sys::JSON::parse(&rules_json)?;

    let rejected = js_sys::Array::new();
    for site in &compiled.rejected {
        let entry = js_sys::Object::new();
        set(&entry, "index", &JsValue::from(site.entry_index as u32));
        set(&entry, "url", &JsValue::from_str(&site.url));
        set(&entry, "error", &JsValue::from_str(&site.error.to_string()));
        rejected.push(&entry);
    }

    let result = js_sys::Object::new();
    set(&result, "rules", &rules);
    set(&result, "rejected", &rejected);
    set(&result, "blockingEnabled", &JsValue::from(compiled.blocking_enabled));
    set(&result, "rulesBefore", &JsValue::from(compiled.stats.before as u32));
    set(&result, "rulesAfter", &JsValue::from(compiled.stats.after as u32));
    set(&result, "rulesDeduped", &JsValue::from(compiled.stats.deduped as u32));
    Ok(result.into())
}

/// Settings snapshot plus the matcher built from it.
///
/// The matcher is compiled enabled; whether blocking is on is decided per
/// call, so a focus session stops blocking at its end time even before the
/// next snapshot arrives.
#[wasm_bindgen]
pub struct SiteBlocker {
    settings: Settings,
    matcher: SiteMatcher,
}

impl SiteBlocker {
    fn compile(settings: &Settings) -> SiteMatcher {
        SiteMatcher::from_sites(&settings.sites, true)
    }

    fn active_at(&self, now_ms: f64) -> bool {
        self.settings.blocking_enabled_at(now_ms as i64)
    }

    fn matched_entry(&self, url: &str, now_ms: f64) -> Option<usize> {
        if !self.active_at(now_ms) {
            return None;
        }
        self.matcher.match_url(url).entry_index
    }
}

#[wasm_bindgen]
impl SiteBlocker {
    #[wasm_bindgen(constructor)]
    pub fn new(settings_json: &str) -> Result<SiteBlocker, JsValue> {
        let settings = parse_settings(settings_json).map_err(|e| JsValue::from_str(&e))?;
        let matcher = Self::compile(&settings);
        Ok(Self { settings, matcher })
    }

    /// Replace the snapshot. On error the previous one stays in use.
    pub fn update(&mut self, settings_json: &str) -> Result<(), JsValue> {
        let settings = parse_settings(settings_json).map_err(|e| JsValue::from_str(&e))?;
        self.matcher = Self::compile(&settings);
        self.settings = settings;
        Ok(())
    }

    #[wasm_bindgen(js_name = shouldBlock)]
    pub fn should_block(&self, url: &str) -> bool {
        self.matched_entry(url, js_sys::Date::now()).is_some()
    }

    /// Stored text of the entry that blocks `url`, if any.
    #[wasm_bindgen(js_name = matchedSite)]
    pub fn matched_site(&self, url: &str) -> Option<String> {
        self.matched_entry(url, js_sys::Date::now())
            .and_then(|index| self.settings.sites.get(index))
            .map(|site| site.url.clone())
    }

    /// Declarative rules for the current snapshot, with rejected entries.
    #[wasm_bindgen(js_name = compileRules)]
    pub fn compile_rules(&self) -> Result<JsValue, JsValue> {
        let compiled = compile_settings(&self.settings);
        for site in &compiled.rejected {
            web_sys::console::warn_1(&JsValue::from_str(&format!(
                "Skipping site #{} '{}': {}",
                site.entry_index, site.url, site.error
            )));
        }
        compiled_to_js(&compiled)
    }

    /// What the schedule and focus session say right now, in the browser's
    /// local time: `{ blockingEnabled, focusExpired, changed }`.
    #[wasm_bindgen(js_name = blockingDueNow)]
    pub fn blocking_due_now(&self) -> Result<JsValue, JsValue> {
        let date = js_sys::Date::new_0();
        let evaluation = evaluate_at(&self.settings, date.get_time(), date.get_timezone_offset())
            .ok_or_else(|| JsValue::from_str("Clock out of range"))?;

        let result = js_sys::Object::new();
        set(&result, "blockingEnabled", &JsValue::from(evaluation.blocking_enabled));
        set(&result, "focusExpired", &JsValue::from(evaluation.focus_expired));
        set(
            &result,
            "changed",
            &JsValue::from(evaluation.apply(&self.settings).is_some()),
        );
        Ok(result.into())
    }
}

/// Normalise what the user typed into the text stored for the entry.
#[wasm_bindgen(js_name = normalizeSite)]
pub fn normalize_site(input: &str) -> Result<String, JsValue> {
    SitePattern::parse(input)
        .map(|pattern| pattern.as_str().to_string())
        .map_err(|e| JsValue::from_str(&e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_js_timezone_offset() {
        // 2024-01-02T09:30:00Z, browser in UTC+1 reports -60.
        let now = local_time(1_704_187_800_000.0, -60.0).unwrap();
        assert_eq!(now.offset().local_minus_utc(), 3600);
        assert_eq!(now.format("%a %H:%M").to_string(), "Tue 10:30");
        assert!(local_time(0.0, 100_000.0).is_none());
    }

    #[test]
    fn evaluates_schedule_in_local_time() {
        let settings = parse_settings(
            r#"{"sites": [], "isBlockingEnabled": false,
                "schedule": {"startTime": "10:00", "endTime": "11:00", "days": [2]}}"#,
        )
        .unwrap();

        // 09:30 UTC is 10:30 in UTC+1 but 09:30 in UTC.
        let evaluation = evaluate_at(&settings, 1_704_187_800_000.0, -60.0).unwrap();
        assert!(evaluation.blocking_enabled);
        let evaluation = evaluate_at(&settings, 1_704_187_800_000.0, 0.0).unwrap();
        assert!(!evaluation.blocking_enabled);
    }

    #[test]
    fn lapsed_focus_session_stops_blocking() {
        let settings = parse_settings(
            r#"{"sites": ["twitter.com"], "isBlockingEnabled": false,
                "focusMode": {"isActive": true, "endTime": 10000}}"#,
        )
        .unwrap();
        let blocker = SiteBlocker {
            matcher: SiteBlocker::compile(&settings),
            settings,
        };
        assert_eq!(blocker.matched_entry("https://twitter.com/", 9_999.0), Some(0));
        assert_eq!(blocker.matched_entry("https://twitter.com/", 10_000.0), None);
    }

    #[test]
    fn rejects_bad_settings_json() {
        assert!(parse_settings("{").is_err());
        assert_eq!(parse_settings(r#"["a.com"]"#).unwrap().sites.len(), 1);
    }
}
