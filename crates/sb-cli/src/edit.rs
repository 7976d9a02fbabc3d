use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};

use sb_core::{evaluate, Schedule, Settings, SitePattern};
use sb_sync::scheduler::check_once;
use sb_sync::{with_retries, Edit, JsonFileStore, SettingsEditor};

use crate::Context;

const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

fn editor(ctx: &Context) -> SettingsEditor<Arc<JsonFileStore>> {
    SettingsEditor::new(Arc::clone(&ctx.store))
}

/// Bring the blocking flag in line with the schedule and focus state.
async fn reevaluate(ctx: &Context) -> Result<Settings, String> {
    check_once(&*ctx.store, &Local::now())
        .await
        .map_err(|e| e.to_string())
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

pub fn describe_schedule(schedule: &Schedule) -> String {
    let days: Vec<&str> = schedule
        .days
        .iter()
        .filter_map(|&d| DAY_NAMES.get(d as usize).copied())
        .collect();
    format!("{}-{} {}", schedule.start_time, schedule.end_time, days.join(","))
}

fn describe_focus<Tz: TimeZone>(settings: &Settings, now: &DateTime<Tz>) -> Option<String> {
    let focus = &settings.focus_mode;
    if !focus.is_running_at(now.timestamp_millis()) {
        return None;
    }
    match focus.end_time.and_then(DateTime::<Utc>::from_timestamp_millis) {
        Some(end) => Some(format!(
            "focus until {}",
            end.with_timezone(&Local).format("%H:%M")
        )),
        None => Some("focus".to_string()),
    }
}

fn report(edit: &Edit, done: &str, unchanged: &str) {
    if edit.changed {
        println!("{done}");
    } else {
        println!("{unchanged}");
    }
}

pub async fn cmd_list(ctx: &Context, json: bool) -> Result<(), String> {
    let settings = editor(ctx).settings().await.map_err(|e| e.to_string())?;

    if json {
        let text = serde_json::to_string_pretty(&settings)
            .map_err(|e| format!("Failed to encode settings: {e}"))?;
        println!("{text}");
        return Ok(());
    }

    let now = Local::now();
    let mut state = format!("Blocking:  {}", on_off(settings.blocking_enabled()));
    if let Some(focus) = describe_focus(&settings, &now) {
        state.push_str(&format!(" ({focus})"));
    }
    println!("{state}");
    match &settings.schedule {
        Some(schedule) if schedule.is_configured() => println!("Schedule:  {}", describe_schedule(schedule)),
        _ => println!("Schedule:  none"),
    }
    println!("Sites:     {}", settings.sites.len());

    for (i, site) in settings.sites.iter().enumerate() {
        let mut line = format!("  {:>3}. {}", i + 1, site.url);
        if let Some(category) = &site.category {
            line.push_str(&format!(" [{category}]"));
        }
        if let Err(e) = SitePattern::parse(&site.url) {
            line.push_str(&format!("  (invalid: {e})"));
        }
        println!("{line}");
    }

    Ok(())
}

pub async fn cmd_add(ctx: &Context, url: &str, category: Option<&str>) -> Result<(), String> {
    let editor = editor(ctx);
    let edit = with_retries(ctx.retries, || editor.add_site(url, category))
        .await
        .map_err(|e| e.to_string())?;
    let stored = edit.settings.sites.last().map(|s| s.url.as_str()).unwrap_or(url);
    report(&edit, &format!("Blocked '{stored}'"), &format!("'{url}' is already blocked"));
    Ok(())
}

pub async fn cmd_remove(ctx: &Context, url: &str) -> Result<(), String> {
    let editor = editor(ctx);
    let edit = with_retries(ctx.retries, || editor.remove_site(url))
        .await
        .map_err(|e| e.to_string())?;
    report(&edit, &format!("Unblocked '{url}'"), &format!("'{url}' is not in the block list"));
    Ok(())
}

pub async fn cmd_set_enabled(ctx: &Context, enabled: bool) -> Result<(), String> {
    let editor = editor(ctx);
    let edit = with_retries(ctx.retries, || editor.set_enabled(enabled))
        .await
        .map_err(|e| e.to_string())?;
    let state = on_off(enabled);
    report(&edit, &format!("Blocking switched {state}"), &format!("Blocking already {state}"));
    Ok(())
}

pub async fn cmd_toggle(ctx: &Context) -> Result<(), String> {
    let editor = editor(ctx);
    let edit = with_retries(ctx.retries, || editor.toggle())
        .await
        .map_err(|e| e.to_string())?;
    println!("Blocking switched {}", on_off(edit.settings.is_blocking_enabled));
    Ok(())
}

pub async fn cmd_schedule_set(ctx: &Context, start: String, end: String, days: Vec<u8>) -> Result<(), String> {
    let schedule = Schedule {
        start_time: start,
        end_time: end,
        days,
    };
    let editor = editor(ctx);
    let edit = with_retries(ctx.retries, || editor.set_schedule(schedule.clone()))
        .await
        .map_err(|e| e.to_string())?;

    let settings = reevaluate(ctx).await?;
    if let Some(schedule) = &edit.settings.schedule {
        println!("Schedule set: {}", describe_schedule(schedule));
    }
    println!("Blocking now {}", on_off(settings.blocking_enabled()));
    Ok(())
}

pub async fn cmd_schedule_clear(ctx: &Context) -> Result<(), String> {
    let editor = editor(ctx);
    let edit = with_retries(ctx.retries, || editor.clear_schedule())
        .await
        .map_err(|e| e.to_string())?;
    report(&edit, "Schedule cleared", "No schedule set");
    Ok(())
}

pub async fn cmd_schedule_status(ctx: &Context) -> Result<(), String> {
    let settings = editor(ctx).settings().await.map_err(|e| e.to_string())?;
    let now = Local::now();
    let evaluation = evaluate(&settings, &now);

    match settings.active_schedule() {
        Some(schedule) => println!("Schedule:        {}", describe_schedule(schedule)),
        None => println!("Schedule:        none"),
    }
    if let Some(focus) = describe_focus(&settings, &now) {
        println!("Focus:           {focus}");
    }
    println!("Stored state:    {}", on_off(settings.is_blocking_enabled));
    println!("Due now:         {}", on_off(evaluation.blocking_enabled));
    if evaluation.apply(&settings).is_some() {
        println!("(stored state is out of date; run `siteblockr watch` or any schedule command to update it)");
    }
    Ok(())
}

pub async fn cmd_focus_start(ctx: &Context, minutes: u32) -> Result<(), String> {
    let editor = editor(ctx);
    let now_ms = Utc::now().timestamp_millis();
    let edit = with_retries(ctx.retries, || editor.start_focus(minutes, now_ms))
        .await
        .map_err(|e| e.to_string())?;

    match describe_focus(&edit.settings, &Local::now()) {
        Some(focus) => println!("Focus session started, {focus}"),
        None => println!("Focus session started"),
    }
    Ok(())
}

pub async fn cmd_focus_stop(ctx: &Context) -> Result<(), String> {
    let editor = editor(ctx);
    let edit = with_retries(ctx.retries, || editor.stop_focus())
        .await
        .map_err(|e| e.to_string())?;
    report(&edit, "Focus session stopped", "No focus session running");

    let settings = reevaluate(ctx).await?;
    println!("Blocking now {}", on_off(settings.blocking_enabled()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_sync::{SettingsStore, SyncConfig};

    fn context(dir: &tempfile::TempDir) -> Context {
        Context {
            store: Arc::new(JsonFileStore::new(dir.path().join("settings.json"))),
            rules_path: dir.path().join("rules.json"),
            config: SyncConfig::default(),
            retries: 1,
        }
    }

    #[test]
    fn describes_schedule() {
        let schedule = Schedule {
            start_time: "09:00".into(),
            end_time: "17:00".into(),
            days: vec![1, 2, 3, 4, 5],
        };
        assert_eq!(describe_schedule(&schedule), "09:00-17:00 Mon,Tue,Wed,Thu,Fri");
    }

    #[tokio::test]
    async fn commands_edit_the_settings_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);

        cmd_add(&ctx, "https://Facebook.com/", Some("social")).await.unwrap();
        cmd_add(&ctx, "reddit.com/r/all", None).await.unwrap();
        cmd_remove(&ctx, "facebook.com").await.unwrap();
        cmd_set_enabled(&ctx, false).await.unwrap();

        let settings = ctx.store.load().await.unwrap();
        assert_eq!(settings.sites.len(), 1);
        assert_eq!(settings.sites[0].url, "reddit.com/r/all");
        assert!(!settings.is_blocking_enabled);

        assert!(cmd_add(&ctx, "bad site", None).await.is_err());
        assert!(cmd_focus_start(&ctx, 0).await.is_err());
    }

    #[tokio::test]
    async fn focus_blocks_only_while_running() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        cmd_set_enabled(&ctx, false).await.unwrap();

        cmd_focus_start(&ctx, 30).await.unwrap();
        let settings = ctx.store.load().await.unwrap();
        assert!(settings.focus_mode.is_active);
        assert!(settings.blocking_enabled());
        assert!(!settings.is_blocking_enabled);

        cmd_focus_stop(&ctx).await.unwrap();
        let settings = ctx.store.load().await.unwrap();
        assert!(!settings.focus_mode.is_active);
        assert!(!settings.blocking_enabled());
    }
}
