use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use sb_compiler::{compile_settings, ruleset_to_json, RejectedSite};
use sb_core::{SiteMatcher, Settings};
use sb_sync::{Background, JsonRuleFile, ReconcileReport, Reconciler, SettingsStore};

use crate::Context;

async fn load_settings(ctx: &Context) -> Result<Settings, String> {
    ctx.store.load().await.map_err(|e| e.to_string())
}

fn print_rejected(rejected: &[RejectedSite]) {
    for site in rejected {
        println!("  skipped #{} '{}': {}", site.entry_index + 1, site.url, site.error);
    }
}

/// Verdict line for one URL.
fn verdict(settings: &Settings, matcher: &SiteMatcher, url: &str) -> String {
    let result = matcher.match_url(url);
    match result.entry_index.and_then(|i| settings.sites.get(i)) {
        Some(site) => format!("BLOCK  {url}  (matched '{}')", site.url),
        None => format!("ALLOW  {url}"),
    }
}

pub async fn cmd_check(ctx: &Context, urls: &[String]) -> Result<(), String> {
    let settings = load_settings(ctx).await?;
    let matcher = SiteMatcher::from_settings_at(&settings, Utc::now().timestamp_millis());
    if !matcher.is_enabled() {
        println!("Blocking is off");
    }
    for url in urls {
        println!("{}", verdict(&settings, &matcher, url));
    }
    Ok(())
}

fn write_output(path: &Path, text: &str) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }
    fs::write(path, text).map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
}

pub async fn cmd_compile(ctx: &Context, output: Option<&Path>) -> Result<(), String> {
    let settings = load_settings(ctx).await?;

    let start = Instant::now();
    let compiled = compile_settings(&settings);
    let mut json = ruleset_to_json(&compiled.rules).map_err(|e| format!("Failed to encode rules: {e}"))?;
    json.push('\n');
    let elapsed = start.elapsed();

    let Some(path) = output else {
        print!("{json}");
        return Ok(());
    };
    write_output(path, &json)?;

    println!("Compiled {} sites to '{}'", settings.sites.len(), path.display());
    if !compiled.blocking_enabled {
        println!("  Blocking is off: ruleset is empty");
    }
    println!(
        "  Rules:    {} -> {} (dedupe removed {})",
        compiled.stats.before, compiled.stats.after, compiled.stats.deduped
    );
    println!("  Rejected: {}", compiled.rejected.len());
    print_rejected(&compiled.rejected);
    println!("  Time:     {:.1}ms", elapsed.as_secs_f64() * 1000.0);
    Ok(())
}

fn print_report(report: &ReconcileReport) {
    println!(
        "  Installed: {} (added {}, removed {}, attempts {})",
        report.installed, report.added, report.removed, report.attempts
    );
    print_rejected(&report.rejected);
}

pub async fn cmd_sync(ctx: &Context) -> Result<(), String> {
    let settings = load_settings(ctx).await?;
    let reconciler = Reconciler::with_config(JsonRuleFile::new(&ctx.rules_path), &ctx.config);
    let report = reconciler.reconcile(&settings).await.map_err(|e| e.to_string())?;

    println!("Synced '{}'", ctx.rules_path.display());
    print_report(&report);
    Ok(())
}

pub async fn cmd_watch(ctx: &Context) -> Result<(), String> {
    let reconciler = Reconciler::with_config(JsonRuleFile::new(&ctx.rules_path), &ctx.config);
    let background = Background::start(Arc::clone(&ctx.store), reconciler, &ctx.config)
        .await
        .map_err(|e| e.to_string())?;
    let watcher = ctx.store.spawn_watcher(ctx.config.store_poll_interval());

    println!(
        "Watching '{}', syncing '{}' (Ctrl-C to stop)",
        ctx.store.path().display(),
        ctx.rules_path.display()
    );
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("Failed to wait for Ctrl-C: {e}"))?;

    watcher.abort();
    background.shutdown().await;
    println!("Stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sb_core::{Rule, SiteEntry};
    use sb_sync::{JsonFileStore, RuleEngine, SyncConfig};

    fn context(dir: &tempfile::TempDir) -> Context {
        Context {
            store: Arc::new(JsonFileStore::new(dir.path().join("settings.json"))),
            rules_path: dir.path().join("rules.json"),
            config: SyncConfig::default(),
            retries: 1,
        }
    }

    fn with_sites(urls: &[&str]) -> Settings {
        Settings {
            sites: urls.iter().map(|u| SiteEntry::new(*u)).collect(),
            ..Settings::default()
        }
    }

    #[test]
    fn verdict_names_matching_entry() {
        let settings = with_sites(&["facebook.com", "reddit.com/r/all"]);
        let matcher = SiteMatcher::new(&settings);
        assert_eq!(
            verdict(&settings, &matcher, "https://www.facebook.com/"),
            "BLOCK  https://www.facebook.com/  (matched 'facebook.com')"
        );
        assert_eq!(verdict(&settings, &matcher, "https://notfacebook.com/"), "ALLOW  https://notfacebook.com/");
    }

    #[tokio::test]
    async fn sync_writes_rules_file() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        ctx.store.save(&with_sites(&["a.com", "b.com", "not valid"])).await.unwrap();

        cmd_sync(&ctx).await.unwrap();
        let installed: Vec<Rule> = JsonRuleFile::new(&ctx.rules_path).list_rules().await.unwrap();
        assert_eq!(installed.len(), 2);

        ctx.store.save(&with_sites(&["b.com"])).await.unwrap();
        cmd_sync(&ctx).await.unwrap();
        let installed = JsonRuleFile::new(&ctx.rules_path).list_rules().await.unwrap();
        assert_eq!(installed.len(), 1);
        assert_eq!(installed[0].condition.url_filter, "||b.com^");
    }

    #[tokio::test]
    async fn compile_writes_declarative_ruleset() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(&dir);
        ctx.store.save(&with_sites(&["a.com"])).await.unwrap();

        let output = dir.path().join("out").join("rules.json");
        cmd_compile(&ctx, Some(&output)).await.unwrap();

        let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(value[0]["condition"]["urlFilter"], "||a.com^");
        assert_eq!(value[0]["condition"]["resourceTypes"][0], "main_frame");
    }
}
