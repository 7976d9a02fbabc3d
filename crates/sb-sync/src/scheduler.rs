//! Schedule and focus-mode task
//!
//! Periodically evaluates the schedule and focus session against the clock
//! and writes the resulting blocking flag back through the store. It never
//! talks to the rule engine; the saved settings reach the reconciler through
//! the normal change notification.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Local, TimeZone};
use tokio::task::JoinHandle;

use sb_core::schedule::evaluate;
use sb_core::types::Settings;

use crate::error::StoreError;
use crate::store::SettingsStore;

/// Source of the current local time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// The host's wall clock in its local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// Evaluate the stored settings at `now` and save them if the blocking flag
/// or the focus state changes.
///
/// Always works on a freshly loaded aggregate, so edits made since the last
/// check are never overwritten with stale values. Returns the settings in
/// effect after the check.
pub async fn check_once<S, Tz>(store: &S, now: &DateTime<Tz>) -> Result<Settings, StoreError>
where
    S: SettingsStore + ?Sized,
    Tz: TimeZone,
{
    let settings = store.load().await?;
    let evaluation = evaluate(&settings, now);
    let Some(updated) = evaluation.apply(&settings) else {
        return Ok(settings);
    };

    if evaluation.focus_expired {
        log::info!("focus session ended");
    }
    if updated.is_blocking_enabled != settings.is_blocking_enabled {
        log::info!(
            "blocking {} by schedule",
            if updated.is_blocking_enabled { "enabled" } else { "disabled" }
        );
    }
    store.save(&updated).await?;
    Ok(updated)
}

/// Time until the next check: the regular interval, cut short when a focus
/// session ends sooner.
fn next_wake(settings: &Settings, now: &DateTime<FixedOffset>, interval: Duration) -> Duration {
    let focus = &settings.focus_mode;
    match focus.end_time {
        Some(end) if focus.is_active => {
            let remaining = end.saturating_sub(now.timestamp_millis()).max(0) as u64;
            interval.min(Duration::from_millis(remaining))
        }
        _ => interval,
    }
}

/// Background task driving [`check_once`].
///
/// Checks on start, after every store change and at least once per
/// interval. Aborted when dropped.
pub struct ScheduleTask {
    handle: Option<JoinHandle<()>>,
}

impl ScheduleTask {
    pub fn spawn<S>(store: Arc<S>, clock: Arc<dyn Clock>, interval: Duration) -> Self
    where
        S: SettingsStore + ?Sized + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut changes = store.subscribe();
            let mut wake = interval;

            loop {
                let now = clock.now();
                match check_once(&*store, &now).await {
                    Ok(settings) => wake = next_wake(&settings, &now, interval),
                    Err(err) => {
                        log::warn!("schedule check failed: {err}");
                        wake = interval;
                    }
                }

                tokio::select! {
                    change = changes.recv() => {
                        if change.is_none() {
                            log::debug!("settings store closed, schedule task exiting");
                            break;
                        }
                    }
                    _ = tokio::time::sleep(wake) => {}
                }
            }
        });

        Self {
            handle: Some(handle),
        }
    }

    /// Stop the task and wait for it to finish.
    pub async fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
    }
}

impl Drop for ScheduleTask {
    fn drop(&mut self) {
        if let Some(handle) = &self.handle {
            handle.abort();
        }
    }
}
