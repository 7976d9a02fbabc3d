//! Background wiring
//!
//! Connects a store to a reconcile queue and runs the schedule task next to
//! them. This is what a long-running host (the extension background page, or
//! `siteblockr watch`) keeps alive.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::config::SyncConfig;
use crate::engine::RuleEngine;
use crate::error::StoreError;
use crate::reconciler::{ReconcileQueue, Reconciler};
use crate::scheduler::{Clock, ScheduleTask, SystemClock};
use crate::store::SettingsStore;

pub struct Background {
    store: Arc<dyn SettingsStore>,
    queue: Arc<ReconcileQueue>,
    listener: JoinHandle<()>,
    schedule: ScheduleTask,
}

impl Background {
    pub async fn start<S, E>(
        store: Arc<S>,
        reconciler: Reconciler<E>,
        config: &SyncConfig,
    ) -> Result<Self, StoreError>
    where
        S: SettingsStore + 'static,
        E: RuleEngine + 'static,
    {
        Self::start_with_clock(store, reconciler, config, Arc::new(SystemClock)).await
    }

    /// Reconcile the current settings, then every saved change.
    pub async fn start_with_clock<S, E>(
        store: Arc<S>,
        reconciler: Reconciler<E>,
        config: &SyncConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError>
    where
        S: SettingsStore + 'static,
        E: RuleEngine + 'static,
    {
        // Subscribe before loading so no save between the two is missed.
        let mut changes = store.subscribe();
        let initial = store.load().await?;

        let queue = Arc::new(ReconcileQueue::spawn(reconciler));
        queue.submit(initial);

        let listener = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move {
                while let Some(settings) = changes.recv().await {
                    let generation = queue.submit(settings);
                    log::debug!("settings changed, queued generation {generation}");
                }
            })
        };

        let schedule = ScheduleTask::spawn(Arc::clone(&store), clock, config.schedule_interval());
        log::info!("background sync started");

        Ok(Self {
            store,
            queue,
            listener,
            schedule,
        })
    }

    /// Wait until every save completed before this call is reconciled.
    ///
    /// The listener forwards changes asynchronously, so the current
    /// aggregate is submitted here directly rather than relying on it.
    pub async fn flush(&self) -> Result<(), StoreError> {
        let settings = self.store.load().await?;
        self.queue.submit(settings);
        self.queue.flush().await;
        Ok(())
    }

    pub async fn shutdown(self) {
        self.schedule.stop().await;
        self.listener.abort();
        let _ = self.listener.await;

        match Arc::try_unwrap(self.queue) {
            Ok(queue) => queue.shutdown().await,
            Err(queue) => queue.flush().await,
        }
        log::info!("background sync stopped");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use chrono::{DateTime, FixedOffset, NaiveDate};

    use super::*;
    use crate::editor::SettingsEditor;
    use crate::engine::MemoryRuleEngine;
    use crate::store::MemoryStore;
    use crate::testing::ManualClock;
    use sb_core::types::{Schedule, Settings, SiteEntry};

    // 2024-01-02 is a Tuesday, 2024-01-06 a Saturday.
    fn at(day: u32, hour: u32) -> DateTime<FixedOffset> {
        NaiveDate::from_ymd_opt(2024, 1, day)
            .unwrap()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
            .and_local_timezone(FixedOffset::east_opt(0).unwrap())
            .unwrap()
    }

    async fn wait_for_rules(engine: &MemoryRuleEngine, count: usize) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while engine.snapshot().await.len() != count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("rule count not reached in time");
    }

    #[tokio::test]
    async fn edits_flow_through_to_the_engine() {
        let store = Arc::new(MemoryStore::new(Settings {
            sites: vec![SiteEntry::new("a.com")],
            ..Settings::default()
        }));
        let engine = Arc::new(MemoryRuleEngine::new());
        let background = Background::start(
            Arc::clone(&store),
            Reconciler::new(Arc::clone(&engine)),
            &SyncConfig::default(),
        )
        .await
        .unwrap();

        background.flush().await.unwrap();
        assert_eq!(engine.snapshot().await.len(), 1);

        let editor = SettingsEditor::new(Arc::clone(&store));
        editor.add_site("b.com", None).await.unwrap();
        editor.add_site("c.com", None).await.unwrap();
        background.flush().await.unwrap();
        assert_eq!(engine.snapshot().await.len(), 3);

        editor.set_enabled(false).await.unwrap();
        wait_for_rules(&engine, 0).await;

        background.shutdown().await;
    }

    #[tokio::test]
    async fn schedule_changes_reach_the_engine() {
        let store = Arc::new(MemoryStore::new(Settings {
            sites: vec![SiteEntry::new("a.com"), SiteEntry::new("b.com")],
            is_blocking_enabled: false,
            schedule: Some(Schedule {
                start_time: "09:00".into(),
                end_time: "17:00".into(),
                days: vec![1, 2, 3, 4, 5],
            }),
            ..Settings::default()
        }));
        let engine = Arc::new(MemoryRuleEngine::new());
        let clock = Arc::new(ManualClock::new(at(2, 10)));
        let config = SyncConfig {
            schedule_interval_secs: 1,
            ..SyncConfig::default()
        };

        let background = Background::start_with_clock(
            Arc::clone(&store),
            Reconciler::new(Arc::clone(&engine)),
            &config,
            clock.clone(),
        )
        .await
        .unwrap();

        wait_for_rules(&engine, 2).await;
        assert!(store.load().await.unwrap().is_blocking_enabled);

        clock.set(at(6, 10));
        wait_for_rules(&engine, 0).await;

        background.shutdown().await;
    }
}
