//! Test doubles shared by the module tests.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};

use sb_core::types::{Rule, Settings};

use crate::engine::{MemoryRuleEngine, RuleEngine};
use crate::error::{EngineError, StoreError};
use crate::scheduler::Clock;
use crate::store::{MemoryStore, SettingsStore, Subscription};

/// Take one failure from the budget, if any is left.
fn take_failure(budget: &AtomicU32) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// Engine whose first `n` add batches fail.
pub struct FlakyEngine {
    pub inner: MemoryRuleEngine,
    failures: AtomicU32,
}

impl FlakyEngine {
    pub fn failing_adds(n: u32) -> Self {
        Self {
            inner: MemoryRuleEngine::new(),
            failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl RuleEngine for FlakyEngine {
    async fn list_rules(&self) -> Result<Vec<Rule>, EngineError> {
        self.inner.list_rules().await
    }

    async fn remove_rules(&self, ids: &[u32]) -> Result<(), EngineError> {
        self.inner.remove_rules(ids).await
    }

    async fn add_rules(&self, rules: &[Rule]) -> Result<(), EngineError> {
        if take_failure(&self.failures) {
            return Err(EngineError::Unavailable("injected failure".into()));
        }
        self.inner.add_rules(rules).await
    }
}

/// Engine that sleeps inside every call and records how many calls overlap.
pub struct SlowEngine {
    pub inner: MemoryRuleEngine,
    pub max_in_flight: AtomicUsize,
    in_flight: AtomicUsize,
    delay: Duration,
}

impl SlowEngine {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MemoryRuleEngine::new(),
            max_in_flight: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            delay,
        }
    }

    async fn enter(&self) {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
    }

    fn exit(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl RuleEngine for SlowEngine {
    async fn list_rules(&self) -> Result<Vec<Rule>, EngineError> {
        self.enter().await;
        let result = self.inner.list_rules().await;
        self.exit();
        result
    }

    async fn remove_rules(&self, ids: &[u32]) -> Result<(), EngineError> {
        self.enter().await;
        let result = self.inner.remove_rules(ids).await;
        self.exit();
        result
    }

    async fn add_rules(&self, rules: &[Rule]) -> Result<(), EngineError> {
        self.enter().await;
        let result = self.inner.add_rules(rules).await;
        self.exit();
        result
    }
}

/// Store whose first `n` saves fail without writing.
pub struct FlakyStore {
    inner: MemoryStore,
    failures: AtomicU32,
}

impl FlakyStore {
    pub fn failing_saves(n: u32) -> Self {
        Self {
            inner: MemoryStore::default(),
            failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl SettingsStore for FlakyStore {
    async fn load(&self) -> Result<Settings, StoreError> {
        self.inner.load().await
    }

    async fn save(&self, settings: &Settings) -> Result<(), StoreError> {
        if take_failure(&self.failures) {
            return Err(StoreError::Unavailable("injected failure".into()));
        }
        self.inner.save(settings).await
    }

    fn subscribe(&self) -> Subscription {
        self.inner.subscribe()
    }
}

/// Clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap()
    }
}
