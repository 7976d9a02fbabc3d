//! Rule engine boundary
//!
//! Mirrors the browser's dynamic rule API: list the installed rules, remove
//! rules by id, add a batch of rules. The reconciler is the only caller.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use sb_core::hash::MAX_RULE_ID;
use sb_core::types::Rule;

use crate::error::EngineError;
use crate::store::write_atomic;

#[async_trait]
pub trait RuleEngine: Send + Sync {
    async fn list_rules(&self) -> Result<Vec<Rule>, EngineError>;

    /// Remove rules by id. Unknown ids are ignored.
    async fn remove_rules(&self, ids: &[u32]) -> Result<(), EngineError>;

    /// Add a batch of rules. The batch is applied whole or not at all.
    async fn add_rules(&self, rules: &[Rule]) -> Result<(), EngineError>;
}

#[async_trait]
impl<E: RuleEngine + ?Sized> RuleEngine for Arc<E> {
    async fn list_rules(&self) -> Result<Vec<Rule>, EngineError> {
        (**self).list_rules().await
    }

    async fn remove_rules(&self, ids: &[u32]) -> Result<(), EngineError> {
        (**self).remove_rules(ids).await
    }

    async fn add_rules(&self, rules: &[Rule]) -> Result<(), EngineError> {
        (**self).add_rules(rules).await
    }
}

/// Check a rule the way the browser engine would before installing it.
pub fn validate_rule(rule: &Rule) -> Result<(), EngineError> {
    let invalid = |reason: &str| EngineError::InvalidRule {
        id: rule.id,
        reason: reason.to_string(),
    };

    if rule.id == 0 || rule.id > MAX_RULE_ID {
        return Err(invalid("id out of range"));
    }
    let filter = &rule.condition.url_filter;
    if filter.is_empty() {
        return Err(invalid("empty urlFilter"));
    }
    if !filter.is_ascii() {
        return Err(invalid("urlFilter must be ASCII"));
    }
    if filter.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return Err(invalid("urlFilter contains whitespace"));
    }
    if filter.starts_with("||*") {
        return Err(invalid("urlFilter cannot start with ||*"));
    }
    if rule.condition.resource_types.is_empty() {
        return Err(invalid("resourceTypes cannot be empty"));
    }
    Ok(())
}

/// Apply an add batch to an id-keyed rule map, all or nothing.
fn insert_batch(installed: &mut BTreeMap<u32, Rule>, rules: &[Rule]) -> Result<(), EngineError> {
    let mut batch_ids = std::collections::HashSet::with_capacity(rules.len());
    for rule in rules {
        validate_rule(rule)?;
        if installed.contains_key(&rule.id) || !batch_ids.insert(rule.id) {
            return Err(EngineError::DuplicateId(rule.id));
        }
    }
    for rule in rules {
        installed.insert(rule.id, rule.clone());
    }
    Ok(())
}

fn remove_batch(installed: &mut BTreeMap<u32, Rule>, ids: &[u32]) {
    for id in ids {
        installed.remove(id);
    }
}

// =============================================================================
// In-memory engine
// =============================================================================

#[derive(Default)]
pub struct MemoryRuleEngine {
    rules: Mutex<BTreeMap<u32, Rule>>,
}

impl MemoryRuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that already holds `rules`, e.g. left over from a previous run.
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules: Mutex::new(rules.into_iter().map(|r| (r.id, r)).collect()),
        }
    }

    /// Installed rules ordered by id.
    pub async fn snapshot(&self) -> Vec<Rule> {
        self.rules.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl RuleEngine for MemoryRuleEngine {
    async fn list_rules(&self) -> Result<Vec<Rule>, EngineError> {
        Ok(self.snapshot().await)
    }

    async fn remove_rules(&self, ids: &[u32]) -> Result<(), EngineError> {
        remove_batch(&mut *self.rules.lock().await, ids);
        Ok(())
    }

    async fn add_rules(&self, rules: &[Rule]) -> Result<(), EngineError> {
        insert_batch(&mut *self.rules.lock().await, rules)
    }
}

// =============================================================================
// JSON ruleset file
// =============================================================================

/// Installed rules persisted as a declarative ruleset JSON array.
pub struct JsonRuleFile {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonRuleFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_err(&self, source: io::Error) -> EngineError {
        EngineError::Io {
            path: self.path.clone(),
            source,
        }
    }

    async fn read(&self) -> Result<BTreeMap<u32, Rule>, EngineError> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(err) => return Err(self.io_err(err)),
        };
        if text.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        let rules: Vec<Rule> = serde_json::from_str(&text)?;
        Ok(rules.into_iter().map(|r| (r.id, r)).collect())
    }

    async fn write(&self, installed: &BTreeMap<u32, Rule>) -> Result<(), EngineError> {
        let rules: Vec<&Rule> = installed.values().collect();
        let mut text = serde_json::to_string_pretty(&rules)?;
        text.push('\n');

        write_atomic(&self.path, text)
            .await
            .map_err(|e| self.io_err(e))
    }
}

#[async_trait]
impl RuleEngine for JsonRuleFile {
    async fn list_rules(&self) -> Result<Vec<Rule>, EngineError> {
        let _guard = self.lock.lock().await;
        Ok(self.read().await?.into_values().collect())
    }

    async fn remove_rules(&self, ids: &[u32]) -> Result<(), EngineError> {
        let _guard = self.lock.lock().await;
        let mut installed = self.read().await?;
        let before = installed.len();
        remove_batch(&mut installed, ids);
        if installed.len() == before {
            return Ok(());
        }
        self.write(&installed).await
    }

    async fn add_rules(&self, rules: &[Rule]) -> Result<(), EngineError> {
        let _guard = self.lock.lock().await;
        let mut installed = self.read().await?;
        insert_batch(&mut installed, rules)?;
        self.write(&installed).await
    }
}
