//! Settings to rule-set reconciliation
//!
//! A reconciliation compiles the snapshot, reads what the engine holds and
//! issues one remove batch and one add batch so that afterwards the engine
//! holds exactly the compiled rules. Validation happens during compilation,
//! before the engine is touched.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use sb_compiler::{compile_settings, RejectedSite};
use sb_core::types::{Rule, Settings};

use crate::config::{ReconcileMode, SyncConfig};
use crate::engine::RuleEngine;
use crate::error::{EngineError, SyncError};

// =============================================================================
// Planning
// =============================================================================

/// Engine calls needed to move from the installed to the desired rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RulePlan {
    pub remove_ids: Vec<u32>,
    pub add: Vec<Rule>,
}

impl RulePlan {
    pub fn is_empty(&self) -> bool {
        self.remove_ids.is_empty() && self.add.is_empty()
    }
}

/// Compute the remove/add batches for `mode`.
///
/// Both modes leave the engine holding exactly `desired`.
pub fn plan_changes(installed: &[Rule], desired: &[Rule], mode: ReconcileMode) -> RulePlan {
    match mode {
        ReconcileMode::Replace => {
            let mut remove_ids: Vec<u32> = installed.iter().map(|r| r.id).collect();
            remove_ids.sort_unstable();
            remove_ids.dedup();
            RulePlan {
                remove_ids,
                add: desired.to_vec(),
            }
        }
        ReconcileMode::Incremental => {
            let wanted: HashMap<u32, &Rule> = desired.iter().map(|r| (r.id, r)).collect();
            let present: HashMap<u32, &Rule> = installed.iter().map(|r| (r.id, r)).collect();

            let mut remove_ids: Vec<u32> = installed
                .iter()
                .filter(|rule| wanted.get(&rule.id) != Some(rule))
                .map(|rule| rule.id)
                .collect();
            remove_ids.sort_unstable();
            remove_ids.dedup();

            let add = desired
                .iter()
                .filter(|rule| present.get(&rule.id) != Some(rule))
                .cloned()
                .collect();

            RulePlan { remove_ids, add }
        }
    }
}

// =============================================================================
// Reconciler
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Rules installed once the reconciliation finished.
    pub installed: usize,
    pub added: usize,
    pub removed: usize,
    /// Entries skipped because they cannot become a valid filter.
    pub rejected: Vec<RejectedSite>,
    pub attempts: u32,
}

pub struct Reconciler<E> {
    engine: E,
    mode: ReconcileMode,
    retries: u32,
}

impl<E: RuleEngine> Reconciler<E> {
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, &SyncConfig::default())
    }

    pub fn with_config(engine: E, config: &SyncConfig) -> Self {
        Self {
            engine,
            mode: config.reconcile_mode,
            retries: config.reconcile_retries,
        }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Make the engine hold exactly the rules for `settings`.
    ///
    /// A failed engine call leaves the rule set in an unknown state, so the
    /// whole reconciliation is retried from a fresh listing, up to the
    /// configured number of retries.
    pub async fn reconcile(&self, settings: &Settings) -> Result<ReconcileReport, SyncError> {
        let compiled = compile_settings(settings);
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            match self.apply(&compiled.rules).await {
                Ok(plan) => {
                    return Ok(ReconcileReport {
                        installed: compiled.rules.len(),
                        added: plan.add.len(),
                        removed: plan.remove_ids.len(),
                        rejected: compiled.rejected,
                        attempts,
                    });
                }
                Err(err) if attempts <= self.retries => {
                    log::warn!("reconcile attempt {attempts} failed: {err}; retrying");
                }
                Err(source) => return Err(SyncError::Engine { attempts, source }),
            }
        }
    }

    async fn apply(&self, desired: &[Rule]) -> Result<RulePlan, EngineError> {
        let installed = self.engine.list_rules().await?;
        let plan = plan_changes(&installed, desired, self.mode);
        if plan.is_empty() {
            log::debug!("rule set already up to date ({} rules)", desired.len());
            return Ok(plan);
        }

        log::debug!(
            "applying rule plan: remove {:?}, add {}",
            plan.remove_ids,
            plan.add.len()
        );
        if !plan.remove_ids.is_empty() {
            self.engine.remove_rules(&plan.remove_ids).await?;
        }
        if !plan.add.is_empty() {
            self.engine.add_rules(&plan.add).await?;
        }
        log::info!(
            "rules updated: {} removed, {} added, {} installed",
            plan.remove_ids.len(),
            plan.add.len(),
            desired.len()
        );
        Ok(plan)
    }
}

// =============================================================================
// Queue
// =============================================================================

#[derive(Clone, Default)]
struct Slot {
    generation: u64,
    settings: Option<Arc<Settings>>,
}

/// Runs reconciliations one at a time on a dedicated task.
///
/// Only the newest submitted snapshot is kept: submissions made while a
/// reconciliation is running replace each other, and exactly one more
/// reconciliation runs after the current one with the latest snapshot.
pub struct ReconcileQueue {
    slot: watch::Sender<Slot>,
    done: watch::Receiver<u64>,
    worker: JoinHandle<()>,
}

impl ReconcileQueue {
    pub fn spawn<E: RuleEngine + 'static>(reconciler: Reconciler<E>) -> Self {
        let (slot, mut pending) = watch::channel(Slot::default());
        let (done_tx, done) = watch::channel(0u64);

        let worker = tokio::spawn(async move {
            while pending.changed().await.is_ok() {
                let Slot {
                    generation,
                    settings,
                } = pending.borrow_and_update().clone();
                let Some(settings) = settings else {
                    continue;
                };

                match reconciler.reconcile(&settings).await {
                    Ok(report) => log::debug!(
                        "reconciled generation {generation}: {} rules installed",
                        report.installed
                    ),
                    Err(err) => log::error!(
                        "reconciliation of generation {generation} failed, previous rules left in place: {err}"
                    ),
                }
                done_tx.send_replace(generation);
            }
        });

        Self { slot, done, worker }
    }

    /// Queue a snapshot; returns its generation number.
    pub fn submit(&self, settings: impl Into<Arc<Settings>>) -> u64 {
        let settings = settings.into();
        let mut generation = 0;
        self.slot.send_modify(|slot| {
            slot.generation += 1;
            slot.settings = Some(settings);
            generation = slot.generation;
        });
        generation
    }

    /// Wait until the latest submission has been reconciled (or superseded
    /// by a newer one that has).
    pub async fn flush(&self) {
        let target = self.slot.borrow().generation;
        let mut done = self.done.clone();
        let _ = done.wait_for(|finished| *finished >= target).await;
    }

    /// Finish any pending reconciliation and stop the worker.
    pub async fn shutdown(self) {
        drop(self.slot);
        if let Err(err) = self.worker.await {
            log::error!("reconcile worker ended abnormally: {err}");
        }
    }
}
