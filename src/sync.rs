//! Sync Engine - owns the source/target selection and drives a backup run
//!
//! Scanning, diffing and planning are plain function calls. Execution runs on
//! a blocking worker so an async host stays responsive; progress is sent back
//! as [`SyncProgress`] messages and cancellation is a shared flag observed
//! between actions.

use crate::diff::{diff, DiffResult};
use crate::error::SyncError;
use crate::executor::{ExecutionReport, Executor, Progress};
use crate::ignore::IgnoreRules;
use crate::plan::{build_plan, Plan};
use crate::scan::RelativePath;
use crate::Config;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Messages emitted while a plan is executed
#[derive(Debug, Clone)]
pub enum SyncProgress {
    /// Execution is starting with this many actionable entries
    Started { total: usize },
    /// One actionable entry has been processed
    Item(Progress),
    /// Free-form status line for the host
    Status(String),
    /// Execution ended
    Finished(SyncSummary),
}

/// Results from a complete backup run
#[derive(Debug, Clone)]
pub struct SyncSummary {
    pub total_actions: usize,
    /// Actionable entries processed before the run ended
    pub completed_actions: usize,
    pub added: usize,
    pub updated: usize,
    pub archived: usize,
    pub deleted_in_source: usize,
    pub failed_operations: usize,
    pub cancelled: bool,
    pub duration: Duration,
    pub failures: Vec<(RelativePath, String)>,
    /// Live `RelativePath -> SyncState` map after the run
    pub states: DiffResult,
}

impl SyncSummary {
    fn from_report(total_actions: usize, report: ExecutionReport) -> Self {
        Self {
            total_actions,
            completed_actions: report.completed(),
            added: report.added,
            updated: report.updated,
            archived: report.archived.len(),
            deleted_in_source: report.deleted.len(),
            failed_operations: report.failures.len(),
            cancelled: report.cancelled,
            duration: report.duration,
            failures: report.failures,
            states: report.states,
        }
    }

    pub fn successful_operations(&self) -> usize {
        self.added + self.updated
    }
}

/// Holds the current directory selection and runs backups for it
#[derive(Debug, Clone, Default)]
pub struct SyncEngine {
    source: Option<PathBuf>,
    target: Option<PathBuf>,
    rules: IgnoreRules,
}

impl SyncEngine {
    /// Create an engine with the roots from the configuration, if any
    pub fn new(config: &Config) -> Self {
        let mut engine = Self::default();
        if let Some(source) = config.source_path() {
            engine.select_source(source);
        }
        if let Some(target) = config.target_path() {
            engine.select_target(target);
        }
        engine
    }

    /// Select the source root. Reloads the exclusion rules and returns the
    /// fresh state map when a target is already selected.
    pub fn select_source(&mut self, path: impl Into<PathBuf>) -> Option<DiffResult> {
        let path = path.into();
        info!("Source directory selected: {}", path.display());
        self.rules = IgnoreRules::load(&path);
        self.source = Some(path);
        self.current_states()
    }

    /// Select the target root and return the fresh state map when possible
    pub fn select_target(&mut self, path: impl Into<PathBuf>) -> Option<DiffResult> {
        let path = path.into();
        info!("Target directory selected: {}", path.display());
        self.target = Some(path);
        self.current_states()
    }

    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    pub fn target(&self) -> Option<&Path> {
        self.target.as_deref()
    }

    /// Rules loaded at the last source selection or plan preparation
    pub fn rules(&self) -> &IgnoreRules {
        &self.rules
    }

    fn current_states(&mut self) -> Option<DiffResult> {
        let (source, target) = (self.source.clone()?, self.target.clone()?);
        self.rules = IgnoreRules::load(&source);
        Some(diff(&source, &target, &self.rules))
    }

    fn roots(&self) -> Result<(PathBuf, PathBuf), SyncError> {
        let source = self.source.clone().ok_or(SyncError::SourceNotSelected)?;
        let target = self.target.clone().ok_or(SyncError::TargetNotSelected)?;
        Ok((source, target))
    }

    /// Rescan both trees for a tree view
    pub fn states(&mut self) -> Result<DiffResult, SyncError> {
        self.roots()?;
        Ok(self.current_states().unwrap_or_default())
    }

    /// Check preconditions, reload `.ignore` and build the ordered plan
    pub fn prepare_plan(&mut self) -> Result<Plan, SyncError> {
        let (source, target) = self.roots()?;
        self.rules = IgnoreRules::load(&source);

        let plan = build_plan(&source, &target, &self.rules);
        let counts = plan.counts();
        debug!(
            "Plan prepared: {} added, {} updated, {} unchanged, {} deleted in source",
            counts.added, counts.updated, counts.unchanged, counts.deleted
        );
        Ok(plan)
    }

    /// Execute a confirmed plan on a blocking worker
    pub async fn run(
        &self,
        plan: Plan,
        progress: Option<mpsc::UnboundedSender<SyncProgress>>,
        cancel: Arc<AtomicBool>,
    ) -> Result<SyncSummary> {
        let (source, target) = self.roots()?;
        let total = plan.counts().actionable();
        let start_time = Instant::now();

        info!("Starting backup: {} -> {}", source.display(), target.display());

        if let Some(tx) = &progress {
            let _ = tx.send(SyncProgress::Started { total });
        }

        let worker_tx = progress.clone();
        let rules = self.rules.clone();
        let report = tokio::task::spawn_blocking(move || {
            Executor::new(source, target)
                .with_rules(rules)
                .with_cancel_flag(cancel)
                .run(&plan, |item| {
                    if let Some(tx) = &worker_tx {
                        let _ = tx.send(SyncProgress::Item(item));
                    }
                })
        })
        .await
        .context("Backup worker terminated unexpectedly")?;

        let mut summary = SyncSummary::from_report(total, report);
        summary.duration = start_time.elapsed();

        info!(
            "Backup completed in {:.2}s: {} added, {} updated, {} failed, {} deleted in source",
            summary.duration.as_secs_f64(),
            summary.added,
            summary.updated,
            summary.failed_operations,
            summary.deleted_in_source
        );

        if let Some(tx) = &progress {
            let status = if summary.cancelled {
                "Backup cancelled"
            } else {
                "Backup finished"
            };
            let _ = tx.send(SyncProgress::Status(status.to_string()));
            let _ = tx.send(SyncProgress::Finished(summary.clone()));
        }

        Ok(summary)
    }

    /// Prepare and execute without a confirmation step
    pub async fn sync_once(&mut self, cancel: Arc<AtomicBool>) -> Result<SyncSummary> {
        let plan = self.prepare_plan()?;
        self.run(plan, None, cancel).await
    }
}
