//! Executor - applies a backup plan to the target tree
//!
//! Only `Added` and `Updated` entries touch the filesystem. Before a file in
//! the target is overwritten it is archived next to itself as
//! `<stem>_<dd_MM_yyyy><ext>`, using the superseded file's own modification
//! date. Deletions are reported, never performed.
//!
//! Actions run strictly one after another. A shared cancellation flag is
//! checked between actions, never during a copy.

use crate::activity_log::{ActivityLog, ACTIVITY_LOG_FILE_NAME};
use crate::diff::{DiffResult, SyncState};
use crate::error::SyncError;
use crate::ignore::IgnoreRules;
use crate::plan::Plan;
use crate::scan::{scan, RelativePath};
use chrono::{DateTime, Local};
use filetime::FileTime;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Progress after one actionable entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub relative_path: RelativePath,
    pub state: SyncState,
    pub succeeded: bool,
}

/// What happened to the file that was about to be overwritten
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveOutcome {
    /// Nothing existed at the destination
    NothingToArchive,
    /// Renamed in place to the archived name
    Renamed(PathBuf),
    /// Rename was refused; the bytes were copied to the archived name
    Copied(PathBuf),
    /// The archived name was already taken; prior history left untouched
    Skipped(PathBuf),
}

/// Result of one execution run
#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    /// Live state map after the run, including the fresh deletion pass
    pub states: DiffResult,
    pub added: usize,
    pub updated: usize,
    /// Archived copies created during the run, relative to the target root
    pub archived: Vec<RelativePath>,
    /// Paths present in the target but no longer in the source
    pub deleted: Vec<RelativePath>,
    pub failures: Vec<(RelativePath, String)>,
    /// Every event line appended to the activity log, without timestamps
    pub events: Vec<String>,
    pub cancelled: bool,
    pub duration: Duration,
}

impl ExecutionReport {
    pub fn completed(&self) -> usize {
        self.added + self.updated + self.failures.len()
    }
}

/// Name an archived version of `path` last modified at `modified`
pub fn archived_name(path: &Path, modified: DateTime<Local>) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let name = format!("{}_{}{}", stem, modified.format("%d_%m_%Y"), extension);
    path.with_file_name(name)
}

/// Plan runner bound to one source/target pair
pub struct Executor {
    source_root: PathBuf,
    target_root: PathBuf,
    rules: IgnoreRules,
    cancel: Arc<AtomicBool>,
    write_log: bool,
    rename: RenameFn,
}

type RenameFn = fn(&Path, &Path) -> std::io::Result<()>;

fn rename_in_place(from: &Path, to: &Path) -> std::io::Result<()> {
    std::fs::rename(from, to)
}

impl Executor {
    pub fn new(source_root: impl Into<PathBuf>, target_root: impl Into<PathBuf>) -> Self {
        Self {
            source_root: source_root.into(),
            target_root: target_root.into(),
            rules: IgnoreRules::empty(),
            cancel: Arc::new(AtomicBool::new(false)),
            write_log: true,
            rename: rename_in_place,
        }
    }

    /// Rules the plan was built with; the deletion pass applies the same set
    pub fn with_rules(mut self, rules: IgnoreRules) -> Self {
        self.rules = rules;
        self
    }

    /// Share a cancellation flag with the host
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Skip writing `backup_log.txt`
    pub fn without_activity_log(mut self) -> Self {
        self.write_log = false;
        self
    }

    #[cfg(test)]
    fn with_rename(mut self, rename: RenameFn) -> Self {
        self.rename = rename;
        self
    }

    /// Apply `plan`, calling `on_progress` after every actionable entry
    pub fn run<F>(&self, plan: &Plan, mut on_progress: F) -> ExecutionReport
    where
        F: FnMut(Progress),
    {
        let start = Instant::now();
        let mut log = if self.write_log {
            ActivityLog::open(&self.target_root)
        } else {
            ActivityLog::disabled()
        };

        let mut report = ExecutionReport {
            states: plan.states(),
            ..Default::default()
        };

        let total = plan.counts().actionable();
        let mut completed = 0;

        info!(
            "Executing backup plan: {} actionable of {} entries",
            total,
            plan.len()
        );

        for action in plan.actionable() {
            if self.cancel.load(Ordering::SeqCst) {
                report.cancelled = true;
                break;
            }

            let path = &action.relative_path;
            let succeeded = match self.apply(path, action.state, &mut log, &mut report) {
                Ok(()) => {
                    match action.state {
                        SyncState::Added => report.added += 1,
                        _ => report.updated += 1,
                    }
                    report.states.insert(path.clone(), SyncState::Unchanged);
                    true
                }
                Err(e) => {
                    warn!("Failed to back up {}: {}", path, e);
                    let event = format!("Failed: {}: {}", path, e);
                    emit(&mut log, &mut report, event);
                    report.failures.push((path.clone(), e.to_string()));
                    false
                }
            };

            completed += 1;
            on_progress(Progress {
                completed,
                total,
                relative_path: path.clone(),
                state: action.state,
                succeeded,
            });

            // Give a host UI thread a chance to run between actions
            std::thread::yield_now();
        }

        if report.cancelled {
            let event = format!("Backup cancelled after {} of {} actions", completed, total);
            info!("{}", event);
            emit(&mut log, &mut report, event);
        } else {
            self.report_deletions(&mut log, &mut report);
        }

        if log.is_enabled() {
            debug!(
                "Wrote {} activity log lines to {}",
                log.lines_written(),
                log.path().display()
            );
        }
        log.close();
        report.duration = start.elapsed();

        info!(
            "Backup finished in {:.2}s: {} added, {} updated, {} failed, {} deleted in source",
            report.duration.as_secs_f64(),
            report.added,
            report.updated,
            report.failures.len(),
            report.deleted.len()
        );
        report
    }

    /// Copy one entry, archiving whatever currently sits at the destination
    fn apply(
        &self,
        path: &RelativePath,
        state: SyncState,
        log: &mut ActivityLog,
        report: &mut ExecutionReport,
    ) -> Result<(), SyncError> {
        let source = path.to_path(&self.source_root);
        let destination = path.to_path(&self.target_root);

        self.reject_linked_ancestors(path)?;
        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SyncError::fs(parent, e))?;
        }

        // Re-check the filesystem now; the plan may be stale
        let destination_exists =
            entry_exists(&destination).map_err(|e| SyncError::fs(&destination, e))?;

        if destination_exists {
            match archive_existing_with(&destination, self.rename)? {
                ArchiveOutcome::Renamed(archived) | ArchiveOutcome::Copied(archived) => {
                    if let Some(relative) = RelativePath::from_path(&self.target_root, &archived) {
                        let event = format!("Archived: {} -> {}", path, relative);
                        emit(log, report, event);
                        report.archived.push(relative);
                    }
                }
                ArchiveOutcome::Skipped(existing) => {
                    let event = format!(
                        "Archive skipped for {}: {} already exists",
                        path,
                        existing.display()
                    );
                    emit(log, report, event);
                }
                ArchiveOutcome::NothingToArchive => {}
            }
        }

        copy_preserving_mtime(&source, &destination)?;

        let event = match state {
            SyncState::Added => format!("Added: {}", path),
            _ => format!("Updated: {}", path),
        };
        debug!("{}", event);
        emit(log, report, event);
        Ok(())
    }

    /// Writing below a symlinked directory would land outside the target
    fn reject_linked_ancestors(&self, path: &RelativePath) -> Result<(), SyncError> {
        let mut ancestor = path.parent();
        while let Some(dir) = ancestor {
            let full = dir.to_path(&self.target_root);
            match std::fs::symlink_metadata(&full) {
                Ok(metadata) if metadata.file_type().is_symlink() => {
                    return Err(SyncError::fs(
                        &full,
                        std::io::Error::new(
                            std::io::ErrorKind::InvalidInput,
                            "target directory is a symbolic link",
                        ),
                    ));
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(SyncError::fs(&full, e)),
            }
            ancestor = dir.parent();
        }
        Ok(())
    }

    /// Fresh rescan of both trees; every target-only path is reported
    fn report_deletions(&self, log: &mut ActivityLog, report: &mut ExecutionReport) {
        let rules = &self.rules;
        let source: HashSet<RelativePath> = scan(&self.source_root).into_iter().collect();

        for path in scan(&self.target_root) {
            if source.contains(&path)
                || path.as_str() == ACTIVITY_LOG_FILE_NAME
                || rules.is_excluded(&path)
            {
                continue;
            }

            emit(log, report, format!("Deleted in source (kept in target): {}", path));
            report.states.insert(path.clone(), SyncState::Deleted);
            report.deleted.push(path);
        }
    }
}

fn emit(log: &mut ActivityLog, report: &mut ExecutionReport, event: String) {
    log.record(&event);
    report.events.push(event);
}

/// Existence check that does not follow symbolic links
fn entry_exists(path: &Path) -> std::io::Result<bool> {
    match std::fs::symlink_metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Move the file at `destination` out of the way under its archived name.
///
/// An existing archive with the same name is never overwritten. When the
/// rename is refused the bytes are copied instead and the original stays in
/// place to be overwritten. Only regular files are archived: a directory or
/// symbolic link at the destination is an error and is left untouched.
pub fn archive_existing(destination: &Path) -> Result<ArchiveOutcome, SyncError> {
    archive_existing_with(destination, rename_in_place)
}

fn archive_existing_with(
    destination: &Path,
    rename: RenameFn,
) -> Result<ArchiveOutcome, SyncError> {
    let metadata = match std::fs::symlink_metadata(destination) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ArchiveOutcome::NothingToArchive)
        }
        Err(e) => return Err(SyncError::fs(destination, e)),
    };

    if !metadata.file_type().is_file() {
        return Err(SyncError::fs(
            destination,
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "destination is not a regular file",
            ),
        ));
    }

    let modified = metadata
        .modified()
        .map_err(|e| SyncError::fs(destination, e))?;
    let archived = archived_name(destination, DateTime::<Local>::from(modified));

    match entry_exists(&archived) {
        Ok(true) => {
            let conflict = SyncError::RenameConflict {
                path: archived.clone(),
            };
            debug!("{}", conflict);
            return Ok(ArchiveOutcome::Skipped(archived));
        }
        Ok(false) => {}
        Err(e) => return Err(SyncError::fs(&archived, e)),
    }

    match rename(destination, &archived) {
        Ok(()) => Ok(ArchiveOutcome::Renamed(archived)),
        Err(source) => {
            let unsupported = SyncError::RenameUnsupported {
                from: destination.to_path_buf(),
                to: archived.clone(),
                source,
            };
            warn!("{}; falling back to copy", unsupported);
            copy_preserving_mtime(destination, &archived)?;
            Ok(ArchiveOutcome::Copied(archived))
        }
    }
}

/// Copy bytes and give the copy the source's modification time
fn copy_preserving_mtime(from: &Path, to: &Path) -> Result<(), SyncError> {
    let metadata = std::fs::metadata(from).map_err(|e| SyncError::fs(from, e))?;
    std::fs::copy(from, to).map_err(|e| SyncError::fs(to, e))?;
    filetime::set_file_mtime(to, FileTime::from_last_modification_time(&metadata))
        .map_err(|e| SyncError::fs(to, e))?;
    Ok(())
}

/// Run `plan` without a progress observer
pub fn execute(
    plan: &Plan,
    source_root: &Path,
    target_root: &Path,
    rules: &IgnoreRules,
) -> ExecutionReport {
    Executor::new(source_root, target_root)
        .with_rules(rules.clone())
        .run(plan, |_| {})
}
