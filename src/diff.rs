//! Diff Engine - classifies every relevant path of a source/target pair

use crate::activity_log::ACTIVITY_LOG_FILE_NAME;
use crate::ignore::IgnoreRules;
use crate::scan::{scan_records, FileRecord, RelativePath};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::Path;
use tracing::{debug, warn};

/// Synchronization state of one relative path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncState {
    /// Present in both trees with identical modification times
    Unchanged,
    /// Present in source only
    Added,
    /// Present in both trees with differing modification times
    Updated,
    /// Present in target only. Reported, never removed.
    Deleted,
}

impl SyncState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Unchanged => "Unchanged",
            SyncState::Added => "Added",
            SyncState::Updated => "Updated",
            SyncState::Deleted => "Deleted",
        }
    }

    /// Only Added and Updated entries mutate the target
    pub fn is_actionable(&self) -> bool {
        matches!(self, SyncState::Added | SyncState::Updated)
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `RelativePath -> SyncState`, ordered by path
pub type DiffResult = BTreeMap<RelativePath, SyncState>;

/// Scan both roots and classify every path that is not excluded.
///
/// Excluded paths are left out entirely: they are neither copied nor
/// reported as deleted, on either side.
pub fn diff(source_root: &Path, target_root: &Path, rules: &IgnoreRules) -> DiffResult {
    let source = scan_records(source_root);
    let target = scan_records(target_root);
    classify(&source, &target, rules)
}

/// Classify two already-scanned file lists
pub fn classify(source: &[FileRecord], target: &[FileRecord], rules: &IgnoreRules) -> DiffResult {
    let target_index: HashMap<&RelativePath, i64> = target
        .iter()
        .map(|record| (&record.relative_path, record.last_modified_ms))
        .collect();

    let mut result = DiffResult::new();
    let mut excluded = 0usize;

    for record in source {
        if is_tool_artifact(&record.relative_path) {
            warn!(
                "Skipping {}: the name is reserved for the activity log in the target",
                record.relative_path
            );
            continue;
        }
        if rules.is_excluded(&record.relative_path) {
            excluded += 1;
            continue;
        }

        let state = match target_index.get(&record.relative_path) {
            None => SyncState::Added,
            Some(&target_ms) if target_ms == record.last_modified_ms => SyncState::Unchanged,
            Some(_) => SyncState::Updated,
        };
        result.insert(record.relative_path.clone(), state);
    }

    let source_paths: HashSet<&RelativePath> =
        source.iter().map(|record| &record.relative_path).collect();

    for record in target {
        let path = &record.relative_path;
        if source_paths.contains(path) || is_tool_artifact(path) {
            continue;
        }
        if rules.is_excluded(path) {
            excluded += 1;
            continue;
        }
        result.insert(path.clone(), SyncState::Deleted);
    }

    debug!(
        "Diff classified {} paths ({} excluded)",
        result.len(),
        excluded
    );
    result
}

/// Files the tool itself writes into the target root. Never planned from
/// either side.
fn is_tool_artifact(path: &RelativePath) -> bool {
    path.as_str() == ACTIVITY_LOG_FILE_NAME
}

/// Number of entries per state
pub fn count_states<'a>(states: impl IntoIterator<Item = &'a SyncState>) -> HashMap<SyncState, usize> {
    let mut counts = HashMap::new();
    for state in states {
        *counts.entry(*state).or_insert(0) += 1;
    }
    counts
}
