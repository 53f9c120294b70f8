//! Plan Builder - ordered, reviewable list of backup actions
//!
//! The plan is the only input the executor acts on. It lists every path,
//! including unchanged ones, so a host can show a complete preview before
//! asking for confirmation.

use crate::diff::{diff, DiffResult, SyncState};
use crate::ignore::IgnoreRules;
use crate::scan::RelativePath;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Atomic unit of the execution plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupAction {
    pub relative_path: RelativePath,
    pub state: SyncState,
}

/// Per-state totals of a plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlanCounts {
    pub unchanged: usize,
    pub added: usize,
    pub updated: usize,
    pub deleted: usize,
}

impl PlanCounts {
    pub fn actionable(&self) -> usize {
        self.added + self.updated
    }

    pub fn total(&self) -> usize {
        self.unchanged + self.added + self.updated + self.deleted
    }
}

/// Ordered sequence of actions, one per distinct relative path
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Plan {
    actions: Vec<BackupAction>,
}

impl Plan {
    /// Build from a classification, sorted by ordinal path comparison
    pub fn from_diff(result: DiffResult) -> Self {
        let mut actions: Vec<BackupAction> = result
            .into_iter()
            .map(|(relative_path, state)| BackupAction {
                relative_path,
                state,
            })
            .collect();
        actions.sort_by(|a, b| a.relative_path.as_str().cmp(b.relative_path.as_str()));
        Self { actions }
    }

    pub fn actions(&self) -> &[BackupAction] {
        &self.actions
    }

    /// Entries that mutate the target, in plan order
    pub fn actionable(&self) -> impl Iterator<Item = &BackupAction> {
        self.actions.iter().filter(|action| action.state.is_actionable())
    }

    pub fn counts(&self) -> PlanCounts {
        let mut counts = PlanCounts::default();
        for action in &self.actions {
            match action.state {
                SyncState::Unchanged => counts.unchanged += 1,
                SyncState::Added => counts.added += 1,
                SyncState::Updated => counts.updated += 1,
                SyncState::Deleted => counts.deleted += 1,
            }
        }
        counts
    }

    /// True when running this plan would not touch the target
    pub fn is_noop(&self) -> bool {
        self.counts().actionable() == 0
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Current state map as seen by this plan
    pub fn states(&self) -> DiffResult {
        self.actions
            .iter()
            .map(|action| (action.relative_path.clone(), action.state))
            .collect()
    }
}

/// Classify both trees and materialize the ordered plan
pub fn build_plan(source_root: &Path, target_root: &Path, rules: &IgnoreRules) -> Plan {
    Plan::from_diff(diff(source_root, target_root, rules))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff_of(entries: &[(&str, SyncState)]) -> DiffResult {
        entries
            .iter()
            .map(|(path, state)| (RelativePath::new(path), *state))
            .collect()
    }

    #[test]
    fn test_plan_sorted_ordinally() {
        let plan = Plan::from_diff(diff_of(&[
            ("b.txt", SyncState::Added),
            ("B.txt", SyncState::Added),
            ("a/z.txt", SyncState::Updated),
            ("a.txt", SyncState::Unchanged),
        ]));

        let order: Vec<&str> = plan
            .actions()
            .iter()
            .map(|action| action.relative_path.as_str())
            .collect();
        assert_eq!(order, vec!["B.txt", "a.txt", "a/z.txt", "b.txt"]);
    }

    #[test]
    fn test_plan_includes_unchanged_and_deleted() {
        let plan = Plan::from_diff(diff_of(&[
            ("keep.txt", SyncState::Unchanged),
            ("old.log", SyncState::Deleted),
            ("new.txt", SyncState::Added),
        ]));

        assert_eq!(plan.len(), 3);
        let counts = plan.counts();
        assert_eq!(counts.unchanged, 1);
        assert_eq!(counts.deleted, 1);
        assert_eq!(counts.added, 1);
        assert_eq!(counts.actionable(), 1);
        assert_eq!(counts.total(), 3);
    }

    #[test]
    fn test_actionable_filters_observational_entries() {
        let plan = Plan::from_diff(diff_of(&[
            ("a", SyncState::Unchanged),
            ("b", SyncState::Added),
            ("c", SyncState::Deleted),
            ("d", SyncState::Updated),
        ]));

        let actionable: Vec<&str> = plan
            .actionable()
            .map(|action| action.relative_path.as_str())
            .collect();
        assert_eq!(actionable, vec!["b", "d"]);
        assert!(!plan.is_noop());
    }

    #[test]
    fn test_empty_plan_is_noop() {
        let plan = Plan::default();
        assert!(plan.is_empty());
        assert!(plan.is_noop());
    }

    #[test]
    fn test_plan_serializes_for_preview() {
        let plan = Plan::from_diff(diff_of(&[("a.txt", SyncState::Added)]));
        let json = serde_json::to_string(plan.actions()).unwrap();
        assert_eq!(json, r#"[{"relative_path":"a.txt","state":"Added"}]"#);
    }
}
