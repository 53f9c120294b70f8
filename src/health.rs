//! System health checks for mirrorkeep
//!
//! Preflight checks that verify both roots are usable before a backup runs.

use crate::ignore::{IgnoreRules, IGNORE_FILE_NAME};
use std::path::Path;

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Source directory status
    pub source: CheckResult,
    /// Target directory status
    pub target: CheckResult,
    /// Exclusion file status (warning only)
    pub ignore_file: CheckResult,
    /// Whether the target accepts writes
    pub target_writable: CheckResult,
}

/// Result of an individual health check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
    pub is_warning: bool,
}

impl CheckResult {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    fn ok_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn warning_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: true,
        }
    }
}

impl HealthCheck {
    /// Run all health checks against the selected roots
    pub fn run(source: Option<&Path>, target: Option<&Path>) -> Self {
        Self {
            source: Self::check_source(source),
            target: Self::check_target(target),
            ignore_file: Self::check_ignore_file(source),
            target_writable: Self::check_target_writable(target),
        }
    }

    /// Check if all required checks passed (excludes warnings)
    pub fn all_passed(&self) -> bool {
        self.source.passed && self.target.passed && self.target_writable.passed
    }

    /// Get list of failed checks (errors only, not warnings)
    pub fn errors(&self) -> Vec<&CheckResult> {
        self.results()
            .into_iter()
            .filter(|r| !r.passed && !r.is_warning)
            .collect()
    }

    /// Get list of warnings
    pub fn warnings(&self) -> Vec<&CheckResult> {
        self.results()
            .into_iter()
            .filter(|r| r.is_warning)
            .collect()
    }

    fn results(&self) -> [&CheckResult; 4] {
        [
            &self.source,
            &self.target,
            &self.ignore_file,
            &self.target_writable,
        ]
    }

    fn check_source(source: Option<&Path>) -> CheckResult {
        match source {
            None => CheckResult::error_with_details(
                "No source directory selected",
                "Pass --source <dir> or run: mirrorkeep init --source <dir>",
            ),
            Some(path) if path.is_dir() => {
                CheckResult::ok_with_details("Source directory exists", path.display().to_string())
            }
            Some(path) => CheckResult::error_with_details(
                "Source directory does not exist",
                path.display().to_string(),
            ),
        }
    }

    /// The target may be missing as long as it can be created
    fn check_target(target: Option<&Path>) -> CheckResult {
        match target {
            None => CheckResult::error_with_details(
                "No target directory selected",
                "Pass --target <dir> or run: mirrorkeep init --target <dir>",
            ),
            Some(path) if path.is_dir() => {
                CheckResult::ok_with_details("Target directory exists", path.display().to_string())
            }
            Some(path) if path.exists() => CheckResult::error_with_details(
                "Target path is not a directory",
                path.display().to_string(),
            ),
            Some(path) => match path.parent() {
                Some(parent) if parent.is_dir() => CheckResult::ok_with_details(
                    "Target directory will be created on first backup",
                    path.display().to_string(),
                ),
                _ => CheckResult::error_with_details(
                    "Target directory and its parent do not exist",
                    format!("Run: mkdir -p {}", path.display()),
                ),
            },
        }
    }

    /// Check the exclusion file (warning only)
    fn check_ignore_file(source: Option<&Path>) -> CheckResult {
        let Some(source) = source.filter(|p| p.is_dir()) else {
            return CheckResult::ok("No exclusion file to check");
        };

        if !source.join(IGNORE_FILE_NAME).exists() {
            return CheckResult::ok_with_details(
                "No exclusion file",
                format!("Create {} in the source to exclude paths", IGNORE_FILE_NAME),
            );
        }

        let rules = IgnoreRules::load(source);
        if rules.skipped().is_empty() {
            CheckResult::ok(format!("{} rules loaded", rules.len()))
        } else {
            CheckResult::warning_with_details(
                format!(
                    "{} rules loaded, {} invalid rules skipped",
                    rules.len(),
                    rules.skipped().len()
                ),
                rules.skipped().join("\n"),
            )
        }
    }

    /// Create and remove a scratch file in the target
    fn check_target_writable(target: Option<&Path>) -> CheckResult {
        let Some(target) = target else {
            return CheckResult::error("No target directory selected");
        };

        if !target.is_dir() {
            // Covered by check_target; nothing to write into yet
            return CheckResult::ok("Target not created yet");
        }

        let scratch = target.join(".mirrorkeep-write-test");
        match std::fs::write(&scratch, b"write test") {
            Ok(()) => {
                let _ = std::fs::remove_file(&scratch);
                CheckResult::ok("Target directory is writable")
            }
            Err(e) => CheckResult::error_with_details("Target directory is not writable", e.to_string()),
        }
    }

    /// Get all checks as a slice for iteration
    pub fn all_checks(&self) -> [(&'static str, &CheckResult); 4] {
        [
            ("Source Directory", &self.source),
            ("Target Directory", &self.target),
            ("Exclusion File", &self.ignore_file),
            ("Target Permissions", &self.target_writable),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_check_result_warning_with_details() {
        let result = CheckResult::warning_with_details("Test warning", "Warning details");
        assert!(result.passed);
        assert!(result.is_warning);
        assert_eq!(result.details, Some("Warning details".to_string()));
    }

    #[test]
    fn test_check_result_error() {
        let result = CheckResult::error("Test failed");
        assert!(!result.passed);
        assert!(!result.is_warning);
    }

    #[test]
    fn test_missing_selection_fails() {
        let health = HealthCheck::run(None, None);
        assert!(!health.all_passed());
        assert_eq!(health.errors().len(), 3);
    }

    #[test]
    fn test_existing_roots_pass() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();

        let health = HealthCheck::run(Some(source.path()), Some(target.path()));
        assert!(health.all_passed());
        assert!(health.warnings().is_empty());
        assert!(!target.path().join(".mirrorkeep-write-test").exists());
    }

    #[test]
    fn test_creatable_target_passes() {
        let source = TempDir::new().unwrap();
        let parent = TempDir::new().unwrap();

        let health = HealthCheck::run(Some(source.path()), Some(&parent.path().join("new")));
        assert!(health.all_passed());
    }

    #[test]
    fn test_target_without_parent_fails() {
        let source = TempDir::new().unwrap();
        let parent = TempDir::new().unwrap();
        let deep = parent.path().join("a/b/c");

        let health = HealthCheck::run(Some(source.path()), Some(&deep));
        assert!(!health.target.passed);
        assert!(health.target.details.as_deref().unwrap().contains("mkdir -p"));
    }

    #[test]
    fn test_invalid_ignore_rules_warn() {
        let source = TempDir::new().unwrap();
        let target = TempDir::new().unwrap();
        std::fs::write(source.path().join(IGNORE_FILE_NAME), "*.tmp\n[broken\n").unwrap();

        let health = HealthCheck::run(Some(source.path()), Some(target.path()));
        assert!(health.all_passed());
        assert_eq!(health.warnings().len(), 1);
        assert!(health.ignore_file.details.as_deref().unwrap().contains("[broken"));
    }

    #[test]
    fn test_all_checks_returns_all_four() {
        let health = HealthCheck::run(None, None);
        let checks = health.all_checks();
        assert_eq!(checks.len(), 4);
        assert_eq!(checks[0].0, "Source Directory");
        assert_eq!(checks[3].0, "Target Permissions");
    }
}
