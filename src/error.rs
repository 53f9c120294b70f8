//! Error taxonomy for the synchronization engine.
//!
//! Only the two selection preconditions ever stop a run. Everything else is
//! recovered where it happens and surfaces as a warning or a report entry.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    /// An exclusion rule that could not be compiled. The rule is skipped.
    #[error("Invalid ignore pattern '{rule}': {reason}")]
    InvalidPattern { rule: String, reason: String },

    /// Missing root, permission denial or a failed existence check.
    #[error("Filesystem access failed for {}: {source}", path.display())]
    FilesystemAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The archived name for a superseded file is already taken.
    #[error("Archive target already exists: {}", path.display())]
    RenameConflict { path: PathBuf },

    /// The filesystem refused the archive rename (cross-device, locked file).
    #[error("Cannot rename {} to {}: {source}", from.display(), to.display())]
    RenameUnsupported {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("No source directory selected")]
    SourceNotSelected,

    #[error("No target directory selected")]
    TargetNotSelected,
}

impl SyncError {
    pub(crate) fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SyncError::FilesystemAccess {
            path: path.into(),
            source,
        }
    }

    /// Whether this error is one of the precondition failures that
    /// short-circuit a run before any work begins.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            SyncError::SourceNotSelected | SyncError::TargetNotSelected
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precondition_classification() {
        assert!(SyncError::SourceNotSelected.is_precondition());
        assert!(SyncError::TargetNotSelected.is_precondition());
        assert!(!SyncError::RenameConflict {
            path: PathBuf::from("a_01_01_2024.txt")
        }
        .is_precondition());
    }

    #[test]
    fn test_error_messages() {
        let err = SyncError::InvalidPattern {
            rule: "[abc".to_string(),
            reason: "unterminated character class".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Invalid ignore pattern '[abc': unterminated character class"
        );

        let err = SyncError::fs(
            "/missing",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(err.to_string().contains("/missing"));
    }
}
