//! mirrorkeep - One-way, version-preserving directory backup
//!
//! mirrorkeep mirrors a source directory tree into a target directory. Files
//! that changed since the last run are never overwritten: the previous copy
//! is renamed to a date-stamped archive first. Files removed from the source
//! are only reported.
//!
//! ## Core Features
//!
//! - **Exclusion Rules**: gitignore-like `.ignore` file in the source root
//! - **Timestamp Diffing**: modification times decide what changed
//! - **Versioned Updates**: superseded files kept as `<stem>_<dd_MM_yyyy>.<ext>`
//! - **Activity Log**: every run appends to `backup_log.txt` in the target
//! - **Configuration Management**: YAML-based configuration with XDG compliance
//!
//! ## Modules
//!
//! - [`ignore`]: exclusion rule compilation and matching
//! - [`scan`]: tree scanning and relative paths
//! - [`diff`]: per-path sync state classification
//! - [`plan`]: ordered backup plans
//! - [`executor`]: conflict-safe plan execution
//! - [`sync`]: the engine that ties selection, planning and execution together

pub mod activity_log;
pub mod config;
pub mod diff;
pub mod error;
pub mod executor;
pub mod health;
pub mod ignore;
pub mod plan;
pub mod scan;
pub mod sync;
pub mod watch;

pub use config::Config;
pub use diff::{DiffResult, SyncState};
pub use error::SyncError;
pub use executor::{ExecutionReport, Executor, Progress};
pub use health::HealthCheck;
pub use ignore::{IgnoreRule, IgnoreRules};
pub use plan::{BackupAction, Plan, PlanCounts};
pub use scan::{FileRecord, RelativePath};
pub use sync::{SyncEngine, SyncProgress, SyncSummary};
pub use watch::Watcher;
