//! Tree Scanner - enumerates regular files under a root
//!
//! Every file is identified by a [`RelativePath`]: root-relative, `/`-separated,
//! compared case-sensitively. Directories are never returned; they are implied
//! by path prefixes. Symbolic links are not followed and not reported.

use filetime::FileTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Forward-slash normalized, root-relative file path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelativePath(String);

impl RelativePath {
    /// Normalize a path string: backslashes become `/`, `.` and empty
    /// segments are dropped, leading separators are stripped.
    pub fn new(path: &str) -> Self {
        let normalized = path
            .replace('\\', "/")
            .split('/')
            .filter(|segment| !segment.is_empty() && *segment != ".")
            .collect::<Vec<_>>()
            .join("/");
        Self(normalized)
    }

    /// Build from an absolute path below `root`. Returns `None` when `path`
    /// is not under `root` or is not valid UTF-8.
    pub fn from_path(root: &Path, path: &Path) -> Option<Self> {
        let relative = path.strip_prefix(root).ok()?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => segments.push(segment.to_str()?),
                Component::CurDir => {}
                _ => return None,
            }
        }

        if segments.is_empty() {
            return None;
        }
        Some(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve against a root directory using native separators
    pub fn to_path(&self, root: &Path) -> PathBuf {
        let mut path = root.to_path_buf();
        for segment in self.0.split('/') {
            path.push(segment);
        }
        path
    }

    /// Parent directory, `None` for files directly under the root
    pub fn parent(&self) -> Option<RelativePath> {
        self.0
            .rfind('/')
            .map(|idx| RelativePath(self.0[..idx].to_string()))
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RelativePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RelativePath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// One scanned file. Rebuilt on every scan, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub relative_path: RelativePath,
    /// Always `false` for scan output; directory records are only synthesized
    /// by presentation layers
    pub is_directory: bool,
    /// Last modification time in milliseconds since the Unix epoch
    pub last_modified_ms: i64,
}

/// Modification time of `metadata` at millisecond granularity
pub fn modified_millis(metadata: &std::fs::Metadata) -> i64 {
    let mtime = FileTime::from_last_modification_time(metadata);
    mtime.unix_seconds() * 1000 + i64::from(mtime.nanoseconds() / 1_000_000)
}

/// Enumerate all regular files under `root`, sorted by relative path.
///
/// A missing root yields an empty list so the tool stays usable before a
/// valid target has been chosen. Unreadable entries are skipped with a warning.
pub fn scan_records(root: &Path) -> Vec<FileRecord> {
    if !root.is_dir() {
        debug!("Scan root does not exist or is not a directory: {}", root.display());
        return Vec::new();
    }

    let mut records = Vec::new();

    for entry in WalkDir::new(root).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let Some(relative_path) = RelativePath::from_path(root, entry.path()) else {
            warn!("Skipping path that cannot be normalized: {}", entry.path().display());
            continue;
        };

        let metadata = match entry.metadata() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Failed to read metadata for {}: {}", entry.path().display(), e);
                continue;
            }
        };

        records.push(FileRecord {
            relative_path,
            is_directory: false,
            last_modified_ms: modified_millis(&metadata),
        });
    }

    records.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    debug!("Scanned {} files under {}", records.len(), root.display());
    records
}

/// Enumerate all regular files under `root` as relative paths
pub fn scan(root: &Path) -> Vec<RelativePath> {
    scan_records(root)
        .into_iter()
        .map(|record| record.relative_path)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_relative_path_normalization() {
        assert_eq!(RelativePath::new("a\\b\\c.txt").as_str(), "a/b/c.txt");
        assert_eq!(RelativePath::new("/a//b/./c.txt").as_str(), "a/b/c.txt");
        assert_eq!(RelativePath::new("./a.txt").as_str(), "a.txt");
    }

    #[test]
    fn test_relative_path_is_case_sensitive() {
        assert_ne!(RelativePath::new("Readme.md"), RelativePath::new("README.md"));
    }

    #[test]
    fn test_relative_path_parts() {
        let path = RelativePath::new("docs/guide/intro.md");
        assert_eq!(path.parent(), Some(RelativePath::new("docs/guide")));
        assert_eq!(RelativePath::new("top.txt").parent(), None);

        let root = Path::new("/backup");
        assert_eq!(path.to_path(root), root.join("docs").join("guide").join("intro.md"));
    }

    #[test]
    fn test_from_path_rejects_outside_root() {
        let root = Path::new("/data/src");
        assert_eq!(
            RelativePath::from_path(root, Path::new("/data/src/a/b.txt")),
            Some(RelativePath::new("a/b.txt"))
        );
        assert_eq!(RelativePath::from_path(root, Path::new("/data/other/b.txt")), None);
        assert_eq!(RelativePath::from_path(root, root), None);
    }

    #[test]
    fn test_scan_returns_only_files_recursively() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();
        fs::write(root.join("top.txt"), "top").unwrap();
        fs::write(root.join("a/b/c/deep.txt"), "deep").unwrap();
        fs::write(root.join("a/mid.txt"), "mid").unwrap();

        let paths = scan(root);
        assert_eq!(
            paths,
            vec![
                RelativePath::new("a/b/c/deep.txt"),
                RelativePath::new("a/mid.txt"),
                RelativePath::new("top.txt"),
            ]
        );
    }

    #[test]
    fn test_scan_missing_root_is_empty() {
        let temp_dir = TempDir::new().unwrap();
        assert!(scan(&temp_dir.path().join("not-there")).is_empty());
    }

    #[test]
    fn test_scan_records_carry_millisecond_mtime() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("stamp.txt");
        fs::write(&file, "x").unwrap();
        filetime::set_file_mtime(&file, FileTime::from_unix_time(1_700_000_000, 123_456_789))
            .unwrap();

        let records = scan_records(temp_dir.path());
        assert_eq!(records.len(), 1);
        assert!(!records[0].is_directory);
        assert_eq!(records[0].last_modified_ms, 1_700_000_000_123);
    }

    #[cfg(unix)]
    #[test]
    fn test_scan_does_not_follow_symlinks() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("secret.txt"), "s").unwrap();
        fs::write(temp_dir.path().join("real.txt"), "r").unwrap();
        std::os::unix::fs::symlink(outside.path(), temp_dir.path().join("linked_dir")).unwrap();
        std::os::unix::fs::symlink(
            temp_dir.path().join("real.txt"),
            temp_dir.path().join("linked.txt"),
        )
        .unwrap();

        let paths = scan(temp_dir.path());
        assert_eq!(paths, vec![RelativePath::new("real.txt")]);
    }
}
