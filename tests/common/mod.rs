//! Common test utilities and helpers for mirrorkeep tests

#![allow(dead_code)]

use assert_fs::fixture::ChildPath;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use chrono::{Local, TimeZone};
use filetime::{set_file_mtime, FileTime};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Source and target trees plus a private config file
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub source: ChildPath,
    pub target: ChildPath,
    pub config_path: PathBuf,
}

impl TestEnvironment {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let source = temp_dir.child("source");
        let target = temp_dir.child("target");
        source.create_dir_all().expect("Failed to create source dir");
        target.create_dir_all().expect("Failed to create target dir");
        let config_path = temp_dir.path().join("config").join("config.yml");

        Self {
            temp_dir,
            source,
            target,
            config_path,
        }
    }

    /// Write a source file with the given modification time
    pub fn write_source(&self, rel: &str, content: &str, mtime: i64) -> PathBuf {
        write_with_mtime(&self.source, rel, content, mtime)
    }

    /// Write a target file with the given modification time
    pub fn write_target(&self, rel: &str, content: &str, mtime: i64) -> PathBuf {
        write_with_mtime(&self.target, rel, content, mtime)
    }

    pub fn create_test_config(&self, content: &str) -> PathBuf {
        std::fs::create_dir_all(self.config_path.parent().unwrap())
            .expect("Failed to create config dir");
        std::fs::write(&self.config_path, content).expect("Failed to write test config");
        self.config_path.clone()
    }

    /// Config pointing at both trees with confirmation disabled
    pub fn create_minimal_config(&self) -> PathBuf {
        let config_content = format!(
            r#"
source_directory: "{}"
target_directory: "{}"
sync:
  confirm: false
logging:
  level: "warn"
  color: false
"#,
            self.source.path().display(),
            self.target.path().display()
        );
        self.create_test_config(&config_content)
    }

    /// Run the built binary with this environment's config file
    pub fn run_cli(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_mirrorkeep"))
            .arg("--config")
            .arg(&self.config_path)
            .args(args)
            .env("XDG_CONFIG_HOME", self.temp_dir.path())
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to execute mirrorkeep")
    }
}

fn write_with_mtime(root: &ChildPath, rel: &str, content: &str, mtime: i64) -> PathBuf {
    let child = root.child(rel);
    if let Some(parent) = child.path().parent() {
        std::fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    child.write_str(content).expect("Failed to write test file");
    set_file_mtime(child.path(), FileTime::from_unix_time(mtime, 0)).expect("Failed to set mtime");
    child.path().to_path_buf()
}

/// Unix seconds for noon local time on the given day
pub fn local_noon(year: i32, month: u32, day: u32) -> i64 {
    Local
        .with_ymd_and_hms(year, month, day, 12, 0, 0)
        .single()
        .expect("Ambiguous local time")
        .timestamp()
}

pub fn mtime_secs(path: &Path) -> i64 {
    let metadata = std::fs::metadata(path).expect("Failed to stat file");
    FileTime::from_last_modification_time(&metadata).unix_seconds()
}
