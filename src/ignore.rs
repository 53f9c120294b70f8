//! Pattern Matcher - gitignore-like exclusion rules
//!
//! Rules are read from `<source>/.ignore`, compiled to `globset` matchers
//! and evaluated in file order. The last matching rule decides:
//! a plain rule excludes, a `!` rule re-includes.
//!
//! Supported syntax:
//! - `*` matches anything except `/`
//! - `**` matches anything including `/`
//! - `?` matches a single character except `/`
//! - `[abc]`, `[a-z]`, `[!abc]` character classes, `{a,b}` alternatives
//! - a trailing `/` means "this directory and everything beneath it"
//! - a rule without an inner `/` matches at any depth, otherwise it is
//!   anchored at the source root

use crate::error::SyncError;
use crate::scan::RelativePath;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::{debug, warn};

/// Name of the exclusion file looked up in the source root
pub const IGNORE_FILE_NAME: &str = ".ignore";

/// A single compiled exclusion rule
#[derive(Debug, Clone)]
pub struct IgnoreRule {
    /// The rule as written, after trimming
    pub raw_text: String,
    /// `true` for `!` rules that re-include a previously excluded path
    pub is_negation: bool,
    glob: String,
    compiled: GlobSet,
}

impl IgnoreRule {
    /// Compile one rule line. Blank lines and comments are not rules; callers
    /// filter those out (see [`IgnoreRules::parse`]).
    pub fn compile(rule_text: &str) -> Result<Self, SyncError> {
        let raw_text = rule_text.trim().to_string();

        let (is_negation, body) = match raw_text.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, raw_text.as_str()),
        };

        let normalized = body.replace('\\', "/");
        let (glob, compiled) =
            compile_pattern(&normalized).map_err(|reason| SyncError::InvalidPattern {
                rule: raw_text.clone(),
                reason,
            })?;

        Ok(Self {
            raw_text,
            is_negation,
            glob,
            compiled,
        })
    }

    /// Whether this rule's pattern matches the path (ignoring polarity)
    pub fn matches(&self, path: &RelativePath) -> bool {
        self.compiled.is_match(path.as_str())
    }

    /// The globs this rule compiled to, joined with ` | `
    pub fn pattern(&self) -> &str {
        &self.glob
    }
}

/// Ordered rule set loaded from one exclusion file
#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    rules: Vec<IgnoreRule>,
    skipped: Vec<String>,
}

impl IgnoreRules {
    /// An empty rule set: nothing is excluded
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse the text of an exclusion file.
    ///
    /// Lines that fail to compile are skipped with a warning and kept in
    /// [`IgnoreRules::skipped`]; they never stop the remaining lines from loading.
    pub fn parse(content: &str) -> Self {
        let mut rules = Vec::new();
        let mut skipped = Vec::new();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            match IgnoreRule::compile(line) {
                Ok(rule) => {
                    debug!("Compiled ignore rule '{}' -> {}", rule.raw_text, rule.pattern());
                    rules.push(rule);
                }
                Err(e) => {
                    warn!("Skipping ignore rule: {}", e);
                    skipped.push(e.to_string());
                }
            }
        }

        Self { rules, skipped }
    }

    /// Load `<source_root>/.ignore`. A missing file means zero exclusions.
    pub fn load(source_root: &Path) -> Self {
        let path = source_root.join(IGNORE_FILE_NAME);

        match std::fs::read_to_string(&path) {
            Ok(content) => {
                let rules = Self::parse(&content);
                debug!(
                    "Loaded {} ignore rules from {} ({} skipped)",
                    rules.len(),
                    path.display(),
                    rules.skipped.len()
                );
                rules
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::empty(),
            Err(e) => {
                warn!("{}", SyncError::fs(&path, e));
                Self::empty()
            }
        }
    }

    /// Evaluate every rule in order; the last match wins. No match means included.
    pub fn is_excluded(&self, path: &RelativePath) -> bool {
        let mut excluded = false;
        for rule in &self.rules {
            if rule.matches(path) {
                excluded = !rule.is_negation;
            }
        }
        excluded
    }

    pub fn rules(&self) -> &[IgnoreRule] {
        &self.rules
    }

    /// Messages for the rules that failed to compile
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Free-function form of [`IgnoreRules::is_excluded`]
pub fn is_excluded(path: &RelativePath, rules: &IgnoreRules) -> bool {
    rules.is_excluded(path)
}

/// Build the glob set for one normalized rule body.
///
/// Only anchoring and the trailing `/` are rewritten here; the glob syntax
/// itself is left to `globset`.
fn compile_pattern(glob: &str) -> Result<(String, GlobSet), String> {
    let mut body = glob;

    let dir_only = body.ends_with('/');
    if dir_only {
        body = body.trim_end_matches('/');
    }

    let rooted = body.starts_with('/');
    if rooted {
        body = body.trim_start_matches('/');
    }

    if body.is_empty() {
        return Err("pattern is empty".to_string());
    }

    let anchored = rooted || body.contains('/');
    let base = if anchored {
        body.to_string()
    } else {
        format!("**/{}", body)
    };

    // A matched directory covers everything beneath it
    let beneath = format!("{}/**", base);
    let globs = if dir_only {
        vec![beneath]
    } else {
        vec![base, beneath]
    };

    let mut builder = GlobSetBuilder::new();
    for pattern in &globs {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .backslash_escape(false)
            .build()
            .map_err(|e| e.to_string())?;
        builder.add(glob);
    }
    let set = builder.build().map_err(|e| e.to_string())?;

    Ok((globs.join(" | "), set))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rel(s: &str) -> RelativePath {
        RelativePath::new(s)
    }

    #[test]
    fn test_last_match_wins_with_negation() {
        let rules = IgnoreRules::parse("*.tmp\n!keep.tmp\n");

        assert!(rules.is_excluded(&rel("a.tmp")));
        assert!(!rules.is_excluded(&rel("keep.tmp")));
        assert!(!rules.is_excluded(&rel("a.txt")));
    }

    #[test]
    fn test_later_rule_overrides_negation() {
        let rules = IgnoreRules::parse("*.tmp\n!keep.tmp\nkeep.tmp\n");
        assert!(rules.is_excluded(&rel("keep.tmp")));
    }

    #[test]
    fn test_comments_and_blank_lines_skipped() {
        let rules = IgnoreRules::parse("# build output\n\n   \n  # indented comment\nbuild/\n");
        assert_eq!(rules.len(), 1);
        assert_eq!(rules.rules()[0].raw_text, "build/");
    }

    #[test]
    fn test_trailing_separator_covers_directory_tree() {
        let rules = IgnoreRules::parse("build/");

        assert!(rules.is_excluded(&rel("build/out.o")));
        assert!(rules.is_excluded(&rel("build/deep/nested/out.o")));
        assert!(rules.is_excluded(&rel("sub/build/out.o")));
        // A file named like the directory is not covered
        assert!(!rules.is_excluded(&rel("build")));
        assert!(!rules.is_excluded(&rel("builder/out.o")));
    }

    #[test]
    fn test_backslashes_normalized() {
        let rules = IgnoreRules::parse("logs\\archive\\");
        assert!(rules.is_excluded(&rel("logs/archive/2024.log")));
        assert!(!rules.is_excluded(&rel("logs/current.log")));
    }

    #[test]
    fn test_single_star_stays_within_segment() {
        let rules = IgnoreRules::parse("docs/*.md");

        assert!(rules.is_excluded(&rel("docs/readme.md")));
        assert!(!rules.is_excluded(&rel("docs/guide/intro.md")));
        assert!(!rules.is_excluded(&rel("other/docs/readme.md")));
    }

    #[test]
    fn test_double_star_crosses_segments() {
        let rules = IgnoreRules::parse("docs/**/*.md");

        assert!(rules.is_excluded(&rel("docs/readme.md")));
        assert!(rules.is_excluded(&rel("docs/guide/intro.md")));
        assert!(rules.is_excluded(&rel("docs/a/b/c.md")));
        assert!(!rules.is_excluded(&rel("docs/a/b/c.txt")));
    }

    #[test]
    fn test_unanchored_rule_matches_any_depth() {
        let rules = IgnoreRules::parse("*.log\nnode_modules");

        assert!(rules.is_excluded(&rel("app.log")));
        assert!(rules.is_excluded(&rel("var/app.log")));
        assert!(rules.is_excluded(&rel("web/node_modules/react/index.js")));
    }

    #[test]
    fn test_leading_slash_anchors_to_root() {
        let rules = IgnoreRules::parse("/todo.txt");

        assert!(rules.is_excluded(&rel("todo.txt")));
        assert!(!rules.is_excluded(&rel("notes/todo.txt")));
    }

    #[test]
    fn test_question_mark_and_classes() {
        let rules = IgnoreRules::parse("file?.txt\nimg[0-9].png\nv[!a].bin");

        assert!(rules.is_excluded(&rel("file1.txt")));
        assert!(!rules.is_excluded(&rel("file10.txt")));
        assert!(rules.is_excluded(&rel("img7.png")));
        assert!(!rules.is_excluded(&rel("imgx.png")));
        assert!(rules.is_excluded(&rel("vb.bin")));
        assert!(!rules.is_excluded(&rel("va.bin")));
    }

    #[test]
    fn test_special_characters_are_literal() {
        let rules = IgnoreRules::parse("a+b(1).txt");

        assert!(rules.is_excluded(&rel("a+b(1).txt")));
        assert!(!rules.is_excluded(&rel("aab1.txt")));
    }

    #[test]
    fn test_alternatives() {
        let rules = IgnoreRules::parse("*.{jpg,png}");

        assert!(rules.is_excluded(&rel("photos/a.jpg")));
        assert!(rules.is_excluded(&rel("b.png")));
        assert!(!rules.is_excluded(&rel("c.gif")));
    }

    #[test]
    fn test_rule_globs_follow_anchoring() {
        assert_eq!(
            IgnoreRule::compile("*.log").unwrap().pattern(),
            "**/*.log | **/*.log/**"
        );
        assert_eq!(IgnoreRule::compile("/build/").unwrap().pattern(), "build/**");
        assert_eq!(
            IgnoreRule::compile("docs/*.md").unwrap().pattern(),
            "docs/*.md | docs/*.md/**"
        );
    }

    #[test]
    fn test_invalid_rule_skipped_without_aborting() {
        let rules = IgnoreRules::parse("[abc\n*.tmp\n[z-a]\n!keep.tmp");

        assert_eq!(rules.len(), 2);
        assert_eq!(rules.skipped().len(), 2);
        assert!(rules.is_excluded(&rel("x.tmp")));
        assert!(!rules.is_excluded(&rel("keep.tmp")));
    }

    #[test]
    fn test_compile_reports_invalid_pattern() {
        let err = IgnoreRule::compile("[abc").unwrap_err();
        match err {
            SyncError::InvalidPattern { rule, .. } => assert_eq!(rule, "[abc"),
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(IgnoreRule::compile("!").is_err());
    }

    #[test]
    fn test_negation_flag() {
        let rule = IgnoreRule::compile("  !keep.tmp  ").unwrap();
        assert!(rule.is_negation);
        assert_eq!(rule.raw_text, "!keep.tmp");
        assert!(rule.matches(&rel("keep.tmp")));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let temp_dir = tempfile::tempdir().unwrap();
        let rules = IgnoreRules::load(temp_dir.path());
        assert!(rules.is_empty());
        assert!(!rules.is_excluded(&rel("anything.txt")));
    }

    #[test]
    fn test_load_reads_ignore_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        std::fs::write(temp_dir.path().join(IGNORE_FILE_NAME), "*.bak\n").unwrap();

        let rules = IgnoreRules::load(temp_dir.path());
        assert_eq!(rules.len(), 1);
        assert!(is_excluded(&rel("old.bak"), &rules));
    }
}
