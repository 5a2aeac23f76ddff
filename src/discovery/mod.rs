//! Test file discovery
//!
//! Resolves file patterns into the ordered list of test files to dispatch.

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Patterns applied when the caller supplies none
pub const DEFAULT_PATTERNS: &[&str] = &["test.js", "test-*.js", "test"];

/// Directories never searched for test files
pub const EXCLUDED_DIRS: &[&str] = &["node_modules", "fixtures", "helpers"];

/// Extension a test file must carry
pub const TEST_FILE_EXTENSION: &str = "js";

/// Resolves patterns into test files
pub trait Discovery: Send + Sync {
    /// Deduplicated test files in deterministic dispatch order
    fn find(&self, patterns: &[String]) -> Result<Vec<PathBuf>>;
}

/// Filesystem-backed discovery rooted at a project directory
pub struct FileDiscovery {
    root: PathBuf,
}

impl FileDiscovery {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Discovery for FileDiscovery {
    fn find(&self, patterns: &[String]) -> Result<Vec<PathBuf>> {
        let patterns: Vec<String> = if patterns.is_empty() {
            DEFAULT_PATTERNS.iter().map(|p| p.to_string()).collect()
        } else {
            patterns.to_vec()
        };

        let glob_set = build_glob_set(&patterns)?;

        // patterns naming a directory expand to every test file below it
        let dir_patterns: Vec<PathBuf> = patterns
            .iter()
            .map(PathBuf::from)
            .filter(|p| self.root.join(p).is_dir())
            .collect();

        let mut found = BTreeSet::new();
        let walker = WalkDir::new(&self.root)
            .into_iter()
            .filter_entry(|entry| !is_excluded_dir(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("skipping unreadable entry: {e}");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if !is_test_file(path) {
                continue;
            }
            let rel = path.strip_prefix(&self.root).unwrap_or(path);
            if glob_set.is_match(rel) || under_directory(rel, &dir_patterns) {
                found.insert(path.to_path_buf());
            }
        }

        debug!("discovered {} test file(s)", found.len());
        Ok(found.into_iter().collect())
    }
}

fn build_glob_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .with_context(|| format!("invalid file pattern: {pattern}"))?;
        builder.add(glob);
    }
    builder.build().context("failed to compile file patterns")
}

/// Regular test file: carries the test extension and is not underscore-prefixed
fn is_test_file(path: &Path) -> bool {
    let has_extension = path
        .extension()
        .map(|ext| ext == TEST_FILE_EXTENSION)
        .unwrap_or(false);
    let hidden = path
        .file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('_'))
        .unwrap_or(true);
    has_extension && !hidden
}

fn is_excluded_dir(entry: &walkdir::DirEntry) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .map(|name| EXCLUDED_DIRS.contains(&name))
            .unwrap_or(false)
}

fn under_directory(rel: &Path, dir_patterns: &[PathBuf]) -> bool {
    dir_patterns.iter().any(|dir| rel.starts_with(dir))
}
