//! Test result models
//!
//! Defines test outcomes, per-file stats, and the aggregated run summary.

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::error::ErrorRecord;

/// Outcome of a single completed test
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestOutcome {
    Pass,
    Skip,
    Fail,
}

impl TestOutcome {
    pub fn symbol(&self) -> &'static str {
        match self {
            TestOutcome::Pass => "✓",
            TestOutcome::Skip => "○",
            TestOutcome::Fail => "✗",
        }
    }

    pub fn is_pass(&self) -> bool {
        matches!(self, TestOutcome::Pass)
    }
}

impl fmt::Display for TestOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestOutcome::Pass => write!(f, "PASS"),
            TestOutcome::Skip => write!(f, "SKIP"),
            TestOutcome::Fail => write!(f, "FAIL"),
        }
    }
}

/// Result of a single completed test
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TestResult {
    /// Title with the per-file prefix applied
    pub title: String,
    /// Title as reported by the worker
    pub raw_title: String,
    /// File the test came from
    pub file: PathBuf,
    pub outcome: TestOutcome,
    /// Present for failing tests that carried error details
    pub error: Option<ErrorRecord>,
}

impl fmt::Display for TestResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.outcome.symbol(), self.title)?;
        if let Some(error) = &self.error {
            write!(f, " - {}", error.message)?;
        }
        Ok(())
    }
}

/// Pass/skip/fail counters reported by one worker
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStats {
    pub passed: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl FileStats {
    pub fn total(&self) -> usize {
        self.passed + self.skipped + self.failed
    }
}

/// Aggregate counters for a whole run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub test_count: usize,
    pub passed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub rejections: usize,
    pub exceptions: usize,
}

impl RunStats {
    /// Fold one file's reported stats into the aggregate
    pub fn add_file(&mut self, stats: FileStats) {
        self.test_count += stats.total();
        self.passed += stats.passed;
        self.skipped += stats.skipped;
        self.failed += stats.failed;
    }
}

/// How a run schedules its files
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Serial,
    Parallel,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Serial => write!(f, "serial"),
            RunMode::Parallel => write!(f, "parallel"),
        }
    }
}

/// Final aggregated result of one run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunSummary {
    pub file_count: usize,
    pub mode: RunMode,
    pub stats: RunStats,
    /// Completed tests in file-dispatch order
    pub tests: Vec<TestResult>,
    /// Classified errors in file-dispatch order
    pub errors: Vec<ErrorRecord>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn pass_rate(&self) -> f64 {
        if self.stats.test_count == 0 {
            0.0
        } else {
            (self.stats.passed as f64 / self.stats.test_count as f64) * 100.0
        }
    }

    /// Whether the run finished without failures or errors
    pub fn is_all_passed(&self) -> bool {
        self.stats.failed == 0 && self.errors.is_empty()
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run - {} file(s), {} mode", self.file_count, self.mode)?;
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        for test in &self.tests {
            writeln!(f, "  {test}")?;
        }
        for error in &self.errors {
            writeln!(f, "  ! {error}")?;
        }
        writeln!(f, "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━")?;
        writeln!(
            f,
            "Total: {} | Pass: {} | Fail: {} | Skip: {}",
            self.stats.test_count, self.stats.passed, self.stats.failed, self.stats.skipped
        )?;
        writeln!(
            f,
            "Rejections: {} | Exceptions: {} | Duration: {}ms",
            self.stats.rejections, self.stats.exceptions, self.duration_ms
        )
    }
}
