//! Output formatters for run results
//!
//! Provides JSON, Table, and summary output formats.

#![allow(dead_code)]

use std::io::Write;

use crate::models::{ErrorRecord, RunSummary, TestOutcome, TestResult};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Summary,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format a single test result line
    pub fn format_test(&self, test: &TestResult) -> String {
        let symbol = if self.colorize {
            match test.outcome {
                TestOutcome::Pass => "\x1b[32m✓\x1b[0m",
                TestOutcome::Fail => "\x1b[31m✗\x1b[0m",
                TestOutcome::Skip => "\x1b[33m○\x1b[0m",
            }
        } else {
            test.outcome.symbol()
        };

        match &test.error {
            Some(error) => format!("{symbol} {} - {}", test.title, error.message),
            None => format!("{symbol} {}", test.title),
        }
    }

    /// Format a classified error line
    pub fn format_error(&self, error: &ErrorRecord) -> String {
        if self.colorize {
            format!("\x1b[31m{error}\x1b[0m")
        } else {
            error.to_string()
        }
    }

    /// Format the final run summary
    pub fn format_summary(&self, summary: &RunSummary) -> String {
        match self.format {
            OutputFormat::Table => self.format_summary_table(summary),
            OutputFormat::Json => serde_json::to_string(summary).unwrap_or_default(),
            OutputFormat::JsonPretty => {
                serde_json::to_string_pretty(summary).unwrap_or_default()
            }
            OutputFormat::Summary => self.format_summary_brief(summary),
        }
    }

    fn format_summary_table(&self, summary: &RunSummary) -> String {
        let mut output = String::new();

        output.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");
        output.push_str(&format!(
            " {} file(s), {} mode\n",
            summary.file_count, summary.mode
        ));
        output.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

        for test in &summary.tests {
            output.push_str("  ");
            output.push_str(&self.format_test(test));
            output.push('\n');
        }

        if !summary.errors.is_empty() {
            output.push_str("──────────────────────────────────────────────────────────────\n");
            for error in &summary.errors {
                output.push_str("  ");
                output.push_str(&self.format_error(error));
                output.push('\n');
            }
        }

        output.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n");

        let pass_str = if self.colorize {
            format!("\x1b[32m{}\x1b[0m", summary.stats.passed)
        } else {
            summary.stats.passed.to_string()
        };
        let fail_str = if self.colorize && summary.stats.failed > 0 {
            format!("\x1b[31m{}\x1b[0m", summary.stats.failed)
        } else {
            summary.stats.failed.to_string()
        };

        output.push_str(&format!(
            " Total: {} | Pass: {} | Fail: {} | Skip: {}\n",
            summary.stats.test_count, pass_str, fail_str, summary.stats.skipped
        ));
        output.push_str(&format!(
            " Rejections: {} | Exceptions: {} | Duration: {}ms\n",
            summary.stats.rejections, summary.stats.exceptions, summary.duration_ms
        ));

        output
    }

    fn format_summary_brief(&self, summary: &RunSummary) -> String {
        format!(
            "{} file(s): {}/{} passed ({:.1}%) in {}ms",
            summary.file_count,
            summary.stats.passed,
            summary.stats.test_count,
            summary.pass_rate(),
            summary.duration_ms
        )
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

/// Write a run summary to a file
pub fn write_summary_to_file(
    path: &str,
    summary: &RunSummary,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let formatter = ResultFormatter::new(format).no_color();
    let content = formatter.format_summary(summary);

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{RunMode, RunStats};
    use chrono::Utc;
    use std::path::PathBuf;

    fn summary() -> RunSummary {
        let mut stats = RunStats::default();
        stats.add_file(crate::models::FileStats {
            passed: 1,
            skipped: 0,
            failed: 1,
        });
        RunSummary {
            file_count: 1,
            mode: RunMode::Parallel,
            stats,
            tests: vec![
                TestResult {
                    title: "adds".to_string(),
                    raw_title: "adds".to_string(),
                    file: PathBuf::from("test.js"),
                    outcome: TestOutcome::Pass,
                    error: None,
                },
                TestResult {
                    title: "subtracts".to_string(),
                    raw_title: "subtracts".to_string(),
                    file: PathBuf::from("test.js"),
                    outcome: TestOutcome::Fail,
                    error: Some(ErrorRecord::test_failure(
                        PathBuf::from("test.js"),
                        "expected 1",
                    )),
                },
            ],
            errors: Vec::new(),
            started_at: Utc::now(),
            duration_ms: 42,
        }
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("TABLE"), Some(OutputFormat::Table));
        assert_eq!(OutputFormat::from_str("unknown"), None);
    }

    #[test]
    fn test_table_lists_tests_and_totals() {
        let rendered = ResultFormatter::default().no_color().format_summary(&summary());
        assert!(rendered.contains("✓ adds"));
        assert!(rendered.contains("✗ subtracts - expected 1"));
        assert!(rendered.contains("Total: 2"));
    }

    #[test]
    fn test_json_round_trips() {
        let formatter = ResultFormatter::new(OutputFormat::Json);
        let rendered = formatter.format_summary(&summary());
        let parsed: RunSummary = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed.stats, summary().stats);
        assert_eq!(parsed.tests.len(), 2);
    }

    #[test]
    fn test_brief_summary() {
        let formatter = ResultFormatter::new(OutputFormat::Summary);
        let rendered = formatter.format_summary(&summary());
        assert!(rendered.contains("1/2 passed"));
        assert!(rendered.contains("42ms"));
    }

    #[test]
    fn test_write_summary_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.txt");
        write_summary_to_file(path.to_str().unwrap(), &summary(), OutputFormat::Summary)
            .unwrap();
        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("1/2 passed"));
    }
}
