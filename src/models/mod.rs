//! Data models for the run orchestrator
//!
//! This module contains all data structures shared across the application.

mod error;
mod test_result;

pub use error::{AssertionContext, Capture, ErrorKind, ErrorRecord, ASSERTION_ERROR_NAME};
pub use test_result::{FileStats, RunMode, RunStats, RunSummary, TestOutcome, TestResult};
