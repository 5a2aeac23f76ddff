//! Error classification models
//!
//! Classified error records surfaced through the run aggregate.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Error name workers report for plain assertion failures
pub const ASSERTION_ERROR_NAME: &str = "AssertionError";

/// Classification of an error surfaced by a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Async rejection not tied to a specific test
    Rejection,
    /// Fatal escape from a worker, or a worker that died without a result
    Exception,
    /// One test's expectation failed
    TestFailure,
    /// No files matched the given patterns
    Discovery,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Rejection => write!(f, "Unhandled rejection"),
            ErrorKind::Exception => write!(f, "Uncaught exception"),
            ErrorKind::TestFailure => write!(f, "Test failure"),
            ErrorKind::Discovery => write!(f, "Discovery"),
        }
    }
}

/// One captured sub-expression of a failed assertion
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capture {
    /// Source text of the sub-expression
    pub expression: String,
    /// Rendered runtime value
    pub value: String,
}

/// Captured assertion expression and its sub-expression values,
/// as reported by a worker
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssertionContext {
    /// Source text of the whole asserted expression
    pub source: String,
    /// Captured sub-expression values, outermost first
    #[serde(default)]
    pub captures: Vec<Capture>,
}

/// A classified error carried in the run aggregate
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    /// Origin file; absent for discovery errors
    pub file: Option<PathBuf>,
    pub message: String,
    /// Error name as reported by the worker
    pub name: Option<String>,
    /// Expression capture attached to a failing assertion
    pub assertion: Option<AssertionContext>,
    /// Message as it was before the failure-message rewrite; present
    /// exactly when the rewrite has been applied
    pub original_message: Option<String>,
}

impl ErrorRecord {
    pub fn new(kind: ErrorKind, file: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            file,
            message: message.into(),
            name: None,
            assertion: None,
            original_message: None,
        }
    }

    pub fn discovery(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Discovery, None, message)
    }

    pub fn rejection(file: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Rejection, Some(file), message)
    }

    pub fn exception(file: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Exception, Some(file), message)
    }

    pub fn test_failure(file: PathBuf, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TestFailure, Some(file), message)
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name;
        self
    }

    pub fn with_assertion(mut self, assertion: Option<AssertionContext>) -> Self {
        self.assertion = assertion;
        self
    }

    /// Whether the worker reported this as a plain assertion failure
    pub fn is_assertion(&self) -> bool {
        self.name.as_deref() == Some(ASSERTION_ERROR_NAME)
    }

    /// Whether the failure-message rewrite has already been applied
    pub fn is_rewritten(&self) -> bool {
        self.original_message.is_some()
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{} in {}: {}", self.kind, file.display(), self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}
