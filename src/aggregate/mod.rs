//! Event aggregation and title derivation
//!
//! Classifies raw session events into the run aggregate and republishes
//! them to subscribers.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::debug;

use crate::assertions::AssertionFormatter;
use crate::discovery::TEST_FILE_EXTENSION;
use crate::models::{ErrorKind, ErrorRecord, TestOutcome, TestResult};
use crate::session::{RawError, RawTest, SessionEvent};

/// Separator between title prefix segments
pub const TITLE_SEPARATOR: &str = " › ";

/// Path segment name treated as a test-directory convention
const TEST_SEGMENT: &str = "test";

/// Events republished to run subscribers
#[derive(Clone, Debug)]
pub enum RunEvent {
    /// All sessions are ready; carries the known test count
    Ready { test_count: usize },
    /// A classified, title-prefixed test result
    Test(TestResult),
    /// A classified error
    Error(ErrorRecord),
    /// Raw worker output passthrough
    Stdout { file: PathBuf, chunk: Vec<u8> },
    Stderr { file: PathBuf, chunk: Vec<u8> },
}

/// Fan-out of run events to any number of subscribers
#[derive(Clone, Default)]
pub struct EventPublisher {
    senders: Arc<Mutex<Vec<mpsc::UnboundedSender<RunEvent>>>>,
}

impl EventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<RunEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().unwrap().push(tx);
        rx
    }

    pub fn publish(&self, event: RunEvent) {
        let mut senders = self.senders.lock().unwrap();
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Per-file fold of classified events
#[derive(Debug, Default)]
pub struct FileFold {
    pub tests: Vec<TestResult>,
    pub errors: Vec<ErrorRecord>,
    pub rejections: usize,
    pub exceptions: usize,
}

/// Classifies one session's events before they reach subscribers
pub struct Aggregator {
    file: PathBuf,
    prefix: String,
    formatter: Arc<dyn AssertionFormatter>,
    publisher: EventPublisher,
    fold: FileFold,
}

impl Aggregator {
    pub fn new(
        file: PathBuf,
        prefix: String,
        formatter: Arc<dyn AssertionFormatter>,
        publisher: EventPublisher,
    ) -> Self {
        Self {
            file,
            prefix,
            formatter,
            publisher,
            fold: FileFold::default(),
        }
    }

    /// Ingest one raw event. Returns the reported test count when the
    /// event was the session's stats report.
    pub fn ingest(&mut self, event: SessionEvent) -> Option<usize> {
        match event {
            SessionEvent::Stats { test_count } => return Some(test_count),
            SessionEvent::Test(raw) => {
                let test = self.classify_test(raw);
                self.publisher.publish(RunEvent::Test(test.clone()));
                self.fold.tests.push(test);
            }
            SessionEvent::Rejections { errors } => {
                for raw in errors {
                    let record = self.classify(ErrorKind::Rejection, raw);
                    self.fold.rejections += 1;
                    self.publisher.publish(RunEvent::Error(record.clone()));
                    self.fold.errors.push(record);
                }
            }
            SessionEvent::UncaughtException { error } => {
                let record = self.classify(ErrorKind::Exception, error);
                self.fold.exceptions += 1;
                self.publisher.publish(RunEvent::Error(record.clone()));
                self.fold.errors.push(record);
            }
            SessionEvent::Stdout(chunk) => {
                self.publisher.publish(RunEvent::Stdout {
                    file: self.file.clone(),
                    chunk,
                });
            }
            SessionEvent::Stderr(chunk) => {
                self.publisher.publish(RunEvent::Stderr {
                    file: self.file.clone(),
                    chunk,
                });
            }
        }
        None
    }

    /// Finish ingestion and hand back the fold
    pub fn into_fold(self) -> FileFold {
        self.fold
    }

    fn classify(&self, kind: ErrorKind, raw: RawError) -> ErrorRecord {
        ErrorRecord::new(kind, Some(self.file.clone()), raw.message)
            .with_name(raw.name)
            .with_assertion(raw.assertion)
    }

    fn classify_test(&self, raw: RawTest) -> TestResult {
        let error = match (raw.outcome, raw.error) {
            (TestOutcome::Fail, Some(raw_error)) => {
                let record = self.classify(ErrorKind::TestFailure, raw_error);
                Some(rewrite_failure_message(record, self.formatter.as_ref()))
            }
            _ => None,
        };

        TestResult {
            title: format!("{}{}", self.prefix, raw.title),
            raw_title: raw.title,
            file: self.file.clone(),
            outcome: raw.outcome,
            error,
        }
    }
}

/// Rebuild a failing test's message. Applied once per record; reapplying
/// to an already-rewritten record is a no-op.
pub fn rewrite_failure_message(
    mut record: ErrorRecord,
    formatter: &dyn AssertionFormatter,
) -> ErrorRecord {
    if record.is_rewritten() {
        return record;
    }

    if let Some(context) = record.assertion.clone() {
        match formatter.format(&context) {
            Ok(rendered) => {
                let original = std::mem::take(&mut record.message);
                record.message = if original.is_empty() {
                    rendered
                } else {
                    format!("{original} {rendered}")
                };
                record.original_message = Some(original);
            }
            // degrade to the raw message, never abort the run
            Err(e) => debug!("assertion formatting failed: {e}"),
        }
    } else if !record.is_assertion() {
        let original = std::mem::take(&mut record.message);
        record.message = format!("failed with \"{original}\"");
        record.original_message = Some(original);
    }

    record
}

/// Title prefix for tests from `file`. Empty for a lone file unless
/// explicit titles were requested.
pub fn title_prefix(
    file: &Path,
    base: &Path,
    file_count: usize,
    explicit_titles: bool,
) -> String {
    if file_count == 1 && !explicit_titles {
        return String::new();
    }

    let rel = file.strip_prefix(base).unwrap_or(file);
    let extension_suffix = format!(".{TEST_FILE_EXTENSION}");
    let component_count = rel.components().count();

    let mut segments = Vec::new();
    for (index, component) in rel.components().enumerate() {
        let Some(name) = component.as_os_str().to_str() else {
            continue;
        };
        let name = if index + 1 == component_count {
            name.strip_suffix(&extension_suffix).unwrap_or(name)
        } else {
            name
        };
        if name == TEST_SEGMENT {
            continue;
        }
        let name = name
            .strip_prefix("test-")
            .or_else(|| name.strip_prefix("test_"))
            .unwrap_or(name);
        if name.is_empty() {
            continue;
        }
        segments.push(name.to_string());
    }

    let joined = segments.join(TITLE_SEPARATOR);
    if joined.is_empty() {
        joined
    } else {
        format!("{joined}{TITLE_SEPARATOR}")
    }
}

/// Longest shared ancestor directory of the given files
pub fn common_base(files: &[PathBuf]) -> PathBuf {
    let mut iter = files.iter();
    let Some(first) = iter.next() else {
        return PathBuf::new();
    };

    let mut base: Vec<_> = first
        .parent()
        .map(|p| p.components().collect())
        .unwrap_or_default();

    for file in iter {
        let parent: Vec<_> = file
            .parent()
            .map(|p| p.components().collect())
            .unwrap_or_default();
        let shared = base
            .iter()
            .zip(parent.iter())
            .take_while(|(a, b)| a == b)
            .count();
        base.truncate(shared);
    }

    base.iter().map(|c| c.as_os_str()).collect()
}
