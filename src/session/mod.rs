//! Worker session contract
//!
//! One session runs a single test file in isolation. It publishes a fixed
//! event vocabulary while loading and running, and resolves its `run` with
//! the file's final stats.

#![allow(dead_code)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::{AssertionContext, FileStats, TestOutcome};

mod process;
pub use process::{ProcessLauncher, ProcessSession, WORKER_CONFIG_ENV};

/// Session-level failures that prevent a file from producing a result
#[derive(Error, Debug)]
pub enum SessionFailure {
    #[error("failed to spawn worker: {0}")]
    Spawn(std::io::Error),

    #[error("worker exited before reporting results ({status})")]
    Exited { status: String },

    #[error("worker protocol violation: {0}")]
    Protocol(String),

    #[error("worker transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("worker cancelled")]
    Cancelled,
}

/// Error payload reported by a worker, before classification
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawError {
    pub message: String,
    /// Error name, e.g. `AssertionError` or `TypeError`
    pub name: Option<String>,
    /// Expression capture, present for assertion failures
    pub assertion: Option<AssertionContext>,
    pub stack: Option<String>,
}

/// A completed test as reported by a worker, before classification
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTest {
    pub title: String,
    pub outcome: TestOutcome,
    #[serde(default)]
    pub error: Option<RawError>,
}

/// Events a session publishes while loading and running its file
#[derive(Clone, Debug)]
pub enum SessionEvent {
    /// Fires once when the file is loaded, before any test runs
    Stats { test_count: usize },
    /// One completed test
    Test(RawTest),
    /// Async rejections not tied to a specific test
    Rejections { errors: Vec<RawError> },
    /// A fatal escape caught by the worker
    UncaughtException { error: RawError },
    /// Raw worker output passthrough
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
}

/// Merged configuration handed to one worker
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    /// File under execution
    pub file: PathBuf,
    /// Precompiled form the worker should load instead of the source
    pub artifact: Option<PathBuf>,
    /// Modules preloaded before the file
    #[serde(default)]
    pub require: Vec<String>,
    /// Unrecognized options, forwarded verbatim
    #[serde(flatten)]
    pub options: serde_json::Map<String, serde_json::Value>,
}

/// One file's isolated execution
#[async_trait]
pub trait WorkerSession: Send {
    /// File this session executes
    fn file(&self) -> &Path;

    /// The session's event stream; may be taken once
    fn take_events(&mut self) -> mpsc::UnboundedReceiver<SessionEvent>;

    /// Execute the loaded file to completion
    async fn run(&mut self) -> Result<FileStats, SessionFailure>;
}

/// Creates worker sessions; owns the isolation boundary and its transport
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self, config: WorkerConfig)
        -> Result<Box<dyn WorkerSession>, SessionFailure>;
}
