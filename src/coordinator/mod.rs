//! Run coordination
//!
//! Dispatches one worker session per test file, drives the readiness
//! barrier, and folds per-file results into the run aggregate.

#![allow(dead_code)]

mod barrier;
pub use barrier::{ReadyLatch, ReadyToken};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tracing::{info, warn};

use crate::aggregate::{
    common_base, title_prefix, Aggregator, EventPublisher, FileFold, RunEvent,
};
use crate::assertions::{AssertionFormatter, CaptureFormatter};
use crate::cache::{ArtifactCache, ContentCache};
use crate::config::RunnerConfig;
use crate::discovery::{Discovery, FileDiscovery};
use crate::models::{ErrorRecord, FileStats, RunMode, RunStats, RunSummary, TestResult};
use crate::session::{
    ProcessLauncher, SessionEvent, SessionFailure, SessionLauncher, WorkerConfig, WorkerSession,
};
use crate::utils::Timer;

/// Orchestrates one run at a time over a set of collaborators
pub struct Coordinator {
    config: RunnerConfig,
    discovery: Arc<dyn Discovery>,
    cache: Arc<dyn ArtifactCache>,
    launcher: Arc<dyn SessionLauncher>,
    formatter: Arc<dyn AssertionFormatter>,
    publisher: EventPublisher,
    cancel: watch::Sender<bool>,
    run_guard: Mutex<()>,
}

/// Mutable state for one run, rebuilt on every call
struct RunState {
    mode: RunMode,
    file_count: usize,
    stats: RunStats,
    tests: Vec<TestResult>,
    errors: Vec<ErrorRecord>,
    started_at: DateTime<Utc>,
}

impl RunState {
    fn new(mode: RunMode) -> Self {
        Self {
            mode,
            file_count: 0,
            stats: RunStats::default(),
            tests: Vec::new(),
            errors: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Fold one session's outcome into the aggregate. A session without
    /// stats contributed nothing but its errors.
    fn fold(&mut self, outcome: SessionOutcome) {
        self.stats.rejections += outcome.fold.rejections;
        self.stats.exceptions += outcome.fold.exceptions;
        self.errors.extend(outcome.fold.errors);
        if let Some(stats) = outcome.stats {
            self.stats.add_file(stats);
            self.tests.extend(outcome.fold.tests);
        }
    }

    fn into_summary(self, duration_ms: u64) -> RunSummary {
        RunSummary {
            file_count: self.file_count,
            mode: self.mode,
            stats: self.stats,
            tests: self.tests,
            errors: self.errors,
            started_at: self.started_at,
            duration_ms,
        }
    }
}

/// One session's contribution to the fold
struct SessionOutcome {
    /// Final reported stats; `None` when the session failed and an empty
    /// result was substituted
    stats: Option<FileStats>,
    fold: FileFold,
}

/// A dispatched session awaiting execution
enum Slot {
    Live {
        session: Box<dyn WorkerSession>,
        pump: tokio::task::JoinHandle<FileFold>,
    },
    /// Dispatch itself failed; the error is already in the fold
    Stillborn { fold: FileFold },
}

impl Coordinator {
    /// Coordinator wired to the default collaborators for `config`
    pub fn new(config: RunnerConfig) -> Result<Self> {
        let root = std::env::current_dir().context("failed to resolve working directory")?;
        let cache = ContentCache::new(config.cache_enabled)?;
        let launcher = ProcessLauncher::new(config.worker.clone());
        Ok(Self::with_collaborators(
            config,
            Arc::new(FileDiscovery::new(root)),
            Arc::new(cache),
            Arc::new(launcher),
            Arc::new(CaptureFormatter),
        ))
    }

    /// Coordinator with explicit collaborators
    pub fn with_collaborators(
        config: RunnerConfig,
        discovery: Arc<dyn Discovery>,
        cache: Arc<dyn ArtifactCache>,
        launcher: Arc<dyn SessionLauncher>,
        formatter: Arc<dyn AssertionFormatter>,
    ) -> Self {
        Self {
            config,
            discovery,
            cache,
            launcher,
            formatter,
            publisher: EventPublisher::new(),
            cancel: watch::channel(false).0,
            run_guard: Mutex::new(()),
        }
    }

    /// Subscribe to the run event stream
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<RunEvent> {
        self.publisher.subscribe()
    }

    /// Signal every in-flight session to stop at its next boundary
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    /// Execute one run over the files matching `patterns`
    pub async fn run(&self, patterns: &[String]) -> Result<RunSummary> {
        // overlapping calls on one coordinator are serialized
        let _guard = self.run_guard.lock().await;
        self.cancel.send_replace(false);

        let timer = Timer::start("run");
        let mode = if self.config.serial {
            RunMode::Serial
        } else {
            RunMode::Parallel
        };
        let mut state = RunState::new(mode);

        let files = self.discovery.find(patterns)?;
        if files.is_empty() {
            let record = ErrorRecord::discovery("couldn't find any files to test");
            self.publisher.publish(RunEvent::Error(record.clone()));
            state.errors.push(record);
            self.publisher.publish(RunEvent::Ready { test_count: 0 });
            return Ok(state.into_summary(timer.elapsed_ms()));
        }

        state.file_count = files.len();
        info!("dispatching {} test file(s) in {} mode", files.len(), mode);

        let base = common_base(&files);
        let latch = ReadyLatch::new(files.len());
        let mut slots = Vec::with_capacity(files.len());

        for file in &files {
            let prefix = title_prefix(file, &base, files.len(), self.config.explicit_titles);
            let aggregator = Aggregator::new(
                file.clone(),
                prefix,
                Arc::clone(&self.formatter),
                self.publisher.clone(),
            );

            match self.dispatch(file).await {
                Ok(mut session) => {
                    let events = session.take_events();
                    let pump = tokio::spawn(pump_events(
                        events,
                        latch.token(),
                        aggregator,
                        self.cancel.subscribe(),
                    ));
                    slots.push(Slot::Live { session, pump });
                }
                Err(e) => {
                    warn!("failed to dispatch worker for {}: {e:#}", file.display());
                    let record = ErrorRecord::exception(file.clone(), format!("{e:#}"));
                    self.publisher.publish(RunEvent::Error(record.clone()));
                    latch.token().mark(0);
                    slots.push(Slot::Stillborn {
                        fold: FileFold {
                            errors: vec![record],
                            exceptions: 1,
                            ..FileFold::default()
                        },
                    });
                }
            }
        }

        // no run starts before every session has signalled readiness
        latch.wait().await;
        let known = latch.known_tests();
        info!("all {} worker(s) ready, {} test(s) known", files.len(), known);
        self.publisher.publish(RunEvent::Ready { test_count: known });

        let outcomes = match mode {
            RunMode::Serial => {
                let mut outcomes = Vec::with_capacity(slots.len());
                for slot in slots {
                    let outcome = execute_slot(
                        slot,
                        self.cancel.subscribe(),
                        None,
                        self.publisher.clone(),
                    )
                    .await;
                    outcomes.push(outcome);
                }
                outcomes
            }
            RunMode::Parallel => {
                let semaphore = self
                    .config
                    .concurrency
                    .map(|n| Arc::new(Semaphore::new(n.max(1))));
                let runs: Vec<_> = slots
                    .into_iter()
                    .map(|slot| {
                        execute_slot(
                            slot,
                            self.cancel.subscribe(),
                            semaphore.clone(),
                            self.publisher.clone(),
                        )
                    })
                    .collect();
                join_all(runs).await
            }
        };

        for outcome in outcomes {
            state.fold(outcome);
        }

        let duration_ms = timer.elapsed_ms();
        info!(
            "run finished in {}ms: {} passed, {} failed, {} skipped",
            duration_ms, state.stats.passed, state.stats.failed, state.stats.skipped
        );
        Ok(state.into_summary(duration_ms))
    }

    /// Precompile one file and launch its worker session
    async fn dispatch(&self, file: &Path) -> Result<Box<dyn WorkerSession>> {
        let artifact = self
            .cache
            .precompile(file)
            .with_context(|| format!("failed to precompile {}", file.display()))?;

        let worker_config = WorkerConfig {
            file: file.to_path_buf(),
            artifact: Some(artifact.path),
            require: self.config.require_modules.clone(),
            options: self.config.worker_options.clone(),
        };

        let session = self
            .launcher
            .launch(worker_config)
            .await
            .with_context(|| format!("failed to launch worker for {}", file.display()))?;
        Ok(session)
    }
}

/// Drain one session's events, contributing exactly once to the barrier:
/// on the first stats report, or on the stream closing without one.
async fn pump_events(
    mut events: mpsc::UnboundedReceiver<SessionEvent>,
    mut token: ReadyToken,
    mut aggregator: Aggregator,
    mut cancel: watch::Receiver<bool>,
) -> FileFold {
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => {
                    if let Some(test_count) = aggregator.ingest(event) {
                        token.mark(test_count);
                    }
                }
                None => break,
            },
            _ = wait_cancelled(&mut cancel) => break,
        }
    }
    // closed without a stats report, or cancelled: the session still
    // counts toward the barrier
    token.mark(0);
    aggregator.into_fold()
}

/// Run one session to completion and collect its fold. Catastrophic
/// failures are converted to a substituted empty result here; siblings
/// never observe them.
async fn execute_slot(
    slot: Slot,
    mut cancel: watch::Receiver<bool>,
    semaphore: Option<Arc<Semaphore>>,
    publisher: EventPublisher,
) -> SessionOutcome {
    match slot {
        Slot::Stillborn { fold } => SessionOutcome { stats: None, fold },
        Slot::Live { mut session, pump } => {
            let _permit = match semaphore.as_ref() {
                Some(semaphore) => Some(semaphore.acquire().await.unwrap()),
                None => None,
            };

            let run_result = tokio::select! {
                result = session.run() => result,
                _ = wait_cancelled(&mut cancel) => Err(SessionFailure::Cancelled),
            };

            let mut fold = pump.await.unwrap_or_default();

            match run_result {
                Ok(stats) => SessionOutcome {
                    stats: Some(stats),
                    fold,
                },
                Err(failure) => {
                    let file = session.file().to_path_buf();
                    warn!("worker for {} failed: {failure}", file.display());
                    let record = ErrorRecord::exception(file, failure.to_string());
                    publisher.publish(RunEvent::Error(record.clone()));
                    fold.errors.push(record);
                    fold.exceptions += 1;
                    SessionOutcome { stats: None, fold }
                }
            }
        }
    }
}

async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    while !*cancel.borrow_and_update() {
        if cancel.changed().await.is_err() {
            // coordinator gone; nothing will ever cancel us
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::Artifact;
    use crate::models::{ErrorKind, TestOutcome};
    use crate::session::{RawError, RawTest};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

    type Log = Arc<StdMutex<Vec<String>>>;

    fn note(log: &Log, entry: String) {
        log.lock().unwrap().push(entry);
    }

    #[derive(Clone)]
    enum Plan {
        /// Reports stats (after an optional delay), then passes every test
        Healthy {
            passing: Vec<&'static str>,
            stats_delay_ms: u64,
        },
        /// Dies while loading, before any stats report
        DiesLoading,
        /// Reports stats, emits one test, then dies mid-run
        DiesRunning { announced: usize },
        /// Passes one test and reports an unhandled rejection
        PassesWithRejection,
        /// Reports stats, then never finishes its run
        Hangs,
    }

    struct StubSession {
        file: PathBuf,
        plan: Plan,
        events: Option<UnboundedReceiver<SessionEvent>>,
        tx: Option<UnboundedSender<SessionEvent>>,
        log: Log,
    }

    impl StubSession {
        fn new(file: PathBuf, plan: Plan, log: Log) -> Self {
            let (tx, rx) = unbounded_channel();
            let name = stem(&file);

            let tx = match &plan {
                Plan::Healthy {
                    passing,
                    stats_delay_ms,
                } => {
                    let sender = tx.clone();
                    let count = passing.len();
                    let delay = *stats_delay_ms;
                    let log = log.clone();
                    tokio::spawn(async move {
                        if delay > 0 {
                            tokio::time::sleep(Duration::from_millis(delay)).await;
                        }
                        note(&log, format!("stats:{name}"));
                        let _ = sender.send(SessionEvent::Stats { test_count: count });
                    });
                    Some(tx)
                }
                Plan::DiesLoading => None,
                Plan::DiesRunning { announced } => {
                    let _ = tx.send(SessionEvent::Stats {
                        test_count: *announced,
                    });
                    Some(tx)
                }
                Plan::PassesWithRejection | Plan::Hangs => {
                    let _ = tx.send(SessionEvent::Stats { test_count: 1 });
                    Some(tx)
                }
            };

            Self {
                file,
                plan,
                events: Some(rx),
                tx,
                log,
            }
        }
    }

    fn stem(file: &Path) -> String {
        file.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    fn pass(title: &str) -> SessionEvent {
        SessionEvent::Test(RawTest {
            title: title.to_string(),
            outcome: TestOutcome::Pass,
            error: None,
        })
    }

    #[async_trait]
    impl WorkerSession for StubSession {
        fn file(&self) -> &Path {
            &self.file
        }

        fn take_events(&mut self) -> UnboundedReceiver<SessionEvent> {
            self.events.take().expect("session events already taken")
        }

        async fn run(&mut self) -> Result<FileStats, SessionFailure> {
            let name = stem(&self.file);
            note(&self.log, format!("run-start:{name}"));
            let plan = self.plan.clone();
            let tx = self.tx.take();

            let result = match plan {
                Plan::Healthy { passing, .. } => {
                    if let Some(tx) = tx {
                        for title in &passing {
                            let _ = tx.send(pass(title));
                        }
                    }
                    Ok(FileStats {
                        passed: passing.len(),
                        skipped: 0,
                        failed: 0,
                    })
                }
                Plan::DiesLoading => Err(SessionFailure::Exited {
                    status: "exit status: 1".to_string(),
                }),
                Plan::DiesRunning { .. } => {
                    if let Some(tx) = tx {
                        let _ = tx.send(pass("partial"));
                    }
                    Err(SessionFailure::Exited {
                        status: "signal: 9".to_string(),
                    })
                }
                Plan::PassesWithRejection => {
                    if let Some(tx) = tx {
                        let _ = tx.send(pass("works"));
                        let _ = tx.send(SessionEvent::Rejections {
                            errors: vec![RawError {
                                message: "dangling promise".to_string(),
                                ..RawError::default()
                            }],
                        });
                    }
                    Ok(FileStats {
                        passed: 1,
                        skipped: 0,
                        failed: 0,
                    })
                }
                Plan::Hangs => std::future::pending().await,
            };

            note(&self.log, format!("run-end:{name}"));
            result
        }
    }

    struct StubLauncher {
        plans: StdMutex<HashMap<PathBuf, Plan>>,
        log: Log,
    }

    #[async_trait]
    impl SessionLauncher for StubLauncher {
        async fn launch(
            &self,
            config: WorkerConfig,
        ) -> Result<Box<dyn WorkerSession>, SessionFailure> {
            let plan = self
                .plans
                .lock()
                .unwrap()
                .get(&config.file)
                .cloned()
                .ok_or_else(|| {
                    SessionFailure::Protocol(format!("no plan for {}", config.file.display()))
                })?;
            Ok(Box::new(StubSession::new(config.file, plan, self.log.clone())))
        }
    }

    struct StaticDiscovery(Vec<PathBuf>);

    impl Discovery for StaticDiscovery {
        fn find(&self, _patterns: &[String]) -> Result<Vec<PathBuf>> {
            Ok(self.0.clone())
        }
    }

    struct NullCache;

    impl ArtifactCache for NullCache {
        fn precompile(&self, file: &Path) -> Result<Artifact> {
            Ok(Artifact {
                id: "0".repeat(16),
                path: file.to_path_buf(),
            })
        }
    }

    fn coordinator(files: Vec<(&str, Plan)>, config: RunnerConfig, log: &Log) -> Coordinator {
        let paths: Vec<PathBuf> = files.iter().map(|(f, _)| PathBuf::from(f)).collect();
        let plans = files
            .into_iter()
            .map(|(f, p)| (PathBuf::from(f), p))
            .collect();
        Coordinator::with_collaborators(
            config,
            Arc::new(StaticDiscovery(paths)),
            Arc::new(NullCache),
            Arc::new(StubLauncher {
                plans: StdMutex::new(plans),
                log: log.clone(),
            }),
            Arc::new(CaptureFormatter),
        )
    }

    fn drain(events: &mut mpsc::UnboundedReceiver<RunEvent>) -> Vec<RunEvent> {
        let mut seen = Vec::new();
        while let Ok(event) = events.try_recv() {
            seen.push(event);
        }
        seen
    }

    fn ready_signals(events: &[RunEvent]) -> Vec<usize> {
        events
            .iter()
            .filter_map(|e| match e {
                RunEvent::Ready { test_count } => Some(*test_count),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_zero_files_yields_discovery_error() {
        let log = Log::default();
        let coordinator = coordinator(Vec::new(), RunnerConfig::default(), &log);
        let mut events = coordinator.subscribe();

        let summary = coordinator.run(&[]).await.unwrap();
        assert_eq!(summary.file_count, 0);
        assert_eq!(summary.stats, RunStats::default());
        assert!(summary.tests.is_empty());
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].kind, ErrorKind::Discovery);
        assert!(summary.errors[0].file.is_none());

        let seen = drain(&mut events);
        assert_eq!(ready_signals(&seen), vec![0]);
    }

    #[tokio::test]
    async fn test_ready_fires_once_after_every_session() {
        let log = Log::default();
        let coordinator = coordinator(
            vec![
                (
                    "slow/test.js",
                    Plan::Healthy {
                        passing: vec!["a1", "a2"],
                        stats_delay_ms: 50,
                    },
                ),
                (
                    "fast/test.js",
                    Plan::Healthy {
                        passing: vec!["b1"],
                        stats_delay_ms: 0,
                    },
                ),
            ],
            RunnerConfig::default(),
            &log,
        );
        let mut events = coordinator.subscribe();

        let summary = coordinator.run(&[]).await.unwrap();
        assert_eq!(summary.stats.passed, 3);

        let seen = drain(&mut events);
        assert_eq!(ready_signals(&seen), vec![3]);

        // every stats report precedes every run start
        let log = log.lock().unwrap();
        let last_stats = log.iter().rposition(|e| e.starts_with("stats:")).unwrap();
        let first_run = log.iter().position(|e| e.starts_with("run-start:")).unwrap();
        assert!(
            last_stats < first_run,
            "a run started before the barrier was satisfied: {log:?}"
        );
    }

    #[tokio::test]
    async fn test_catastrophic_failure_never_harms_siblings() {
        let log = Log::default();
        let coordinator = coordinator(
            vec![
                ("a/test.js", Plan::DiesLoading),
                (
                    "b/test.js",
                    Plan::Healthy {
                        passing: vec!["one", "two"],
                        stats_delay_ms: 0,
                    },
                ),
            ],
            RunnerConfig::default(),
            &log,
        );
        let mut events = coordinator.subscribe();

        let summary = coordinator.run(&[]).await.unwrap();
        assert_eq!(summary.stats.passed, 2);
        assert_eq!(summary.stats.test_count, 2);
        assert_eq!(summary.stats.exceptions, 1);
        assert_eq!(summary.tests.len(), 2);
        assert!(summary.tests.iter().all(|t| t.file == PathBuf::from("b/test.js")));

        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].kind, ErrorKind::Exception);
        assert_eq!(summary.errors[0].file, Some(PathBuf::from("a/test.js")));

        let seen = drain(&mut events);
        assert_eq!(ready_signals(&seen).len(), 1);
    }

    #[tokio::test]
    async fn test_serial_mode_runs_in_dispatch_order() {
        let log = Log::default();
        let config = RunnerConfig {
            serial: true,
            ..RunnerConfig::default()
        };
        let coordinator = coordinator(
            vec![
                (
                    "suite/test-alpha.js",
                    Plan::Healthy {
                        passing: vec!["x1", "x2"],
                        stats_delay_ms: 0,
                    },
                ),
                (
                    "suite/test-beta.js",
                    Plan::Healthy {
                        passing: vec!["y1"],
                        stats_delay_ms: 0,
                    },
                ),
            ],
            config,
            &log,
        );

        let summary = coordinator.run(&[]).await.unwrap();
        assert_eq!(summary.mode, RunMode::Serial);

        let log = log.lock().unwrap();
        let alpha_end = log
            .iter()
            .position(|e| e.as_str() == "run-end:test-alpha")
            .unwrap();
        let beta_start = log
            .iter()
            .position(|e| e.as_str() == "run-start:test-beta")
            .unwrap();
        assert!(
            alpha_end < beta_start,
            "second run started before the first resolved: {log:?}"
        );

        // final test list keeps dispatch order
        let titles: Vec<_> = summary.tests.iter().map(|t| t.raw_title.as_str()).collect();
        assert_eq!(titles, vec!["x1", "x2", "y1"]);
    }

    #[tokio::test]
    async fn test_totals_match_reported_stats_with_mixed_outcomes() {
        let log = Log::default();
        let coordinator = coordinator(
            vec![
                ("dying/test.js", Plan::DiesRunning { announced: 3 }),
                (
                    "healthy/test.js",
                    Plan::Healthy {
                        passing: vec!["one", "two"],
                        stats_delay_ms: 0,
                    },
                ),
            ],
            RunnerConfig::default(),
            &log,
        );
        let mut events = coordinator.subscribe();

        let summary = coordinator.run(&[]).await.unwrap();

        // the dying session announced 3 tests and emitted one, but its
        // substituted result contributes nothing
        let counted = summary.stats.passed + summary.stats.skipped + summary.stats.failed;
        assert_eq!(counted, summary.tests.len());
        assert_eq!(summary.tests.len(), 2);
        assert_eq!(summary.stats.exceptions, 1);

        // the barrier still saw the announced count once
        let seen = drain(&mut events);
        assert_eq!(ready_signals(&seen), vec![5]);
    }

    #[tokio::test]
    async fn test_rejections_recorded_alongside_stats() {
        let log = Log::default();
        let coordinator = coordinator(
            vec![("test.js", Plan::PassesWithRejection)],
            RunnerConfig::default(),
            &log,
        );

        let summary = coordinator.run(&[]).await.unwrap();
        assert_eq!(summary.stats.passed, 1);
        assert_eq!(summary.stats.rejections, 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].kind, ErrorKind::Rejection);
        assert!(!summary.is_all_passed());
    }

    #[tokio::test]
    async fn test_title_prefixes_for_multiple_files() {
        let log = Log::default();
        let coordinator = coordinator(
            vec![
                (
                    "a/test.js",
                    Plan::Healthy {
                        passing: vec!["works"],
                        stats_delay_ms: 0,
                    },
                ),
                (
                    "b/test.js",
                    Plan::Healthy {
                        passing: vec!["works"],
                        stats_delay_ms: 0,
                    },
                ),
            ],
            RunnerConfig::default(),
            &log,
        );

        let summary = coordinator.run(&[]).await.unwrap();
        let titles: Vec<_> = summary.tests.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["a › works", "b › works"]);
    }

    #[tokio::test]
    async fn test_single_file_titles_stay_bare() {
        let log = Log::default();
        let coordinator = coordinator(
            vec![(
                "a/test.js",
                Plan::Healthy {
                    passing: vec!["works"],
                    stats_delay_ms: 0,
                },
            )],
            RunnerConfig::default(),
            &log,
        );

        let summary = coordinator.run(&[]).await.unwrap();
        assert_eq!(summary.tests[0].title, "works");
    }

    #[tokio::test]
    async fn test_state_resets_between_runs() {
        let log = Log::default();
        let coordinator = coordinator(
            vec![(
                "test.js",
                Plan::Healthy {
                    passing: vec!["works"],
                    stats_delay_ms: 0,
                },
            )],
            RunnerConfig::default(),
            &log,
        );

        let first = coordinator.run(&[]).await.unwrap();
        let second = coordinator.run(&[]).await.unwrap();
        assert_eq!(first.stats, second.stats);
        assert_eq!(second.stats.passed, 1);
        assert_eq!(second.tests.len(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_runs_are_serialized() {
        let log = Log::default();
        let coordinator = Arc::new(coordinator(
            vec![(
                "test.js",
                Plan::Healthy {
                    passing: vec!["works"],
                    stats_delay_ms: 10,
                },
            )],
            RunnerConfig::default(),
            &log,
        ));

        let first = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.run(&[]).await.unwrap() }
        });
        let second = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.run(&[]).await.unwrap() }
        });

        let (first, second) = (first.await.unwrap(), second.await.unwrap());
        assert_eq!(first.stats.passed, 1);
        assert_eq!(second.stats.passed, 1);
    }

    #[tokio::test]
    async fn test_cancel_converts_hung_sessions() {
        let log = Log::default();
        let coordinator = Arc::new(coordinator(
            vec![("stuck/test.js", Plan::Hangs)],
            RunnerConfig::default(),
            &log,
        ));

        let run = tokio::spawn({
            let coordinator = Arc::clone(&coordinator);
            async move { coordinator.run(&[]).await.unwrap() }
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        coordinator.cancel();

        let summary = run.await.unwrap();
        assert_eq!(summary.stats.test_count, 0);
        assert_eq!(summary.stats.exceptions, 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(summary.errors[0].file, Some(PathBuf::from("stuck/test.js")));
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_isolated() {
        // one file has no plan, so its launch fails; the other still runs
        let log = Log::default();
        let paths = vec![PathBuf::from("missing/test.js"), PathBuf::from("ok/test.js")];
        let plans = HashMap::from([(
            PathBuf::from("ok/test.js"),
            Plan::Healthy {
                passing: vec!["works"],
                stats_delay_ms: 0,
            },
        )]);
        let coordinator = Coordinator::with_collaborators(
            RunnerConfig::default(),
            Arc::new(StaticDiscovery(paths)),
            Arc::new(NullCache),
            Arc::new(StubLauncher {
                plans: StdMutex::new(plans),
                log: log.clone(),
            }),
            Arc::new(CaptureFormatter),
        );

        let summary = coordinator.run(&[]).await.unwrap();
        assert_eq!(summary.stats.passed, 1);
        assert_eq!(summary.stats.exceptions, 1);
        assert_eq!(summary.errors.len(), 1);
        assert_eq!(
            summary.errors[0].file,
            Some(PathBuf::from("missing/test.js"))
        );
    }
}
