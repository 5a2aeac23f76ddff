//! Child-process worker sessions
//!
//! Runs each test file in its own process. The worker speaks
//! newline-delimited JSON on stdout; anything that does not parse as a
//! protocol message is forwarded as raw output.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use super::{
    RawError, RawTest, SessionEvent, SessionFailure, SessionLauncher, WorkerConfig, WorkerSession,
};
use crate::models::FileStats;

/// Environment variable carrying the worker configuration as JSON
pub const WORKER_CONFIG_ENV: &str = "ISORUN_WORKER_CONFIG";

/// Messages a worker writes on its stdout
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum WireMessage {
    #[serde(rename_all = "camelCase")]
    Stats { test_count: usize },
    Test(RawTest),
    Rejections { errors: Vec<RawError> },
    UncaughtException { error: RawError },
    Done { stats: FileStats },
}

/// Commands written to a worker's stdin
#[derive(Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
enum WireCommand {
    Run,
}

/// Launches one child process per test file
pub struct ProcessLauncher {
    worker_argv: Vec<String>,
}

impl ProcessLauncher {
    /// `worker_argv` is the interpreter command each file is handed to
    pub fn new(worker_argv: Vec<String>) -> Self {
        let worker_argv = if worker_argv.is_empty() {
            vec!["node".to_string()]
        } else {
            worker_argv
        };
        Self { worker_argv }
    }
}

#[async_trait]
impl SessionLauncher for ProcessLauncher {
    async fn launch(
        &self,
        config: WorkerConfig,
    ) -> Result<Box<dyn WorkerSession>, SessionFailure> {
        let payload = serde_json::to_string(&config)
            .map_err(|e| SessionFailure::Protocol(format!("unserializable worker config: {e}")))?;
        let target = config.artifact.clone().unwrap_or_else(|| config.file.clone());

        let mut command = Command::new(&self.worker_argv[0]);
        command
            .args(&self.worker_argv[1..])
            .arg(&target)
            .env(WORKER_CONFIG_ENV, payload)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("spawning worker for {}", config.file.display());
        let mut child = command.spawn().map_err(SessionFailure::Spawn)?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| SessionFailure::Protocol("worker stdin unavailable".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| SessionFailure::Protocol("worker stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| SessionFailure::Protocol("worker stderr unavailable".to_string()))?;

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (done_tx, done_rx) = oneshot::channel();

        let err_tx = event_tx.clone();
        tokio::spawn(async move {
            let mut stderr = stderr;
            let mut buf = [0u8; 4096];
            loop {
                match stderr.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if err_tx.send(SessionEvent::Stderr(buf[..n].to_vec())).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let file = config.file.clone();
        tokio::spawn(read_protocol(child, stdout, event_tx, done_tx, file));

        Ok(Box::new(ProcessSession {
            file: config.file,
            stdin: Some(stdin),
            events: Some(event_rx),
            done: Some(done_rx),
        }))
    }
}

/// Reads protocol messages until the worker reports its result or dies.
/// Owns the child so the exit status is available when the stream ends
/// without a result.
async fn read_protocol(
    mut child: Child,
    stdout: ChildStdout,
    events: mpsc::UnboundedSender<SessionEvent>,
    done: oneshot::Sender<Result<FileStats, SessionFailure>>,
    file: PathBuf,
) {
    let mut lines = BufReader::new(stdout).lines();
    let mut result = None;

    while let Ok(Some(line)) = lines.next_line().await {
        match serde_json::from_str::<WireMessage>(&line) {
            Ok(WireMessage::Stats { test_count }) => {
                let _ = events.send(SessionEvent::Stats { test_count });
            }
            Ok(WireMessage::Test(test)) => {
                let _ = events.send(SessionEvent::Test(test));
            }
            Ok(WireMessage::Rejections { errors }) => {
                let _ = events.send(SessionEvent::Rejections { errors });
            }
            Ok(WireMessage::UncaughtException { error }) => {
                let _ = events.send(SessionEvent::UncaughtException { error });
            }
            Ok(WireMessage::Done { stats }) => {
                result = Some(stats);
                break;
            }
            Err(_) => {
                let _ = events.send(SessionEvent::Stdout(format!("{line}\n").into_bytes()));
            }
        }
    }

    let outcome = match result {
        Some(stats) => {
            let _ = child.wait().await;
            Ok(stats)
        }
        None => {
            let status = match child.wait().await {
                Ok(status) => status.to_string(),
                Err(e) => e.to_string(),
            };
            warn!(
                "worker for {} exited before reporting results ({status})",
                file.display()
            );
            Err(SessionFailure::Exited { status })
        }
    };
    let _ = done.send(outcome);
}

/// A running worker process
pub struct ProcessSession {
    file: PathBuf,
    stdin: Option<ChildStdin>,
    events: Option<mpsc::UnboundedReceiver<SessionEvent>>,
    done: Option<oneshot::Receiver<Result<FileStats, SessionFailure>>>,
}

#[async_trait]
impl WorkerSession for ProcessSession {
    fn file(&self) -> &Path {
        &self.file
    }

    fn take_events(&mut self) -> mpsc::UnboundedReceiver<SessionEvent> {
        self.events.take().expect("session events already taken")
    }

    async fn run(&mut self) -> Result<FileStats, SessionFailure> {
        let stdin = self
            .stdin
            .take()
            .ok_or_else(|| SessionFailure::Protocol("session already ran".to_string()))?;
        let done = self
            .done
            .take()
            .ok_or_else(|| SessionFailure::Protocol("session already ran".to_string()))?;

        // the run command is the only message a worker ever receives, so
        // stdin is closed right after. A failed write means the worker is
        // already gone; its exit surfaces through the protocol reader.
        if let Err(e) = send_run_command(stdin).await {
            debug!("failed to send run command to {}: {e}", self.file.display());
        }

        done.await
            .map_err(|_| SessionFailure::Protocol("worker channel closed".to_string()))?
    }
}

async fn send_run_command(mut stdin: ChildStdin) -> std::io::Result<()> {
    let command = serde_json::to_string(&WireCommand::Run).unwrap_or_default();
    stdin.write_all(command.as_bytes()).await?;
    stdin.write_all(b"\n").await?;
    stdin.flush().await?;
    Ok(())
}
