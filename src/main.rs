//! isorun - Isolated test file runner
//!
//! Runs each test file in its own worker, synchronizes worker startup
//! behind a readiness barrier, and aggregates per-file results into a
//! single summary.
//!
//! ## Features
//!
//! - One isolated worker per test file; a crashing file never harms its
//!   siblings
//! - Serial or parallel execution with deterministic aggregate results
//! - Classified error reporting (rejections, exceptions, test failures)
//! - Content-hash precompilation cache shared across workers
//! - Table, JSON, and summary output formats
//!
//! ## Usage
//!
//! ```bash
//! # Run the default test file patterns
//! isorun run
//!
//! # Run specific patterns serially
//! isorun run "test-*.js" --serial
//!
//! # Cap parallelism and preload a module in every worker
//! isorun run --concurrency 4 --require ./setup.js
//!
//! # List the files a pattern set resolves to
//! isorun list test
//! ```

use anyhow::Result;
use clap::Parser;
use std::io::Write;

mod aggregate;
mod assertions;
mod cache;
mod cli;
mod config;
mod coordinator;
mod discovery;
mod models;
mod output;
mod session;
mod utils;

use aggregate::RunEvent;
use cli::Args;
use config::RunnerConfig;
use coordinator::Coordinator;
use discovery::{Discovery, FileDiscovery};
use output::{OutputFormat, ResultFormatter};
use utils::LogLevel;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };
    utils::init_logger(level);

    match args.command {
        cli::Command::Run(run_args) => run_files(run_args).await,
        cli::Command::List(list_args) => list_files(list_args),
    }
}

async fn run_files(args: cli::RunArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => RunnerConfig::load(path)?,
        None => RunnerConfig::load_default()?,
    };
    if args.serial {
        config.serial = true;
    }
    if args.no_cache {
        config.cache_enabled = false;
    }
    if args.explicit_titles {
        config.explicit_titles = true;
    }
    if let Some(concurrency) = args.concurrency {
        config.concurrency = Some(concurrency);
    }
    config.require_modules.extend(args.require.iter().cloned());
    if let Some(worker) = &args.worker {
        config.worker = worker.split_whitespace().map(str::to_string).collect();
    }

    let format = OutputFormat::from_str(&args.format).unwrap_or(OutputFormat::Table);
    let formatter = ResultFormatter::new(format);

    let coordinator = Coordinator::new(config)?;
    let mut events = coordinator.subscribe();
    let printer = tokio::spawn(async move {
        let line_formatter = ResultFormatter::default();
        while let Some(event) = events.recv().await {
            match event {
                RunEvent::Ready { test_count } => {
                    tracing::info!("running {} known test(s)", test_count);
                }
                RunEvent::Test(test) => println!("{}", line_formatter.format_test(&test)),
                RunEvent::Error(error) => eprintln!("{}", line_formatter.format_error(&error)),
                RunEvent::Stdout { chunk, .. } => {
                    let _ = std::io::stdout().write_all(&chunk);
                }
                RunEvent::Stderr { chunk, .. } => {
                    let _ = std::io::stderr().write_all(&chunk);
                }
            }
        }
    });

    let summary = coordinator.run(&args.patterns).await?;

    // dropping the coordinator closes the event stream
    drop(coordinator);
    let _ = printer.await;

    println!("{}", formatter.format_summary(&summary));

    if let Some(path) = &args.output {
        output::write_summary_to_file(path, &summary, format)?;
        println!("summary saved to {path}");
    }

    if !summary.is_all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

fn list_files(args: cli::ListArgs) -> Result<()> {
    let root = std::env::current_dir()?;
    let discovery = FileDiscovery::new(root.clone());
    let files = discovery.find(&args.patterns)?;

    if files.is_empty() {
        println!("no test files matched");
        return Ok(());
    }

    for file in &files {
        let rel = file.strip_prefix(&root).unwrap_or(file);
        println!("{}", rel.display());
    }
    println!("\n{} file(s)", files.len());

    Ok(())
}
