//! CLI argument parsing
//!
//! Defines command-line interface using clap.

use clap::{Parser, Subcommand};

/// Isolated test file runner
#[derive(Parser, Debug)]
#[command(name = "isorun")]
#[command(version = "0.1.0")]
#[command(about = "Run test files in isolated workers and aggregate the results")]
#[command(long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run test files
    Run(RunArgs),

    /// List the test files a pattern set resolves to
    List(ListArgs),
}

/// Arguments for run command
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// File patterns to run (standard test file patterns when omitted)
    pub patterns: Vec<String>,

    /// Run files sequentially in dispatch order
    #[arg(short, long)]
    pub serial: bool,

    /// Cap on concurrently running files
    #[arg(short, long)]
    pub concurrency: Option<usize>,

    /// Disable the persistent precompilation cache
    #[arg(long)]
    pub no_cache: bool,

    /// Module preloaded in every worker (repeatable)
    #[arg(short, long)]
    pub require: Vec<String>,

    /// Interpreter command test files are handed to
    #[arg(short, long)]
    pub worker: Option<String>,

    /// Always prefix test titles with their file
    #[arg(long)]
    pub explicit_titles: bool,

    /// Output format (table, json, json-pretty, summary)
    #[arg(short, long, default_value = "table")]
    pub format: String,

    /// Save the summary to a file
    #[arg(short, long)]
    pub output: Option<String>,

    /// Configuration file
    #[arg(long)]
    pub config: Option<String>,
}

/// Arguments for list command
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// File patterns to resolve
    pub patterns: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_args_parse() {
        let args = Args::parse_from([
            "isorun", "run", "test-*.js", "--serial", "--require", "setup", "-c", "2",
        ]);
        match args.command {
            Command::Run(run) => {
                assert_eq!(run.patterns, vec!["test-*.js".to_string()]);
                assert!(run.serial);
                assert_eq!(run.require, vec!["setup".to_string()]);
                assert_eq!(run.concurrency, Some(2));
                assert_eq!(run.format, "table");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_list_args_parse() {
        let args = Args::parse_from(["isorun", "list", "test"]);
        match args.command {
            Command::List(list) => assert_eq!(list.patterns, vec!["test".to_string()]),
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
