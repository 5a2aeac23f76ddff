//! Runner configuration
//!
//! Handles loading and managing configuration, including pass-through
//! fields forwarded verbatim to each worker.

#![allow(dead_code)]

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration file locations (in order of precedence)
const CONFIG_LOCATIONS: &[&str] = &[
    "./isorun.yaml",
    "./isorun.yml",
    "./.isorun.yaml",
    "./isorun.json",
];

/// Options governing a run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunnerConfig {
    /// Modules preloaded in every worker
    pub require_modules: Vec<String>,

    /// Force sequential execution in dispatch order
    pub serial: bool,

    /// Use the persistent precompilation cache
    pub cache_enabled: bool,

    /// Always prefix test titles, even for a single file
    pub explicit_titles: bool,

    /// Cap on concurrently running files (parallel mode only)
    pub concurrency: Option<usize>,

    /// Interpreter argv each test file is handed to
    pub worker: Vec<String>,

    /// Unrecognized fields, forwarded verbatim to each worker
    #[serde(flatten)]
    pub worker_options: serde_json::Map<String, serde_json::Value>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            require_modules: Vec::new(),
            serial: false,
            cache_enabled: true,
            explicit_titles: false,
            concurrency: None,
            worker: vec!["node".to_string()],
            worker_options: serde_json::Map::new(),
        }
    }
}

impl RunnerConfig {
    /// Find a configuration file in the standard locations
    pub fn find() -> Option<PathBuf> {
        CONFIG_LOCATIONS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }

    /// Load configuration from the default location, or defaults
    pub fn load_default() -> Result<Self> {
        match Self::find() {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let config: Self = if is_yaml_file(path) {
            serde_yaml::from_str(&content)
                .with_context(|| format!("failed to parse YAML config: {}", path.display()))?
        } else {
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse JSON config: {}", path.display()))?
        };

        Ok(config)
    }
}

fn is_yaml_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == "yaml" || ext == "yml")
        .unwrap_or(false)
}
