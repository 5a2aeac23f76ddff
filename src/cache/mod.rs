//! Precompilation artifact cache
//!
//! Stores a content-addressed copy of each test file for workers to load
//! instead of recompiling the source.

#![allow(dead_code)]

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::discovery::TEST_FILE_EXTENSION;

/// Directory name used for the persistent cache
const CACHE_DIR_NAME: &str = "isorun";

/// Length of the hex id derived from the content hash
const ARTIFACT_ID_LEN: usize = 16;

/// A content-addressed precompiled artifact
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    /// Content-derived identifier
    pub id: String,
    /// On-disk location of the compiled form
    pub path: PathBuf,
}

/// Produces precompiled artifacts for test files
pub trait ArtifactCache: Send + Sync {
    fn precompile(&self, file: &Path) -> Result<Artifact>;
}

/// Content-hash cache backed by a directory
pub struct ContentCache {
    dir: PathBuf,
    /// Keeps the per-run directory alive while caching is disabled
    _scratch: Option<tempfile::TempDir>,
}

impl ContentCache {
    /// Persistent cache when `enabled`, per-run scratch directory otherwise
    pub fn new(enabled: bool) -> Result<Self> {
        if enabled {
            let base = dirs::cache_dir().unwrap_or_else(std::env::temp_dir);
            Self::at_dir(base.join(CACHE_DIR_NAME))
        } else {
            let scratch =
                tempfile::tempdir().context("failed to create scratch cache directory")?;
            Ok(Self {
                dir: scratch.path().to_path_buf(),
                _scratch: Some(scratch),
            })
        }
    }

    /// Cache rooted at an explicit directory
    pub fn at_dir(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create cache directory: {}", dir.display()))?;
        Ok(Self {
            dir,
            _scratch: None,
        })
    }
}

impl ArtifactCache for ContentCache {
    fn precompile(&self, file: &Path) -> Result<Artifact> {
        let contents = fs::read(file)
            .with_context(|| format!("failed to read test file: {}", file.display()))?;

        let digest = Sha256::digest(&contents);
        let mut id = format!("{digest:x}");
        id.truncate(ARTIFACT_ID_LEN);

        let path = self.dir.join(format!("{id}.{TEST_FILE_EXTENSION}"));
        if !path.exists() {
            // a concurrent writer for the same id produces identical bytes
            fs::write(&path, &contents)
                .with_context(|| format!("failed to write artifact: {}", path.display()))?;
            debug!("cached artifact {} for {}", id, file.display());
        }

        Ok(Artifact { id, path })
    }
}
