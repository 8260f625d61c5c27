//! Pipeline configuration: which sources to ingest and where state lives.
//!
//! A pipeline is configured with an ordered list of logical sources, each a
//! `{name, input_dir, output_dir}` triple. Adding or removing entries is the
//! only supported way to change what is ingested. The configuration is loaded
//! once at process start and consumed read-only by the rest of the pipeline.
//!
//! # Example
//!
//! ```json
//! {
//!   "pipeline": "bank-datalake",
//!   "bookmark_dir": "state/bookmarks",
//!   "sources": [
//!     {
//!       "name": "transactions",
//!       "input_dir": "landing/transactions",
//!       "output_dir": "bronze/transactions"
//!     }
//!   ]
//! }
//! ```

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// One logical source: a named stream of incoming records with its own
/// landing directory, output directory, and bookmark scope.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceConfig {
    /// Unique name of the source; also names its bookmark scope.
    pub name: String,
    /// Landing directory scanned (recursively) for newline-delimited JSON files.
    pub input_dir: PathBuf,
    /// Output directory that receives the Parquet files.
    pub output_dir: PathBuf,
}

/// Full pipeline configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Pipeline identity; the first half of every bookmark scope.
    pub pipeline: String,
    /// Directory where bookmark files and run metadata are stored.
    pub bookmark_dir: PathBuf,
    /// Ordered list of sources, processed one after another within a run.
    pub sources: Vec<SourceConfig>,
}

impl PipelineConfig {
    /// Load and validate a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// validation fails (see [`PipelineConfig::validate`]).
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw =
            fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("parse pipeline config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants: a non-empty pipeline name, and unique,
    /// non-empty source names.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first violated invariant.
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.trim().is_empty() {
            bail!("pipeline name must not be empty");
        }
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                bail!("source name must not be empty");
            }
            if !seen.insert(source.name.as_str()) {
                bail!("duplicate source name: {}", source.name);
            }
        }
        Ok(())
    }
}
