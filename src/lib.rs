//! # Bronzeflow
//!
//! An **incremental ingestion pipeline** for Rust that moves newly-arrived
//! newline-delimited JSON records from per-source landing directories into
//! per-source Parquet output directories - exactly once per landing file,
//! with per-source bookmarks so repeated runs never reprocess data that has
//! already been ingested.
//!
//! ## Key Features
//!
//! - **Per-source bookmarks** - each (pipeline, source) scope tracks exactly
//!   which landing files it has processed; reruns are safe no-ops
//! - **Schema-aware** - the field list is inspected from each batch at run
//!   time, no static schema required
//! - **Date casting by convention** - fields whose name contains `date` are
//!   parsed as calendar dates; everything else passes through unchanged
//! - **Crash-safe ordering** - bookmarks advance only after the Parquet
//!   write has durably succeeded, and output names are derived from the
//!   input set so reruns overwrite rather than duplicate
//! - **Row-level error isolation** - a malformed value rejects one row, not
//!   the batch; a failed source never stops the remaining sources
//! - **Gzip landing files** - `.gz` artifacts are decompressed transparently
//!   (feature `compression-gzip`)
//!
//! ## Quick Start
//!
//! ```no_run
//! use bronzeflow::{PipelineConfig, PipelineRunner};
//! # use anyhow::Result;
//!
//! # fn main() -> Result<()> {
//! let config = PipelineConfig::from_file("pipeline.json")?;
//! let runner = PipelineRunner::new(config)?;
//! let summary = runner.run()?;
//!
//! print!("{summary}");
//! assert!(summary.all_ok());
//! # Ok(())
//! # }
//! ```
//!
//! ## How a run works
//!
//! For each configured source, in order:
//!
//! 1. **Resolve** - list the landing directory and subtract the artifacts
//!    already covered by the source's bookmark. Nothing new? The source is
//!    skipped and its bookmark untouched.
//! 2. **Plan** - inspect the batch's fields ([`schema`]) and derive the
//!    per-field cast/pass-through plan ([`mapping`]).
//! 3. **Write** - apply the plan to every record and write one Parquet file,
//!    staged and renamed so failures leave nothing partially visible.
//! 4. **Commit** - advance the bookmark to cover exactly the resolved
//!    artifacts. This is the single point where "processed" becomes true.
//!
//! A failure in any stage is contained to that source; the runner attempts
//! the remaining sources and reports everything in a [`runner::RunSummary`].
//! After the last source, the run metadata is flushed as one final
//! pipeline-wide commit.
//!
//! ## Module Overview
//!
//! - [`config`] - pipeline and source configuration
//! - [`checkpoint`] - the bookmark store (resolution, commits, leases)
//! - [`schema`] - batch schema inspection
//! - [`mapping`] - mapping plans: per-field cast/pass-through
//! - [`ingest`] - the per-source ingestion state machine
//! - [`runner`] - pipeline execution and the run summary
//! - [`io`] - landing readers and the Parquet sink
//! - [`error`] - the failure taxonomy
//! - [`testing`] - fixtures for pipeline tests
//!
//! ## Feature Flags
//!
//! - `compression-gzip` *(default)* - transparent decompression of `.gz`
//!   landing files

pub mod checkpoint;
pub mod config;
pub mod error;
pub mod ingest;
pub mod io;
pub mod mapping;
pub mod runner;
pub mod schema;
pub mod testing;

// General re-exports
pub use checkpoint::{BookmarkScope, BookmarkStore};
pub use config::{PipelineConfig, SourceConfig};
pub use error::IngestError;
pub use ingest::{TableIngestor, TableOutcome};
pub use io::landing::{Artifact, JsonLinesReader, RecordReader};
pub use io::parquet::{ColumnarSink, ParquetSink};
pub use mapping::{CastRule, Cell, MappingPlan};
pub use runner::{PipelineRunner, RunSummary};
pub use schema::{FieldDescriptor, FieldKind};
