//! Per-source ingestion: resolve, plan, write, commit.
//!
//! One [`TableIngestor::ingest`] call moves one logical source through the
//! run: resolve the artifacts not yet covered by the source's bookmark,
//! short-circuit if there are none, inspect and plan over the batch, write
//! the transformed batch to the output location, and only then advance the
//! bookmark. The progression is `Resolving -> (Empty | Planning) -> Writing
//! -> Committed`, with any failure absorbing into [`TableOutcome::Failed`].
//!
//! # Correctness
//!
//! - The bookmark commit strictly follows a successful write. A crash in any
//!   earlier stage leaves the bookmark unchanged, so a rerun resolves the
//!   same artifacts again.
//! - The output file name is derived from the resolved artifact set, so a
//!   rerun over the same artifacts overwrites the same file: at-least-once
//!   delivery with exactly-once effect.
//! - Malformed rows are rejected individually ([`RowErrors`]); they never
//!   abort the batch.
//! - A failure here is contained: the pipeline runner keeps going with the
//!   remaining sources.

use crate::checkpoint::{BookmarkScope, BookmarkStore, compute_checksum};
use crate::config::SourceConfig;
use crate::error::IngestError;
use crate::io::landing::{self, Artifact, RecordReader};
use crate::io::parquet::ColumnarSink;
use crate::mapping::{Cell, MappingPlan};
use crate::schema;
use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, info, warn};

/// Terminal outcome of one source's run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TableOutcome {
    /// New artifacts were written and the bookmark advanced to cover them.
    Committed {
        artifacts: usize,
        rows: usize,
        rejected: usize,
    },
    /// No new artifacts since the last bookmark; nothing changed.
    Empty,
    /// The source failed this run; its bookmark is untouched.
    Failed { reason: String },
}

impl TableOutcome {
    /// True for the two non-failing terminals, `Committed` and `Empty`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        !matches!(self, TableOutcome::Failed { .. })
    }
}

/// Rejected rows collected while applying a mapping plan.
///
/// Each entry is the row's index in the batch plus the cast failure that
/// rejected it. Only the first few are logged in detail.
#[derive(Debug, Default)]
pub struct RowErrors {
    errors: Vec<(usize, IngestError)>,
}

const LOGGED_REJECTS: usize = 10;

impl RowErrors {
    pub fn record(&mut self, row: usize, error: IngestError) {
        if self.errors.len() < LOGGED_REJECTS {
            warn!(row, %error, "rejecting row");
        }
        self.errors.push((row, error));
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[(usize, IngestError)] {
        &self.errors
    }
}

/// Orchestrates one logical source per invocation.
pub struct TableIngestor<'a> {
    pub pipeline: &'a str,
    pub store: &'a BookmarkStore,
    pub reader: &'a dyn RecordReader,
    pub sink: &'a dyn ColumnarSink,
}

impl TableIngestor<'_> {
    /// Run one source to a terminal outcome. Never propagates an error; a
    /// failure is logged and absorbed into [`TableOutcome::Failed`].
    pub fn ingest(&self, source: &SourceConfig) -> TableOutcome {
        info!(source = %source.name, "starting ingestion");
        match self.try_ingest(source) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(source = %source.name, error = %format!("{e:#}"), "ingestion failed");
                TableOutcome::Failed {
                    reason: format!("{e:#}"),
                }
            }
        }
    }

    fn try_ingest(&self, source: &SourceConfig) -> Result<TableOutcome> {
        let scope = BookmarkScope::new(self.pipeline, &source.name);
        let _lease = self
            .store
            .acquire(&scope)
            .map_err(|e| IngestError::checkpoint_unavailable(format!("{e:#}")))?;

        // Resolving
        let candidates = landing::discover(&source.input_dir)?;
        let pending = self
            .store
            .resolve_new(&scope, &candidates)
            .map_err(|e| IngestError::checkpoint_unavailable(format!("{e:#}")))?;
        if pending.is_empty() {
            info!(source = %source.name, "skipping - no new data");
            return Ok(TableOutcome::Empty);
        }

        // Planning
        let records = self.reader.read(&pending)?;
        let fields = schema::inspect(&records)?;
        let plan = MappingPlan::derive(&fields);
        let (rows, rejects) = apply_plan(&plan, &records);
        if !rejects.is_empty() {
            warn!(
                source = %source.name,
                rejected = rejects.len(),
                "rejected rows excluded from batch"
            );
        }

        // Writing
        let dest = source.output_dir.join(part_file_name(&pending));
        let written = self.sink.write(&plan, &rows, &dest)?;

        // Committed: the single point where "processed" becomes true.
        self.store
            .commit(&scope, &pending)
            .map_err(|e| IngestError::checkpoint_unavailable(format!("{e:#}")))?;

        info!(
            source = %source.name,
            artifacts = pending.len(),
            rows = written,
            rejected = rejects.len(),
            "committed"
        );
        Ok(TableOutcome::Committed {
            artifacts: pending.len(),
            rows: written,
            rejected: rejects.len(),
        })
    }
}

/// Apply a plan to every record; malformed rows go to [`RowErrors`].
pub fn apply_plan(plan: &MappingPlan, records: &[Value]) -> (Vec<Vec<Cell>>, RowErrors) {
    let mut rows = Vec::with_capacity(records.len());
    let mut rejects = RowErrors::default();
    for (index, record) in records.iter().enumerate() {
        match plan.apply_row(record) {
            Ok(row) => rows.push(row),
            Err(e) => rejects.record(index, e),
        }
    }
    (rows, rejects)
}

/// Deterministic output file name for a resolved artifact set.
///
/// Same artifacts, same name: a rerun after a crash between write and commit
/// overwrites its previous output instead of duplicating it.
#[must_use]
pub fn part_file_name(artifacts: &[Artifact]) -> String {
    let mut ids: Vec<&str> = artifacts.iter().map(|a| a.id.as_str()).collect();
    ids.sort_unstable();
    let digest = compute_checksum(ids.join("\n").as_bytes());
    format!("part-{}.parquet", &digest[..16])
}
