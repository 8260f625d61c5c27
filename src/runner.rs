//! Pipeline execution: every configured source, one after another, with
//! per-source failure isolation and a final pipeline-wide commit.
//!
//! The runner never lets one source's failure prevent attempting the rest.
//! After the last source has been attempted - success or failure - it flushes
//! the run metadata through the bookmark store, then reports a [`RunSummary`]
//! whose aggregate status is success only if every source reached
//! `Committed` or `Empty`.

use crate::checkpoint::{BookmarkStore, current_timestamp_ms};
use crate::config::PipelineConfig;
use crate::ingest::{TableIngestor, TableOutcome};
use crate::io::landing::{JsonLinesReader, RecordReader};
use crate::io::parquet::{ColumnarSink, ParquetSink};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fmt;
use tracing::info;

/// One source's line in the run report.
#[derive(Clone, Debug, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub outcome: TableOutcome,
}

/// Run-level summary: per source, one of {committed N artifacts, skipped -
/// no new data, failed - reason}.
#[derive(Clone, Debug, Serialize)]
pub struct RunSummary {
    pub pipeline: String,
    pub finished_at_ms: u64,
    pub sources: Vec<SourceReport>,
}

impl RunSummary {
    /// True iff every source reached `Committed` or `Empty`.
    #[must_use]
    pub fn all_ok(&self) -> bool {
        self.sources.iter().all(|report| report.outcome.is_ok())
    }

    /// Outcome for one source, if it was part of this run.
    pub fn outcome_for(&self, source: &str) -> Option<&TableOutcome> {
        self.sources
            .iter()
            .find(|report| report.source == source)
            .map(|report| &report.outcome)
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "pipeline {}:", self.pipeline)?;
        for report in &self.sources {
            match &report.outcome {
                TableOutcome::Committed {
                    artifacts,
                    rows,
                    rejected,
                } => writeln!(
                    f,
                    "  {}: committed {artifacts} artifacts ({rows} rows, {rejected} rejected)",
                    report.source
                )?,
                TableOutcome::Empty => {
                    writeln!(f, "  {}: skipped - no new data", report.source)?;
                }
                TableOutcome::Failed { reason } => {
                    writeln!(f, "  {}: failed - {reason}", report.source)?;
                }
            }
        }
        Ok(())
    }
}

/// Runs the configured sources in order against a bookmark store and a pair
/// of I/O implementations.
pub struct PipelineRunner {
    config: PipelineConfig,
    store: BookmarkStore,
    reader: Box<dyn RecordReader>,
    sink: Box<dyn ColumnarSink>,
}

impl PipelineRunner {
    /// Build a runner with the default landing reader and Parquet sink.
    ///
    /// # Errors
    ///
    /// Returns an error if the bookmark store cannot be opened.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_io(config, Box::new(JsonLinesReader), Box::new(ParquetSink))
    }

    /// Build a runner with caller-supplied I/O implementations.
    ///
    /// # Errors
    ///
    /// Returns an error if the bookmark store cannot be opened.
    pub fn with_io(
        config: PipelineConfig,
        reader: Box<dyn RecordReader>,
        sink: Box<dyn ColumnarSink>,
    ) -> Result<Self> {
        let store = BookmarkStore::open(&config.bookmark_dir)
            .context("open bookmark store")?;
        Ok(Self {
            config,
            store,
            reader,
            sink,
        })
    }

    /// Execute one pipeline run.
    ///
    /// Every configured source is attempted in order; a source's failure is
    /// recorded in the summary and iteration continues. The final run commit
    /// happens after the last source, regardless of individual outcomes.
    ///
    /// # Errors
    ///
    /// Returns an error only if the final run commit itself fails; per-source
    /// failures are reported through the summary, not as errors.
    pub fn run(&self) -> Result<RunSummary> {
        let ingestor = TableIngestor {
            pipeline: &self.config.pipeline,
            store: &self.store,
            reader: self.reader.as_ref(),
            sink: self.sink.as_ref(),
        };

        let mut sources = Vec::with_capacity(self.config.sources.len());
        for source in &self.config.sources {
            let outcome = ingestor.ingest(source);
            sources.push(SourceReport {
                source: source.name.clone(),
                outcome,
            });
        }

        let summary = RunSummary {
            pipeline: self.config.pipeline.clone(),
            finished_at_ms: current_timestamp_ms(),
            sources,
        };

        // Final pipeline-wide commit, after all per-table work completes.
        let path = self
            .store
            .commit_run(&self.config.pipeline, &summary)
            .context("commit run metadata")?;
        info!(
            pipeline = %self.config.pipeline,
            metadata = %path.display(),
            ok = summary.all_ok(),
            "run finished"
        );
        Ok(summary)
    }
}
