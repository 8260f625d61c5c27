//! Test fixtures for pipelines: landing-file mocks and a failing sink.
//!
//! These helpers back the integration tests and are useful for end users
//! writing their own: seed a landing directory with newline-delimited JSON,
//! or substitute a sink that always fails to exercise failure isolation.

use crate::error::IngestError;
use crate::io::parquet::ColumnarSink;
use crate::mapping::{Cell, MappingPlan};
use serde_json::Value;
use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Write `records` as a newline-delimited JSON landing file under `dir`.
///
/// Parent directories are created as needed, so `name` may contain
/// subdirectories (`"2025/08/batch-1.jsonl"`).
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
pub fn mock_landing_file(dir: &Path, name: &str, records: &[Value]) -> std::io::Result<PathBuf> {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let mut file = File::create(&path)?;
    for record in records {
        writeln!(file, "{record}")?;
    }
    file.flush()?;
    Ok(path)
}

/// Gzip-compressed variant of [`mock_landing_file`].
///
/// # Errors
///
/// Returns an error if the file cannot be created or written.
#[cfg(feature = "compression-gzip")]
pub fn mock_landing_file_gz(dir: &Path, name: &str, records: &[Value]) -> std::io::Result<PathBuf> {
    use flate2::Compression;
    use flate2::write::GzEncoder;

    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        create_dir_all(parent)?;
    }
    let file = File::create(&path)?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    for record in records {
        writeln!(encoder, "{record}")?;
    }
    encoder.finish()?;
    Ok(path)
}

/// A sink that always reports a write failure without touching the
/// destination, for exercising failure isolation and checkpoint ordering.
#[derive(Clone, Copy, Debug, Default)]
pub struct FailingSink;

impl ColumnarSink for FailingSink {
    fn write(
        &self,
        _plan: &MappingPlan,
        _rows: &[Vec<Cell>],
        dest: &Path,
    ) -> Result<usize, IngestError> {
        Err(IngestError::write_failure(dest, "injected failure"))
    }
}
