//! Landing-area reading: artifact discovery and record ingestion.
//!
//! A landing directory holds one or more artifacts - discrete files that can
//! be individually marked as processed. Discovery is recursive and returns a
//! deterministic, sorted listing; each artifact's id is its path relative to
//! the landing directory, which is what the bookmark store tracks.
//!
//! Records are newline-delimited JSON: one document per line, empty and
//! whitespace-only lines skipped. Files ending in `.gz` are decompressed
//! transparently when the `compression-gzip` feature is enabled.

use anyhow::{Context, Result};
use glob::glob;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

/// One discrete unit of input: a single landing file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    /// Path relative to the landing directory; the id the bookmark tracks.
    pub id: String,
    /// Absolute (or config-relative) path used to open the file.
    pub path: PathBuf,
}

/// List every artifact under a landing directory, recursively, in sorted
/// deterministic order.
///
/// Hidden files (leading `.`) and the staging suffix `.tmp` are skipped. A
/// missing or empty directory yields an empty listing, not an error: a source
/// with nothing landed yet is a normal no-op.
///
/// # Errors
///
/// Returns an error if the directory cannot be scanned.
pub fn discover(input_dir: &Path) -> Result<Vec<Artifact>> {
    if !input_dir.exists() {
        return Ok(Vec::new());
    }
    let pattern = format!("{}/**/*", input_dir.display());
    let paths = glob(&pattern).with_context(|| format!("invalid landing pattern: {pattern}"))?;

    let mut artifacts = Vec::new();
    for entry in paths {
        let path = entry.with_context(|| format!("scan landing dir {}", input_dir.display()))?;
        if !path.is_file() {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if name.starts_with('.') || name.ends_with(".tmp") {
            continue;
        }
        let id = path
            .strip_prefix(input_dir)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        artifacts.push(Artifact { id, path });
    }

    artifacts.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(artifacts)
}

/// Reads the record batch for a set of resolved artifacts.
///
/// The seam between the ingestor and the landing format; tests substitute
/// their own implementations.
pub trait RecordReader {
    /// Read every record from the given artifacts, in artifact order.
    ///
    /// # Errors
    ///
    /// Returns an error if any artifact cannot be opened or parsed.
    fn read(&self, artifacts: &[Artifact]) -> Result<Vec<Value>>;
}

/// Newline-delimited JSON reader for landing files.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonLinesReader;

impl RecordReader for JsonLinesReader {
    fn read(&self, artifacts: &[Artifact]) -> Result<Vec<Value>> {
        let mut records = Vec::new();
        for artifact in artifacts {
            read_into(&artifact.path, &mut records)?;
        }
        Ok(records)
    }
}

fn read_into(path: &Path, out: &mut Vec<Value>) -> Result<()> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader = BufReader::new(decompressed(file, path));
    for (i, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read line {} in {}", i + 1, path.display()))?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)
            .with_context(|| format!("parse JSON line {} in {}", i + 1, path.display()))?;
        out.push(value);
    }
    Ok(())
}

/// Wrap the file in a decompressor when its extension asks for one.
#[cfg(feature = "compression-gzip")]
fn decompressed(file: File, path: &Path) -> Box<dyn Read> {
    if path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz")) {
        Box::new(flate2::read::GzDecoder::new(file))
    } else {
        Box::new(file)
    }
}

#[cfg(not(feature = "compression-gzip"))]
fn decompressed(file: File, _path: &Path) -> Box<dyn Read> {
    Box::new(file)
}
