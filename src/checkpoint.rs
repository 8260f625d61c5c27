//! Per-source bookmarks: durable markers of which landing artifacts have
//! already been ingested.
//!
//! Each (pipeline identity, logical source name) pair - a [`BookmarkScope`] -
//! owns one bookmark file holding the set of processed artifact ids. The two
//! operations the pipeline depends on are [`BookmarkStore::resolve_new`]
//! (filter a candidate listing down to the artifacts not yet covered) and
//! [`BookmarkStore::commit`] (advance the bookmark to cover exactly the
//! artifacts just written). Committing an already-committed set is a no-op.
//!
//! # Ordering invariant
//!
//! A bookmark is advanced only after its corresponding write has durably
//! succeeded. Nothing in this module enforces that by itself - the table
//! ingestor sequences write-then-commit - but the store guarantees that a
//! commit which never happens leaves the previous bookmark intact, so a rerun
//! resolves the same artifacts again.
//!
//! # Integrity and atomicity
//!
//! Bookmark files are JSON with a SHA-256 checksum over their identifying
//! fields, verified on load. Persistence is staged to a temporary file and
//! renamed into place, so a crash mid-commit leaves the old bookmark visible.
//!
//! # Single writer
//!
//! Within one scope only one run may hold the bookmark at a time. The store
//! issues an exclusive [`Lease`] per scope; a second acquisition fails until
//! the first is released.

use crate::io::landing::Artifact;
use anyhow::{Context, Result, anyhow, bail};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions, create_dir_all};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Identity of one bookmark: pipeline plus logical source name.
///
/// The explicit pair replaces interpolating the source name into a global
/// tracking key; there is no ambient state.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BookmarkScope {
    pub pipeline: String,
    pub source: String,
}

impl BookmarkScope {
    pub fn new(pipeline: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
            source: source.into(),
        }
    }

    fn file_stem(&self) -> String {
        format!(
            "bookmark_{}_{}",
            sanitize(&self.pipeline),
            sanitize(&self.source)
        )
    }
}

/// On-disk bookmark payload.
#[derive(Serialize, Deserialize)]
struct BookmarkFile {
    pipeline: String,
    source: String,
    /// Sorted processed artifact ids.
    processed: Vec<String>,
    /// SHA-256 over the identifying fields, for integrity verification.
    checksum: String,
}

impl BookmarkFile {
    fn expected_checksum(&self) -> String {
        bookmark_checksum(&self.pipeline, &self.source, &self.processed)
    }
}

fn bookmark_checksum(pipeline: &str, source: &str, processed: &[String]) -> String {
    let payload = format!("{}:{}:{}", pipeline, source, processed.join(","));
    compute_checksum(payload.as_bytes())
}

/// Manages bookmark persistence, resolution, and per-scope leases.
pub struct BookmarkStore {
    directory: PathBuf,
}

impl BookmarkStore {
    /// Open (creating if needed) a store rooted at `directory`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self> {
        let directory = directory.into();
        create_dir_all(&directory).context("create bookmark directory")?;
        Ok(Self { directory })
    }

    /// The set of artifact ids already covered by the scope's bookmark.
    ///
    /// A scope with no bookmark file yet resolves to the empty set.
    ///
    /// # Errors
    ///
    /// Returns an error if the bookmark file exists but cannot be read,
    /// parsed, or fails its integrity check.
    pub fn processed(&self, scope: &BookmarkScope) -> Result<BTreeSet<String>> {
        let path = self.bookmark_path(scope);
        if !path.exists() {
            return Ok(BTreeSet::new());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("read bookmark {}", path.display()))?;
        let file: BookmarkFile = serde_json::from_str(&raw)
            .with_context(|| format!("parse bookmark {}", path.display()))?;
        if file.checksum != file.expected_checksum() {
            bail!(
                "bookmark integrity check failed for {}: checksum mismatch",
                path.display()
            );
        }
        Ok(file.processed.into_iter().collect())
    }

    /// Filter a candidate artifact listing down to the ones not yet covered
    /// by the scope's bookmark, preserving candidate order.
    ///
    /// # Errors
    ///
    /// Returns an error if the bookmark cannot be loaded.
    pub fn resolve_new(
        &self,
        scope: &BookmarkScope,
        candidates: &[Artifact],
    ) -> Result<Vec<Artifact>> {
        let processed = self.processed(scope)?;
        Ok(candidates
            .iter()
            .filter(|artifact| !processed.contains(&artifact.id))
            .cloned()
            .collect())
    }

    /// Advance the scope's bookmark to additionally cover `artifacts`.
    ///
    /// Idempotent: committing an already-committed set changes nothing and
    /// touches no file.
    ///
    /// # Errors
    ///
    /// Returns an error if the bookmark cannot be loaded or persisted.
    pub fn commit(&self, scope: &BookmarkScope, artifacts: &[Artifact]) -> Result<()> {
        let mut processed = self.processed(scope)?;
        let before = processed.len();
        processed.extend(artifacts.iter().map(|a| a.id.clone()));
        if processed.len() == before && self.bookmark_path(scope).exists() {
            return Ok(());
        }

        let processed: Vec<String> = processed.into_iter().collect();
        let file = BookmarkFile {
            checksum: bookmark_checksum(&scope.pipeline, &scope.source, &processed),
            pipeline: scope.pipeline.clone(),
            source: scope.source.clone(),
            processed,
        };
        self.persist(&self.bookmark_path(scope), &file)
    }

    /// Acquire the exclusive per-scope lease.
    ///
    /// # Errors
    ///
    /// Returns an error if another run holds the lease, or the lease file
    /// cannot be created.
    pub fn acquire(&self, scope: &BookmarkScope) -> Result<Lease> {
        let path = self.directory.join(format!("{}.lock", scope.file_stem()));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::AlreadyExists {
                    anyhow!(
                        "scope {}/{} is leased by another run ({})",
                        scope.pipeline,
                        scope.source,
                        path.display()
                    )
                } else {
                    anyhow!("create lease {}: {e}", path.display())
                }
            })?;
        let _ = writeln!(
            file,
            "pid={} ts={}",
            std::process::id(),
            current_timestamp_ms()
        );
        Ok(Lease { path })
    }

    /// Flush run metadata: the pipeline-wide commit performed once after all
    /// per-source work completes. Overwrites the previous run's record.
    ///
    /// # Errors
    ///
    /// Returns an error if the metadata cannot be serialized or persisted.
    pub fn commit_run<T: Serialize>(&self, pipeline: &str, metadata: &T) -> Result<PathBuf> {
        let path = self
            .directory
            .join(format!("run_{}.json", sanitize(pipeline)));
        let encoded = serde_json::to_string_pretty(metadata).context("serialize run metadata")?;
        write_atomic(&path, encoded.as_bytes())?;
        Ok(path)
    }

    fn bookmark_path(&self, scope: &BookmarkScope) -> PathBuf {
        self.directory.join(format!("{}.json", scope.file_stem()))
    }

    fn persist(&self, path: &Path, file: &BookmarkFile) -> Result<()> {
        let encoded = serde_json::to_string_pretty(file).context("serialize bookmark")?;
        write_atomic(path, encoded.as_bytes())
    }
}

/// Exclusive hold on one bookmark scope; released on drop.
pub struct Lease {
    path: PathBuf,
}

impl Drop for Lease {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Stage to a sibling temporary file, sync, then rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    let mut file = File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
    file.write_all(bytes)
        .with_context(|| format!("write {}", tmp.display()))?;
    file.sync_all()
        .with_context(|| format!("sync {}", tmp.display()))?;
    drop(file);
    fs::rename(&tmp, path)
        .with_context(|| format!("rename {} -> {}", tmp.display(), path.display()))?;
    Ok(())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '-'
            }
        })
        .collect()
}

/// Compute the SHA-256 checksum of data as lowercase hex.
#[must_use]
pub fn compute_checksum(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Current timestamp in milliseconds since epoch.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
