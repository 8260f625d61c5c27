//! End-to-end tests for per-source ingestion: bookmark ordering,
//! idempotence, crash recovery, and row-level isolation.

use anyhow::Result;
use bronzeflow::checkpoint::{BookmarkScope, BookmarkStore};
use bronzeflow::config::SourceConfig;
use bronzeflow::ingest::{TableIngestor, TableOutcome, apply_plan, part_file_name};
use bronzeflow::io::landing::{self, JsonLinesReader, RecordReader};
use bronzeflow::io::parquet::{ColumnarSink, ParquetSink, read_rows};
use bronzeflow::mapping::MappingPlan;
use bronzeflow::schema;
use bronzeflow::testing::{FailingSink, mock_landing_file};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn source_config(root: &Path, name: &str) -> SourceConfig {
    SourceConfig {
        name: name.to_string(),
        input_dir: root.join("landing").join(name),
        output_dir: root.join("bronze").join(name),
    }
}

fn parquet_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("parquet")))
        .collect();
    files.sort();
    files
}

struct Harness {
    _tmp: TempDir,
    root: PathBuf,
    store: BookmarkStore,
}

impl Harness {
    fn new() -> Result<Self> {
        let tmp = TempDir::new()?;
        let root = tmp.path().to_path_buf();
        let store = BookmarkStore::open(root.join("state"))?;
        Ok(Self {
            _tmp: tmp,
            root,
            store,
        })
    }

    fn ingest(&self, source: &SourceConfig, sink: &dyn ColumnarSink) -> TableOutcome {
        let reader = JsonLinesReader;
        let ingestor = TableIngestor {
            pipeline: "test",
            store: &self.store,
            reader: &reader,
            sink,
        };
        ingestor.ingest(source)
    }
}

#[test]
fn ingests_new_artifacts_and_advances_bookmark() -> Result<()> {
    let h = Harness::new()?;
    let source = source_config(&h.root, "transactions");
    mock_landing_file(
        &source.input_dir,
        "batch-1.jsonl",
        &[
            json!({"cust_id": "c-1", "tran_date": "2025-01-15", "total_amount": 10.5}),
            json!({"cust_id": "c-2", "tran_date": "2025-01-16", "total_amount": 3.0}),
        ],
    )?;
    mock_landing_file(
        &source.input_dir,
        "batch-2.jsonl",
        &[json!({"cust_id": "c-3", "tran_date": "2025-02-01", "total_amount": 7.25})],
    )?;

    let outcome = h.ingest(&source, &ParquetSink);
    assert_eq!(
        outcome,
        TableOutcome::Committed {
            artifacts: 2,
            rows: 3,
            rejected: 0
        }
    );

    let files = parquet_files(&source.output_dir);
    assert_eq!(files.len(), 1);
    let rows = read_rows(&files[0])?;
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0]["cust_id"], json!("c-1"));
    assert_eq!(rows[0]["tran_date"], json!("2025-01-15"));
    assert_eq!(rows[2]["tran_date"], json!("2025-02-01"));

    // Rerunning with no new data is a safe no-op.
    assert_eq!(h.ingest(&source, &ParquetSink), TableOutcome::Empty);
    assert_eq!(parquet_files(&source.output_dir).len(), 1);
    Ok(())
}

#[test]
fn later_artifacts_resolve_after_a_commit() -> Result<()> {
    let h = Harness::new()?;
    let source = source_config(&h.root, "accounts");
    mock_landing_file(
        &source.input_dir,
        "day-1.jsonl",
        &[json!({"acct_id": "a-1", "open_date": "2024-12-31"})],
    )?;
    assert!(matches!(
        h.ingest(&source, &ParquetSink),
        TableOutcome::Committed { artifacts: 1, .. }
    ));

    mock_landing_file(
        &source.input_dir,
        "day-2.jsonl",
        &[json!({"acct_id": "a-2", "open_date": "2025-01-01"})],
    )?;
    assert!(matches!(
        h.ingest(&source, &ParquetSink),
        TableOutcome::Committed { artifacts: 1, .. }
    ));

    // One output file per run's artifact set.
    assert_eq!(parquet_files(&source.output_dir).len(), 2);
    Ok(())
}

#[test]
fn write_failure_leaves_bookmark_untouched() -> Result<()> {
    let h = Harness::new()?;
    let source = source_config(&h.root, "transactions");
    mock_landing_file(
        &source.input_dir,
        "batch-1.jsonl",
        &[json!({"cust_id": "c-1", "tran_date": "2025-01-15"})],
    )?;

    let outcome = h.ingest(&source, &FailingSink);
    assert!(matches!(outcome, TableOutcome::Failed { .. }));
    assert!(parquet_files(&source.output_dir).is_empty());

    // The bookmark did not advance: a rerun resolves the same artifact and
    // succeeds with a working sink.
    assert_eq!(
        h.ingest(&source, &ParquetSink),
        TableOutcome::Committed {
            artifacts: 1,
            rows: 1,
            rejected: 0
        }
    );
    Ok(())
}

#[test]
fn failed_parquet_write_leaves_nothing_visible() -> Result<()> {
    let h = Harness::new()?;
    let source = source_config(&h.root, "transactions");
    mock_landing_file(
        &source.input_dir,
        "batch-1.jsonl",
        &[json!({"cust_id": "c-1", "tran_date": "2025-01-15"})],
    )?;
    // Occupy the output directory's path with a plain file so the sink
    // cannot create it.
    fs::create_dir_all(source.output_dir.parent().unwrap())?;
    fs::write(&source.output_dir, b"in the way")?;

    let outcome = h.ingest(&source, &ParquetSink);
    assert!(matches!(outcome, TableOutcome::Failed { .. }));

    // No partial output, no staging leftovers, bookmark untouched.
    assert!(source.output_dir.is_file());
    fs::remove_file(&source.output_dir)?;
    assert_eq!(
        h.ingest(&source, &ParquetSink),
        TableOutcome::Committed {
            artifacts: 1,
            rows: 1,
            rejected: 0
        }
    );
    Ok(())
}

#[test]
fn rerun_after_crash_between_write_and_commit_overwrites() -> Result<()> {
    let h = Harness::new()?;
    let source = source_config(&h.root, "transactions");
    mock_landing_file(
        &source.input_dir,
        "batch-1.jsonl",
        &[json!({"cust_id": "c-1", "tran_date": "2025-01-15"})],
    )?;

    // Simulate a run that crashed after Writing but before Committed: the
    // output exists, the bookmark does not cover it.
    let pending = landing::discover(&source.input_dir)?;
    let records = JsonLinesReader.read(&pending)?;
    let plan = MappingPlan::derive(&schema::inspect(&records)?);
    let (rows, rejects) = apply_plan(&plan, &records);
    assert!(rejects.is_empty());
    let dest = source.output_dir.join(part_file_name(&pending));
    ParquetSink.write(&plan, &rows, &dest)?;
    assert_eq!(parquet_files(&source.output_dir).len(), 1);

    // The rerun resolves the same artifacts, overwrites the same file, and
    // commits: output equivalent to a single successful run.
    assert_eq!(
        h.ingest(&source, &ParquetSink),
        TableOutcome::Committed {
            artifacts: 1,
            rows: 1,
            rejected: 0
        }
    );
    let files = parquet_files(&source.output_dir);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0], dest);
    assert_eq!(read_rows(&files[0])?.len(), 1);

    assert_eq!(h.ingest(&source, &ParquetSink), TableOutcome::Empty);
    Ok(())
}

#[test]
fn cast_failure_is_isolated_to_the_offending_row() -> Result<()> {
    let h = Harness::new()?;
    let source = source_config(&h.root, "cust_acct");
    mock_landing_file(
        &source.input_dir,
        "batch-1.jsonl",
        &[
            json!({"cust_id": "c-1", "cust_acct_date": "2025-01-15"}),
            json!({"cust_id": "c-2", "cust_acct_date": "2025-13-45"}),
            json!({"cust_id": "c-3", "cust_acct_date": "2025-03-31"}),
        ],
    )?;

    let outcome = h.ingest(&source, &ParquetSink);
    assert_eq!(
        outcome,
        TableOutcome::Committed {
            artifacts: 1,
            rows: 2,
            rejected: 1
        }
    );

    let files = parquet_files(&source.output_dir);
    let rows = read_rows(&files[0])?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["cust_id"], json!("c-1"));
    assert_eq!(rows[1]["cust_id"], json!("c-3"));
    Ok(())
}

#[test]
fn malformed_batch_fails_only_that_run() -> Result<()> {
    let h = Harness::new()?;
    let source = source_config(&h.root, "customers");
    // Parseable JSON, but no record is an object: schema unavailable.
    mock_landing_file(
        &source.input_dir,
        "bad.jsonl",
        &[json!(1), json!("two"), json!([3])],
    )?;

    let outcome = h.ingest(&source, &ParquetSink);
    match outcome {
        TableOutcome::Failed { reason } => assert!(reason.contains("schema unavailable")),
        other => panic!("expected Failed, got {other:?}"),
    }

    // Bookmark untouched: the artifact still resolves.
    let scope = BookmarkScope::new("test", "customers");
    let candidates = landing::discover(&source.input_dir)?;
    assert_eq!(h.store.resolve_new(&scope, &candidates)?.len(), 1);
    Ok(())
}

#[test]
fn discovery_is_recursive_and_sorted() -> Result<()> {
    let h = Harness::new()?;
    let source = source_config(&h.root, "transactions");
    mock_landing_file(&source.input_dir, "z.jsonl", &[json!({"v": 1})])?;
    mock_landing_file(&source.input_dir, "2025/08/a.jsonl", &[json!({"v": 2})])?;

    let artifacts = landing::discover(&source.input_dir)?;
    let ids: Vec<&str> = artifacts.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, vec!["2025/08/a.jsonl", "z.jsonl"]);

    assert!(matches!(
        h.ingest(&source, &ParquetSink),
        TableOutcome::Committed { artifacts: 2, .. }
    ));
    Ok(())
}

#[cfg(feature = "compression-gzip")]
#[test]
fn gzip_landing_files_are_decompressed() -> Result<()> {
    use bronzeflow::testing::mock_landing_file_gz;

    let h = Harness::new()?;
    let source = source_config(&h.root, "transactions");
    mock_landing_file_gz(
        &source.input_dir,
        "batch-1.jsonl.gz",
        &[json!({"cust_id": "c-1", "tran_date": "2025-01-15"})],
    )?;

    assert_eq!(
        h.ingest(&source, &ParquetSink),
        TableOutcome::Committed {
            artifacts: 1,
            rows: 1,
            rejected: 0
        }
    );
    Ok(())
}
