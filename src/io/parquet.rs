//! Columnar output: Arrow batch assembly and atomic Parquet writes.
//!
//! The schema here is only known at run time, derived from the mapping plan,
//! so arrays are assembled with Arrow builders rather than inferred from a
//! static Rust type. The write contract is the one the ingestor depends on:
//! either the full batch for a run is visible at the destination or none of
//! it is. Output is staged to a `.tmp` sibling and renamed into place; a
//! failed write removes the staging file and leaves nothing behind.

use crate::error::IngestError;
use crate::mapping::{Cell, MappingPlan};
use crate::schema::FieldKind;
use anyhow::{Context, Result};
use arrow::array::{
    ArrayRef, BooleanBuilder, Date32Builder, Float64Builder, Int64Builder, StringBuilder,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::ArrowWriter;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::file::properties::WriterProperties;
use serde_json::Value;
use std::fs::{self, File, create_dir_all};
use std::path::Path;
use std::sync::Arc;

/// Writes one transformed batch to a destination file.
///
/// The seam between the ingestor and the storage layer. Contract: on failure,
/// no partially visible output remains at the destination.
pub trait ColumnarSink {
    /// Persist `rows` (shaped by `plan`) to `dest`. Returns the row count.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::WriteFailure`] if the write did not complete.
    fn write(&self, plan: &MappingPlan, rows: &[Vec<Cell>], dest: &Path)
    -> Result<usize, IngestError>;
}

/// Parquet implementation of [`ColumnarSink`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ParquetSink;

impl ColumnarSink for ParquetSink {
    fn write(
        &self,
        plan: &MappingPlan,
        rows: &[Vec<Cell>],
        dest: &Path,
    ) -> Result<usize, IngestError> {
        let tmp = dest.with_extension("parquet.tmp");
        let result = write_staged(plan, rows, dest, &tmp);
        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result.map_err(|e| IngestError::write_failure(dest, format!("{e:#}")))
    }
}

fn write_staged(plan: &MappingPlan, rows: &[Vec<Cell>], dest: &Path, tmp: &Path) -> Result<usize> {
    if let Some(parent) = dest.parent()
        && !parent.as_os_str().is_empty()
    {
        create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }

    let batch = build_batch(plan, rows)?;
    let file = File::create(tmp).with_context(|| format!("create {}", tmp.display()))?;
    let props = WriterProperties::builder().build();
    let mut writer =
        ArrowWriter::try_new(file, batch.schema(), Some(props)).context("create ArrowWriter")?;
    writer.write(&batch).context("write batch to parquet")?;
    writer.close().context("close ArrowWriter")?;

    fs::rename(tmp, dest)
        .with_context(|| format!("rename {} -> {}", tmp.display(), dest.display()))?;
    Ok(rows.len())
}

/// Assemble a `RecordBatch` from plan-shaped rows. Works for zero rows (a
/// zero-row batch is written; the file still carries the schema).
fn build_batch(plan: &MappingPlan, rows: &[Vec<Cell>]) -> Result<RecordBatch> {
    let fields: Vec<Field> = plan
        .entries()
        .iter()
        .map(|entry| Field::new(&entry.target_name, arrow_type(entry.target_kind), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));

    let mut columns: Vec<ArrayRef> = Vec::with_capacity(plan.entries().len());
    for (index, entry) in plan.entries().iter().enumerate() {
        let cells = rows.iter().map(|row| &row[index]);
        columns.push(build_column(entry.target_kind, cells));
    }

    RecordBatch::try_new(schema, columns).context("assemble RecordBatch")
}

fn arrow_type(kind: FieldKind) -> DataType {
    match kind {
        FieldKind::String | FieldKind::Json => DataType::Utf8,
        FieldKind::Integer => DataType::Int64,
        FieldKind::Float => DataType::Float64,
        FieldKind::Boolean => DataType::Boolean,
        FieldKind::Date => DataType::Date32,
    }
}

fn build_column<'a>(kind: FieldKind, cells: impl Iterator<Item = &'a Cell>) -> ArrayRef {
    match kind {
        FieldKind::String | FieldKind::Json => {
            let mut b = StringBuilder::new();
            for cell in cells {
                match cell {
                    Cell::Str(s) => b.append_value(s),
                    _ => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
        FieldKind::Integer => {
            let mut b = Int64Builder::new();
            for cell in cells {
                match cell {
                    Cell::Int(v) => b.append_value(*v),
                    _ => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
        FieldKind::Float => {
            let mut b = Float64Builder::new();
            for cell in cells {
                match cell {
                    Cell::Float(v) => b.append_value(*v),
                    _ => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
        FieldKind::Boolean => {
            let mut b = BooleanBuilder::new();
            for cell in cells {
                match cell {
                    Cell::Bool(v) => b.append_value(*v),
                    _ => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
        FieldKind::Date => {
            let mut b = Date32Builder::new();
            for cell in cells {
                match cell {
                    Cell::Date(v) => b.append_value(*v),
                    _ => b.append_null(),
                }
            }
            Arc::new(b.finish())
        }
    }
}

/// Read a Parquet file back as JSON rows.
///
/// Verification-oriented: used by tests and by operators inspecting a bronze
/// file. Dates render in their `%Y-%m-%d` textual form.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, read, or rendered.
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<Value>> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("open ParquetRecordBatchReader")?;
    let reader = builder.build().context("build ParquetRecordBatchReader")?;

    let mut writer = arrow::json::ArrayWriter::new(Vec::new());
    for batch in reader {
        let batch = batch.context("read next batch")?;
        writer.write(&batch).context("render batch")?;
    }
    writer.finish().context("finish rendering")?;
    let buf = writer.into_inner();

    if buf.is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_slice(&buf).context("parse rendered rows")
}
