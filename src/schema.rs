//! Schema inspection over a batch of semi-structured records.
//!
//! The field list of a landing batch is unknown until read time. This module
//! determines it as a pure function of the batch: no record is materialized
//! into an intermediate representation and nothing is mutated. The result is
//! an ordered sequence of [`FieldDescriptor`]s, one per field observed
//! anywhere in the batch.
//!
//! # Ordering
//!
//! Fields are reported in first-observed order: the first record contributes
//! its fields in document order, and fields first seen in later records are
//! appended as they appear. Downstream stages preserve this order; reordering
//! is never performed.
//!
//! # Kind resolution
//!
//! A field's kind comes from its first non-null observation. When later
//! observations disagree, `Integer` and `Float` widen to `Float`; any other
//! disagreement widens to `String`. A field observed only as null reports
//! `String`.

use crate::error::IngestError;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Declared type tag for one field.
///
/// `Date` never comes out of inspection; it exists as a target kind for the
/// mapping planner's date cast.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Integer,
    Float,
    Boolean,
    /// Nested object or array; carried as serialized JSON text.
    Json,
    /// Calendar date (target-only).
    Date,
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::Json => "json",
            FieldKind::Date => "date",
        };
        write!(f, "{name}")
    }
}

/// One observed field: its name and declared source kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Kind of a single JSON value; `None` for null.
fn kind_of(value: &Value) -> Option<FieldKind> {
    match value {
        Value::Null => None,
        Value::Bool(_) => Some(FieldKind::Boolean),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                Some(FieldKind::Integer)
            } else {
                Some(FieldKind::Float)
            }
        }
        Value::String(_) => Some(FieldKind::String),
        Value::Array(_) | Value::Object(_) => Some(FieldKind::Json),
    }
}

/// Widen two observed kinds into one that can hold both.
fn widen(a: FieldKind, b: FieldKind) -> FieldKind {
    use FieldKind::{Float, Integer, String};
    match (a, b) {
        _ if a == b => a,
        (Integer, Float) | (Float, Integer) => Float,
        _ => String,
    }
}

/// Inspect a record batch and describe every field observed in it.
///
/// # Errors
///
/// Fails with [`IngestError::SchemaUnavailable`] if the batch is empty or no
/// record in it is a JSON object. This is not fatal to the pipeline, only to
/// that source's ingestion for the current run.
pub fn inspect(records: &[Value]) -> Result<Vec<FieldDescriptor>, IngestError> {
    if records.is_empty() {
        return Err(IngestError::schema_unavailable("batch is empty"));
    }

    let mut order: Vec<String> = Vec::new();
    let mut kinds: HashMap<String, Option<FieldKind>> = HashMap::new();
    let mut saw_object = false;

    for record in records {
        let Some(map) = record.as_object() else {
            continue;
        };
        saw_object = true;
        for (name, value) in map {
            let slot = kinds.entry(name.clone()).or_insert_with(|| {
                order.push(name.clone());
                None
            });
            *slot = match (*slot, kind_of(value)) {
                (None, observed) => observed,
                (known, None) => known,
                (Some(known), Some(observed)) => Some(widen(known, observed)),
            };
        }
    }

    if !saw_object {
        return Err(IngestError::schema_unavailable(
            "no record in the batch is a JSON object",
        ));
    }
    if order.is_empty() {
        return Err(IngestError::schema_unavailable(
            "no fields observed in the batch",
        ));
    }

    Ok(order
        .into_iter()
        .map(|name| {
            // Null-only fields default to string.
            let kind = kinds[&name].unwrap_or(FieldKind::String);
            FieldDescriptor { name, kind }
        })
        .collect())
}
