//! Mapping plans: the per-field rename/cast specification applied uniformly
//! to a batch before write.
//!
//! The planner derives one [`MappingEntry`] per observed field from a single
//! naming convention: a field whose name contains the case-insensitive
//! substring `"date"` anywhere is cast to a calendar date, parsed from its
//! textual representation; every other field passes through unchanged. The
//! name takes precedence over the declared kind - a `..date..` field holding
//! a non-string kind is still forced through the date cast. This is a
//! deliberate convention of the source layout and is preserved literally,
//! including misfires on names like `updated_at`.
//!
//! The cast-or-pass-through branch is a tagged variant ([`CastRule`]) so the
//! plan can be tested on its own, away from any I/O.
//!
//! # Totality
//!
//! A plan is total over its batch: every observed field appears exactly once,
//! name preserved, in the order the inspector reported. Applying a plan to a
//! row yields one [`Cell`] per entry; a malformed value rejects that row with
//! a [`IngestError::CastFailure`] and leaves the rest of the batch alone.

use crate::error::IngestError;
use crate::schema::{FieldDescriptor, FieldKind};
use chrono::NaiveDate;
use serde_json::Value;

/// Textual form expected by the date cast.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// How one field's values are transformed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CastRule {
    /// Parse the value's textual form as a calendar date.
    CastToDate,
    /// Carry the value through unaltered.
    PassThrough,
}

/// One field's mapping: source name and kind, target name and kind, rule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingEntry {
    pub source_name: String,
    pub source_kind: FieldKind,
    pub target_name: String,
    pub target_kind: FieldKind,
    pub rule: CastRule,
}

/// An ordered, total mapping over one batch's fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MappingPlan {
    entries: Vec<MappingEntry>,
}

/// One typed value in a transformed row, aligned with a plan entry.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Days since the Unix epoch.
    Date(i32),
}

impl MappingPlan {
    /// Derive a plan from the inspector's field descriptors.
    ///
    /// Order-preserving and total: one entry per descriptor, in the same
    /// order, with the name carried through unchanged.
    pub fn derive(fields: &[FieldDescriptor]) -> Self {
        let entries = fields
            .iter()
            .map(|field| {
                if field.name.to_lowercase().contains("date") {
                    MappingEntry {
                        source_name: field.name.clone(),
                        source_kind: field.kind,
                        target_name: field.name.clone(),
                        target_kind: FieldKind::Date,
                        rule: CastRule::CastToDate,
                    }
                } else {
                    MappingEntry {
                        source_name: field.name.clone(),
                        source_kind: field.kind,
                        target_name: field.name.clone(),
                        target_kind: field.kind,
                        rule: CastRule::PassThrough,
                    }
                }
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Transform one record into a row of cells aligned with the plan.
    ///
    /// Missing and null fields become [`Cell::Null`].
    ///
    /// # Errors
    ///
    /// Returns a row-scoped [`IngestError::CastFailure`] if any value cannot
    /// be converted; callers reject the row and continue with the batch. A
    /// record that is not a JSON object is rejected the same way.
    pub fn apply_row(&self, record: &Value) -> Result<Vec<Cell>, IngestError> {
        let Some(map) = record.as_object() else {
            return Err(IngestError::cast_failure(
                "$",
                record.to_string(),
                "record is not a JSON object",
            ));
        };

        let mut row = Vec::with_capacity(self.entries.len());
        for entry in &self.entries {
            let value = map.get(&entry.source_name).unwrap_or(&Value::Null);
            row.push(entry.cell_for(value)?);
        }
        Ok(row)
    }
}

impl MappingEntry {
    fn cell_for(&self, value: &Value) -> Result<Cell, IngestError> {
        if value.is_null() {
            return Ok(Cell::Null);
        }
        match self.rule {
            CastRule::CastToDate => self.cast_date(value),
            CastRule::PassThrough => self.pass_through(value),
        }
    }

    /// Parse the value's textual form as `%Y-%m-%d`. Non-string values are
    /// rendered to text first; the name decides, not the declared kind.
    fn cast_date(&self, value: &Value) -> Result<Cell, IngestError> {
        let text = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        let date = NaiveDate::parse_from_str(&text, DATE_FORMAT).map_err(|e| {
            IngestError::cast_failure(&self.source_name, &text, format!("not a calendar date: {e}"))
        })?;
        Ok(Cell::Date(days_since_epoch(date)))
    }

    fn pass_through(&self, value: &Value) -> Result<Cell, IngestError> {
        match self.target_kind {
            FieldKind::String => Ok(match value {
                Value::String(s) => Cell::Str(s.clone()),
                // Widened columns carry non-string observations as text.
                other => Cell::Str(other.to_string()),
            }),
            FieldKind::Integer => value.as_i64().map(Cell::Int).ok_or_else(|| {
                IngestError::cast_failure(
                    &self.source_name,
                    value.to_string(),
                    "expected an integer",
                )
            }),
            FieldKind::Float => value.as_f64().map(Cell::Float).ok_or_else(|| {
                IngestError::cast_failure(&self.source_name, value.to_string(), "expected a number")
            }),
            FieldKind::Boolean => value.as_bool().map(Cell::Bool).ok_or_else(|| {
                IngestError::cast_failure(
                    &self.source_name,
                    value.to_string(),
                    "expected a boolean",
                )
            }),
            FieldKind::Json => Ok(Cell::Str(value.to_string())),
            // Date targets always go through the cast rule.
            FieldKind::Date => self.cast_date(value),
        }
    }
}

/// Days between the Unix epoch and `date` (the Date32 representation).
pub fn days_since_epoch(date: NaiveDate) -> i32 {
    date.signed_duration_since(NaiveDate::default()).num_days() as i32
}
