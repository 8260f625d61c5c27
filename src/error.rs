//! Failure taxonomy for the ingestion pipeline.
//!
//! Every failure a source can hit during one run falls into one of four
//! categories, and each category has a fixed blast radius:
//!
//! - [`IngestError::SchemaUnavailable`] - the batch structure could not be
//!   determined; that source is skipped for the current run.
//! - [`IngestError::CastFailure`] - a single value could not be converted per
//!   the mapping plan; the offending row is rejected, the batch continues.
//! - [`IngestError::WriteFailure`] - the columnar write did not complete; the
//!   source fails, its bookmark stays untouched.
//! - [`IngestError::CheckpointUnavailable`] - the bookmark store could not
//!   resolve or commit; fatal to that source's run only.
//!
//! Failures are contained at the table-ingestor boundary: one source failing
//! never prevents the runner from attempting the rest.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while ingesting one logical source.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The batch's structure cannot be determined (empty or malformed input).
    #[error("schema unavailable: {reason}")]
    SchemaUnavailable { reason: String },

    /// An individual value cannot be converted per the mapping plan.
    ///
    /// Row-scoped: callers reject the offending row and keep going.
    #[error("cannot cast field `{field}` value `{value}`: {reason}")]
    CastFailure {
        field: String,
        value: String,
        reason: String,
    },

    /// The durable write to the output location did not complete.
    ///
    /// The writer contract guarantees no partially visible output remains at
    /// the location after this error.
    #[error("write to {} failed: {reason}", location.display())]
    WriteFailure { location: PathBuf, reason: String },

    /// The bookmark store cannot resolve or commit for this scope.
    #[error("bookmark store unavailable: {reason}")]
    CheckpointUnavailable { reason: String },
}

impl IngestError {
    /// Schema inspection failure with a human-readable reason.
    pub fn schema_unavailable(reason: impl Into<String>) -> Self {
        Self::SchemaUnavailable {
            reason: reason.into(),
        }
    }

    /// Row-level cast failure for a specific field and value.
    pub fn cast_failure(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::CastFailure {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Write failure at the given output location.
    pub fn write_failure(location: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::WriteFailure {
            location: location.into(),
            reason: reason.into(),
        }
    }

    /// Bookmark store failure.
    pub fn checkpoint_unavailable(reason: impl Into<String>) -> Self {
        Self::CheckpointUnavailable {
            reason: reason.into(),
        }
    }
}
