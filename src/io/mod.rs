//! I/O integrations: landing-area reading and columnar output.
//!
//! - [`landing`] - recursive artifact discovery and newline-delimited JSON
//!   reading, with transparent gzip decompression (feature
//!   `compression-gzip`).
//! - [`parquet`] - the columnar sink: Arrow batch assembly and atomic Parquet
//!   writes.

pub mod landing;
pub mod parquet;
