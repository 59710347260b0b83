//! Error types for data operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for data operations.
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while loading and merging tables.
#[derive(Debug, Error)]
pub enum DataError {
    /// Source file could not be opened or read
    #[error("Failed to read {path}: {source}")]
    Load {
        /// Path of the source that failed
        path: PathBuf,
        /// Underlying IO error
        #[source]
        source: std::io::Error,
    },

    /// Source file was readable but not valid tabular data
    #[error("Malformed table {path}: {reason}")]
    Malformed {
        /// Path of the malformed source
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// Required columns are missing from a table
    #[error("Table '{table}' is missing required columns: {}", missing.join(", "))]
    Schema {
        /// Logical name of the table ("transactions", "reference")
        table: String,
        /// Names of the missing columns
        missing: Vec<String>,
    },

    /// The reference table repeats a join key
    #[error("Reference table has {duplicates} duplicated '{key}' values")]
    DuplicateKey {
        /// Join key column
        key: String,
        /// Number of rows beyond the first per key
        duplicates: usize,
    },

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}
