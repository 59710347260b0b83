//! Error types for feature engineering.

use thiserror::Error;

/// Result type for feature operations.
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Errors that can occur while encoding or extracting features.
#[derive(Debug, Error)]
pub enum FeatureError {
    /// A column the operation needs is absent
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// A categorical value was not seen when the encoding was fitted
    #[error("Unknown category '{value}' in column '{column}'")]
    UnknownCategory {
        /// Column being encoded
        column: String,
        /// Offending raw value
        value: String,
    },

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}
