//! Error types for model fitting and evaluation.

use thiserror::Error;

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

/// Errors that can occur while fitting, scoring or persisting a model.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A fitted component was used before `fit`
    #[error("{0} has not been fitted")]
    NotFitted(&'static str),

    /// Array dimensions do not line up
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    Shape {
        /// Expected shape
        expected: String,
        /// Actual shape
        actual: String,
    },

    /// A hyperparameter or option is out of range
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// An operation received no rows
    #[error("Empty input: {0}")]
    EmptyInput(String),

    /// A persisted artifact has a format this build cannot read
    #[error("Unsupported artifact format version {found} (expected {expected})")]
    UnsupportedArtifact {
        /// Version found in the artifact
        found: u32,
        /// Version this build writes
        expected: u32,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),
}
