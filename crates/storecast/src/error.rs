//! Error type for the end-to-end pipeline.

use std::path::PathBuf;
use storecast_data::DataError;
use storecast_features::FeatureError;
use storecast_model::ModelError;
use thiserror::Error;

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors raised while fitting, applying or persisting a pipeline.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Loading or merging failed
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// Encoding or feature extraction failed
    #[error("Feature error: {0}")]
    Feature(#[from] FeatureError),

    /// Scaling, fitting, scoring or persistence failed
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Polars error
    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    /// A prediction request names a store absent from the reference table
    #[error("Store {store} has no row in the reference table")]
    UnknownStore {
        /// Requested store
        store: i64,
    },

    /// A configuration file could not be used
    #[error("Invalid configuration {path}: {reason}")]
    Config {
        /// Configuration file
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },
}
