#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/storecast/storecast/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod artifact;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod request;

pub use storecast_data as data;
pub use storecast_features as features;
pub use storecast_model as model;
pub use storecast_output as output;

pub use artifact::{ArtifactInfo, FORMAT_VERSION};
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{
    FitDiagnostics, FittedPipeline, Pipeline, PredictDiagnostics, Prediction, feature_table,
};
pub use request::{ErrorResponse, PredictionRequest, PredictionResponse, predict_one};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
