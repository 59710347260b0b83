#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/storecast/storecast/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod error;
pub mod export;
pub mod report;

pub use error::{OutputError, Result};
pub use export::{ExportFormat, Exporter, PredictionExport, PredictionRow};
pub use report::{CvRow, DiagnosticEntry, FeatureImportance, TrainingReport, TrainingReportBuilder};

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
