#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/storecast/storecast/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod cv;
pub mod error;
pub mod forest;
pub mod matrix;
pub mod metrics;
pub mod scaler;
pub mod search;
pub mod split;
pub mod tree;

use ndarray::{Array1, Array2};

pub use cv::{Fold, KFold};
pub use error::{ModelError, Result};
pub use forest::{ForestParams, MaxFeatures, RandomForestRegressor};
pub use matrix::{to_matrix, to_vector};
pub use metrics::{RegressionMetrics, evaluate};
pub use scaler::{ScaleReport, StandardScaler};
pub use search::{CandidateScore, GridSearch, ParamGrid, SearchResult};
pub use split::{DEFAULT_SPLIT_SEED, DEFAULT_TEST_FRACTION, split_indices, train_test_split};
pub use tree::{DecisionTreeRegressor, TreeNode, TreeParams};

/// A model mapping a feature matrix to one continuous output per row
pub trait Regressor {
    /// Fit on `x` (rows are samples) and targets `y`.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;

    /// Predict one value per row of `x`.
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
