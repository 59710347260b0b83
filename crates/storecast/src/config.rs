//! Pipeline configuration.

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use storecast_data::LoaderConfig;
use storecast_data::schema::SALES;
use storecast_features::{FeatureConfig, UnknownCategoryPolicy};
use storecast_model::{DEFAULT_SPLIT_SEED, DEFAULT_TEST_FRACTION, ForestParams, GridSearch, ModelError};

/// Everything needed to fit and evaluate a pipeline
///
/// Every field has a default, so a JSON file only needs the values it
/// changes:
///
/// ```json
/// { "forest": { "n_estimators": 50 }, "unknown_category": { "Fallback": 0 } }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Target column (default: `Sales`)
    pub target: String,
    /// Loading, imputation and column drops
    pub loader: LoaderConfig,
    /// Calendar feature extraction
    pub features: FeatureConfig,
    /// Handling of categories unseen at fit time
    pub unknown_category: UnknownCategoryPolicy,
    /// Forest hyperparameters used without a search, and as the base of a search
    pub forest: ForestParams,
    /// Grid and folds for hyperparameter search
    pub search: GridSearch,
    /// Held-out fraction for evaluation
    pub test_fraction: f64,
    /// Seed of the held-out split
    pub split_seed: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target: SALES.to_string(),
            loader: LoaderConfig::default(),
            features: FeatureConfig::default(),
            unknown_category: UnknownCategoryPolicy::Reject,
            forest: ForestParams::default(),
            search: GridSearch::default(),
            test_fraction: DEFAULT_TEST_FRACTION,
            split_seed: DEFAULT_SPLIT_SEED,
        }
    }
}

impl PipelineConfig {
    /// Read a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config_error = |reason: String| PipelineError::Config {
            path: path.to_path_buf(),
            reason,
        };

        let text = std::fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| config_error(e.to_string()))?;
        config.validate().map_err(|e| config_error(e.to_string()))?;
        Ok(config)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.target.is_empty() {
            return Err(ModelError::InvalidParameter(
                "target column name is empty".to_string(),
            )
            .into());
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(ModelError::InvalidParameter(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            ))
            .into());
        }
        self.forest.validate()?;
        Ok(())
    }
}
