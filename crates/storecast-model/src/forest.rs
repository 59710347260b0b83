//! Random forest regressor
//!
//! An average of [`DecisionTreeRegressor`]s, each grown on a bootstrap
//! sample of the training rows. All randomness flows from one seed, so a
//! fixed seed gives the same forest on every run.

use crate::error::{ModelError, Result};
use crate::tree::{DecisionTreeRegressor, TreeParams, check_shapes};
use crate::Regressor;
use ndarray::{Array1, Array2};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Features considered at each split
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of the feature count
    Sqrt,
    /// Log2 of the feature count
    Log2,
    /// Fraction of the feature count, in `(0, 1]`
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    #[default]
    All,
}

impl MaxFeatures {
    /// Number of features to draw out of `n_features` (at least 1).
    pub fn resolve(self, n_features: usize) -> usize {
        let n = n_features as f64;
        let k = match self {
            Self::Sqrt => n.sqrt().ceil() as usize,
            Self::Log2 => n.log2().ceil() as usize,
            Self::Fraction(f) => (n * f).ceil() as usize,
            Self::Fixed(k) => k,
            Self::All => n_features,
        };
        k.clamp(1, n_features.max(1))
    }
}

/// Forest hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum tree depth, unlimited when `None`
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs to be split
    pub min_samples_split: usize,
    /// Minimum samples in each child of a split
    pub min_samples_leaf: usize,
    /// Features considered at each split
    pub max_features: MaxFeatures,
    /// Grow each tree on a bootstrap sample
    pub bootstrap: bool,
    /// Seed for bootstrap and feature sampling
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestParams {
    /// Reject out-of-range hyperparameters.
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(ModelError::InvalidParameter("n_estimators must be at least 1".to_string()));
        }
        match self.max_features {
            MaxFeatures::Fraction(f) if !(f > 0.0 && f <= 1.0) => {
                return Err(ModelError::InvalidParameter(format!(
                    "max_features fraction must be in (0, 1], got {f}"
                )));
            }
            MaxFeatures::Fixed(0) => {
                return Err(ModelError::InvalidParameter("max_features must be at least 1".to_string()));
            }
            _ => {}
        }
        self.tree_params(1, 0).validate()
    }

    const fn tree_params(&self, max_features: usize, seed: u64) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            max_features: Some(max_features),
            seed,
        }
    }
}

/// Bagged ensemble of regression trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    trees: Vec<DecisionTreeRegressor>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl RandomForestRegressor {
    /// Create an unfitted forest.
    pub fn new(params: ForestParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            trees: Vec::new(),
            n_features: 0,
            feature_importances: None,
        })
    }

    /// Hyperparameters.
    pub const fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Fitted trees.
    pub fn trees(&self) -> &[DecisionTreeRegressor] {
        &self.trees
    }

    /// Whether the forest has been fitted.
    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Number of features seen during fit.
    pub const fn n_features(&self) -> usize {
        self.n_features
    }

    /// Mean of the per-tree importances, normalized to sum to 1.
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    fn compute_feature_importances(&mut self) {
        let mut total = Array1::<f64>::zeros(self.n_features);
        for imp in self.trees.iter().filter_map(|t| t.feature_importances()) {
            total += imp;
        }
        let sum = total.sum();
        if sum > 0.0 {
            total /= sum;
        }
        self.feature_importances = Some(total);
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_shapes(x, y)?;
        let n_samples = x.nrows();
        if n_samples == 0 {
            return Err(ModelError::EmptyInput("cannot fit a forest on zero rows".to_string()));
        }

        let n_features = x.ncols();
        let max_features = self.params.max_features.resolve(n_features);
        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed);

        let mut trees = Vec::with_capacity(self.params.n_estimators);
        for _ in 0..self.params.n_estimators {
            let tree_seed = rng.next_u64();
            let rows: Vec<usize> = if self.params.bootstrap {
                (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
            } else {
                (0..n_samples).collect()
            };

            let mut tree = DecisionTreeRegressor::new(self.params.tree_params(max_features, tree_seed))?;
            tree.fit_rows(x, y, rows)?;
            trees.push(tree);
        }

        self.trees = trees;
        self.n_features = n_features;
        self.compute_feature_importances();

        debug!(
            trees = self.trees.len(),
            rows = n_samples,
            features = n_features,
            max_features,
            "Fitted random forest"
        );
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted("RandomForestRegressor"));
        }

        let mut sum = Array1::<f64>::zeros(x.nrows());
        for tree in &self.trees {
            sum += &tree.predict(x)?;
        }
        Ok(sum / self.trees.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;
    use rstest::rstest;

    fn step_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 3), |(i, j)| match j {
            0 => i as f64,
            1 => (i % 7) as f64,
            _ => 1.0,
        });
        let y = Array1::from_shape_fn(40, |i| if i < 20 { 100.0 } else { 300.0 });
        (x, y)
    }

    #[rstest]
    #[case(MaxFeatures::Sqrt, 9, 3)]
    #[case(MaxFeatures::Log2, 8, 3)]
    #[case(MaxFeatures::Fraction(0.5), 5, 3)]
    #[case(MaxFeatures::Fixed(10), 4, 4)]
    #[case(MaxFeatures::All, 6, 6)]
    fn test_max_features_resolution(#[case] mf: MaxFeatures, #[case] n: usize, #[case] expected: usize) {
        assert_eq!(mf.resolve(n), expected);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = step_data();
        let params = ForestParams {
            n_estimators: 10,
            max_features: MaxFeatures::Sqrt,
            ..Default::default()
        };

        let mut a = RandomForestRegressor::new(params).unwrap();
        let mut b = RandomForestRegressor::new(params).unwrap();
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_without_bootstrap_matches_training_targets() {
        let (x, y) = step_data();
        let mut forest = RandomForestRegressor::new(ForestParams {
            n_estimators: 5,
            bootstrap: false,
            ..Default::default()
        })
        .unwrap();
        forest.fit(&x, &y).unwrap();

        let predictions = forest.predict(&x).unwrap();
        for (p, a) in predictions.iter().zip(y.iter()) {
            assert_relative_eq!(*p, *a, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_importances_favor_informative_feature() {
        let (x, y) = step_data();
        let mut forest = RandomForestRegressor::new(ForestParams {
            n_estimators: 20,
            ..Default::default()
        })
        .unwrap();
        forest.fit(&x, &y).unwrap();

        let importances = forest.feature_importances().unwrap();
        assert_relative_eq!(importances.sum(), 1.0, epsilon = 1e-9);
        assert!(importances[0] > importances[1]);
        assert_relative_eq!(importances[2], 0.0);
    }

    #[test]
    fn test_predictions_stay_within_target_range() {
        let (x, y) = step_data();
        let mut forest = RandomForestRegressor::new(ForestParams {
            n_estimators: 15,
            max_depth: Some(3),
            ..Default::default()
        })
        .unwrap();
        forest.fit(&x, &y).unwrap();

        let predictions = forest.predict(&array![[-5.0, 0.0, 1.0], [100.0, 3.0, 1.0]]).unwrap();
        assert!(predictions.iter().all(|p| (100.0..=300.0).contains(p)));
    }

    #[rstest]
    #[case(ForestParams { n_estimators: 0, ..Default::default() })]
    #[case(ForestParams { max_features: MaxFeatures::Fraction(1.5), ..Default::default() })]
    #[case(ForestParams { max_features: MaxFeatures::Fixed(0), ..Default::default() })]
    #[case(ForestParams { min_samples_split: 1, ..Default::default() })]
    fn test_invalid_params(#[case] params: ForestParams) {
        assert!(matches!(
            RandomForestRegressor::new(params),
            Err(ModelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_predict_before_fit() {
        let forest = RandomForestRegressor::new(ForestParams::default()).unwrap();
        assert!(matches!(
            forest.predict(&array![[1.0]]),
            Err(ModelError::NotFitted(_))
        ));
    }
}
