//! Grid search over forest hyperparameters
//!
//! Every combination of the grid is scored by k-fold cross-validation. Inside
//! each fold a fresh [`StandardScaler`] is fitted on the fold's training rows
//! only, then the forest is fitted and scored by MSE on the held-out rows.
//! The combination with the lowest mean MSE wins; ties go to the earlier
//! combination in grid order.

use crate::cv::KFold;
use crate::error::{ModelError, Result};
use crate::forest::{ForestParams, RandomForestRegressor};
use crate::metrics::mse;
use crate::scaler::StandardScaler;
use crate::tree::check_shapes;
use crate::Regressor;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Values tried for each searched hyperparameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamGrid {
    /// Tree counts
    pub n_estimators: Vec<usize>,
    /// Maximum depths (`None` is unlimited)
    pub max_depth: Vec<Option<usize>>,
    /// Minimum split sizes
    pub min_samples_split: Vec<usize>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200],
            max_depth: vec![None, Some(10), Some(20)],
            min_samples_split: vec![2, 5, 10],
        }
    }
}

impl ParamGrid {
    /// Number of combinations.
    pub fn len(&self) -> usize {
        self.n_estimators.len() * self.max_depth.len() * self.min_samples_split.len()
    }

    /// Whether the grid has no combination.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every combination applied over `base`, in grid order.
    pub fn candidates(&self, base: &ForestParams) -> Vec<ForestParams> {
        let mut out = Vec::with_capacity(self.len());
        for &n_estimators in &self.n_estimators {
            for &max_depth in &self.max_depth {
                for &min_samples_split in &self.min_samples_split {
                    out.push(ForestParams {
                        n_estimators,
                        max_depth,
                        min_samples_split,
                        ..*base
                    });
                }
            }
        }
        out
    }
}

/// Cross-validation score of one combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScore {
    /// Hyperparameters scored
    pub params: ForestParams,
    /// Held-out MSE of each fold
    pub fold_mse: Vec<f64>,
    /// Mean of `fold_mse`
    pub mean_mse: f64,
    /// Population standard deviation of `fold_mse`
    pub std_mse: f64,
}

impl CandidateScore {
    fn new(params: ForestParams, fold_mse: Vec<f64>) -> Self {
        let n = fold_mse.len() as f64;
        let mean_mse = fold_mse.iter().sum::<f64>() / n;
        let std_mse = (fold_mse.iter().map(|v| (v - mean_mse).powi(2)).sum::<f64>() / n).sqrt();
        Self {
            params,
            fold_mse,
            mean_mse,
            std_mse,
        }
    }
}

/// Outcome of a grid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Scores in grid order
    pub scores: Vec<CandidateScore>,
    /// Index of the winning combination in `scores`
    pub best_index: usize,
}

impl SearchResult {
    /// Winning combination.
    pub fn best(&self) -> &CandidateScore {
        &self.scores[self.best_index]
    }

    /// Winning hyperparameters.
    pub fn best_params(&self) -> ForestParams {
        self.best().params
    }
}

/// Exhaustive cross-validated search
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSearch {
    /// Searched values
    pub grid: ParamGrid,
    /// Fold splitter
    pub folds: KFold,
}

impl GridSearch {
    /// Search `grid` with `folds`.
    pub const fn new(grid: ParamGrid, folds: KFold) -> Self {
        Self { grid, folds }
    }

    /// Score every combination.
    pub fn run(&self, x: &Array2<f64>, y: &Array1<f64>, base: &ForestParams) -> Result<SearchResult> {
        self.run_with(x, y, base, |_, _, _| {})
    }

    /// Score every combination, calling `on_scored(done, total, score)` after
    /// each one.
    pub fn run_with<F>(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        base: &ForestParams,
        mut on_scored: F,
    ) -> Result<SearchResult>
    where
        F: FnMut(usize, usize, &CandidateScore),
    {
        check_shapes(x, y)?;
        if self.grid.is_empty() {
            return Err(ModelError::InvalidParameter(
                "parameter grid has no combinations".to_string(),
            ));
        }

        let candidates = self.grid.candidates(base);
        for params in &candidates {
            params.validate()?;
        }
        let folds = self.folds.split(x.nrows())?;
        let total = candidates.len();

        info!(
            combinations = total,
            folds = folds.len(),
            rows = x.nrows(),
            "Starting grid search"
        );

        let mut scores = Vec::with_capacity(total);
        for params in candidates {
            let mut fold_mse = Vec::with_capacity(folds.len());
            for fold in &folds {
                let x_train = x.select(Axis(0), &fold.train);
                let y_train = y.select(Axis(0), &fold.train);
                let x_test = x.select(Axis(0), &fold.test);
                let y_test = y.select(Axis(0), &fold.test);

                let mut scaler = StandardScaler::new();
                let (x_train, _) = scaler.fit_transform(&x_train)?;
                let (x_test, _) = scaler.transform(&x_test)?;

                let mut forest = RandomForestRegressor::new(params)?;
                forest.fit(&x_train, &y_train)?;
                let predictions = forest.predict(&x_test)?;
                fold_mse.push(mse(&predictions.to_vec(), &y_test.to_vec())?);
            }

            let score = CandidateScore::new(params, fold_mse);
            debug!(
                n_estimators = params.n_estimators,
                max_depth = ?params.max_depth,
                min_samples_split = params.min_samples_split,
                mean_mse = score.mean_mse,
                "Scored combination"
            );
            scores.push(score);
            on_scored(scores.len(), total, &scores[scores.len() - 1]);
        }

        let mut best_index = 0;
        for (i, score) in scores.iter().enumerate() {
            if score.mean_mse < scores[best_index].mean_mse {
                best_index = i;
            }
        }

        info!(
            best_mse = scores[best_index].mean_mse,
            n_estimators = scores[best_index].params.n_estimators,
            max_depth = ?scores[best_index].params.max_depth,
            min_samples_split = scores[best_index].params.min_samples_split,
            "Grid search complete"
        );

        Ok(SearchResult { scores, best_index })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 4) as f64 });
        let y = Array1::from_shape_fn(30, |i| (i as f64) * 3.0 + if i % 2 == 0 { 5.0 } else { 0.0 });
        (x, y)
    }

    #[test]
    fn test_default_grid_size() {
        let grid = ParamGrid::default();
        assert_eq!(grid.len(), 18);
        let candidates = grid.candidates(&ForestParams::default());
        assert_eq!(candidates[0].n_estimators, 100);
        assert_eq!(candidates[0].max_depth, None);
        assert_eq!(candidates[17].n_estimators, 200);
        assert_eq!(candidates[17].max_depth, Some(20));
        assert_eq!(candidates[17].min_samples_split, 10);
    }

    #[test]
    fn test_candidates_keep_base_fields() {
        let base = ForestParams {
            seed: 9,
            bootstrap: false,
            ..Default::default()
        };
        let candidates = ParamGrid::default().candidates(&base);
        assert!(candidates.iter().all(|c| c.seed == 9 && !c.bootstrap));
    }

    #[test]
    fn test_best_is_lowest_mean_mse() {
        let (x, y) = data();
        let search = GridSearch::new(
            ParamGrid {
                n_estimators: vec![3],
                max_depth: vec![Some(1), None],
                min_samples_split: vec![2],
            },
            KFold::new(3),
        );

        let mut seen = Vec::new();
        let result = search
            .run_with(&x, &y, &ForestParams::default(), |done, total, _| seen.push((done, total)))
            .unwrap();

        assert_eq!(seen, vec![(1, 2), (2, 2)]);
        assert_eq!(result.scores.len(), 2);
        let min = result
            .scores
            .iter()
            .map(|s| s.mean_mse)
            .fold(f64::INFINITY, f64::min);
        assert_eq!(result.best().mean_mse, min);
        assert!(result.scores.iter().all(|s| s.fold_mse.len() == 3));
    }

    #[test]
    fn test_empty_grid_is_rejected() {
        let (x, y) = data();
        let search = GridSearch::new(
            ParamGrid {
                n_estimators: vec![],
                ..Default::default()
            },
            KFold::default(),
        );
        assert!(matches!(
            search.run(&x, &y, &ForestParams::default()),
            Err(ModelError::InvalidParameter(_))
        ));
    }
}
