//! Standard scaling of feature matrices.
//!
//! Each column is centred on its mean and divided by its population standard
//! deviation, both learned from the rows passed to [`StandardScaler::fit`].
//! Missing values are carried as `NaN`: they are ignored when fitting and
//! replaced by the column mean (zero once scaled) when transforming.

use crate::error::{ModelError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Learned per-column centre and scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ScalerParams {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

/// Counts collected while scaling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScaleReport {
    /// Missing values replaced by the column mean
    pub imputed: usize,
}

/// Zero-mean, unit-variance scaler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    params: Option<ScalerParams>,
}

impl StandardScaler {
    /// Create an unfitted scaler.
    pub const fn new() -> Self {
        Self { params: None }
    }

    /// Whether [`fit`](Self::fit) has run.
    pub const fn is_fitted(&self) -> bool {
        self.params.is_some()
    }

    /// Learned column means.
    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.params.as_ref().map(|p| &p.mean)
    }

    /// Learned column scales (population standard deviation, 1 where it is 0).
    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.params.as_ref().map(|p| &p.scale)
    }

    /// Learn means and scales from `x`.
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(ModelError::EmptyInput("cannot fit scaler on zero rows".to_string()));
        }

        let mut mean = Array1::<f64>::zeros(x.ncols());
        let mut scale = Array1::<f64>::ones(x.ncols());

        for (j, column) in x.axis_iter(Axis(1)).enumerate() {
            let present: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
            if present.is_empty() {
                continue;
            }
            let n = present.len() as f64;
            let m = present.iter().sum::<f64>() / n;
            let var = present.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;
            let std = var.sqrt();

            mean[j] = m;
            scale[j] = if std > 0.0 { std } else { 1.0 };
        }

        debug!(columns = x.ncols(), rows = x.nrows(), "Fitted standard scaler");
        self.params = Some(ScalerParams { mean, scale });
        Ok(self)
    }

    /// Scale `x` with the learned parameters.
    pub fn transform(&self, x: &Array2<f64>) -> Result<(Array2<f64>, ScaleReport)> {
        let params = self.params.as_ref().ok_or(ModelError::NotFitted("StandardScaler"))?;
        if x.ncols() != params.mean.len() {
            return Err(ModelError::Shape {
                expected: format!("{} columns", params.mean.len()),
                actual: format!("{} columns", x.ncols()),
            });
        }

        let mut report = ScaleReport::default();
        let mut out = x.to_owned();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let (m, s) = (params.mean[j], params.scale[j]);
            for v in column.iter_mut() {
                if v.is_nan() {
                    report.imputed += 1;
                    *v = 0.0;
                } else {
                    *v = (*v - m) / s;
                }
            }
        }

        Ok((out, report))
    }

    /// Fit on `x` and scale it.
    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<(Array2<f64>, ScaleReport)> {
        self.fit(x)?;
        self.transform(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::array;

    #[test]
    fn test_population_std() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let mut scaler = StandardScaler::new();
        scaler.fit(&x).unwrap();

        assert_relative_eq!(scaler.mean().unwrap()[0], 3.0);
        assert_relative_eq!(scaler.scale().unwrap()[0], 2.0_f64.sqrt());
    }

    #[test]
    fn test_transformed_columns_are_standardized() {
        let x = array![[1.0, 10.0], [2.0, 30.0], [3.0, 20.0], [6.0, 40.0]];
        let (scaled, report) = StandardScaler::new().fit_transform(&x).unwrap();
        assert_eq!(report.imputed, 0);

        for column in scaled.axis_iter(Axis(1)) {
            let n = column.len() as f64;
            let mean = column.sum() / n;
            let var = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            assert_relative_eq!(mean, 0.0, epsilon = 1e-12);
            assert_relative_eq!(var, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_constant_column_scale_is_one() {
        let x = array![[7.0], [7.0], [7.0]];
        let (scaled, _) = StandardScaler::new().fit_transform(&x).unwrap();
        assert!(scaled.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_nan_ignored_on_fit_and_imputed_on_transform() {
        let x = array![[1.0], [f64::NAN], [3.0]];
        let mut scaler = StandardScaler::new();
        let (scaled, report) = scaler.fit_transform(&x).unwrap();

        assert_relative_eq!(scaler.mean().unwrap()[0], 2.0);
        assert_eq!(report.imputed, 1);
        assert_eq!(scaled[[1, 0]], 0.0);
    }

    #[test]
    fn test_transform_leaves_parameters_unchanged() {
        let mut scaler = StandardScaler::new();
        scaler.fit(&array![[1.0], [2.0], [3.0]]).unwrap();
        let before = scaler.clone();

        scaler.transform(&array![[100.0], [200.0]]).unwrap();
        assert_eq!(scaler, before);
    }

    #[test]
    fn test_errors() {
        let scaler = StandardScaler::new();
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(ModelError::NotFitted(_))
        ));

        let mut scaler = StandardScaler::new();
        assert!(matches!(
            scaler.fit(&Array2::zeros((0, 2))),
            Err(ModelError::EmptyInput(_))
        ));

        scaler.fit(&array![[1.0, 2.0]]).unwrap();
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(ModelError::Shape { .. })
        ));
    }
}
