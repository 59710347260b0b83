//! Regression metrics

use crate::error::{ModelError, Result};
use serde::{Deserialize, Serialize};

/// Error metrics of predictions against actual values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    /// Mean squared error
    pub mse: f64,
    /// Mean absolute error
    pub mae: f64,
    /// Coefficient of determination
    pub r2: f64,
    /// Number of scored rows
    pub n: usize,
}

impl RegressionMetrics {
    /// Root mean squared error.
    pub fn rmse(&self) -> f64 {
        self.mse.sqrt()
    }
}

/// Score `predictions` against `actuals`.
///
/// When the actuals have zero variance, R² is 1.0 for a perfect fit and 0.0
/// otherwise.
pub fn evaluate(predictions: &[f64], actuals: &[f64]) -> Result<RegressionMetrics> {
    if predictions.len() != actuals.len() {
        return Err(ModelError::Shape {
            expected: format!("{} predictions", actuals.len()),
            actual: format!("{} predictions", predictions.len()),
        });
    }
    if actuals.is_empty() {
        return Err(ModelError::EmptyInput("no rows to evaluate".to_string()));
    }

    let n = actuals.len() as f64;
    let mean = actuals.iter().sum::<f64>() / n;

    let mut ss_res = 0.0;
    let mut abs_err = 0.0;
    let mut ss_tot = 0.0;
    for (p, a) in predictions.iter().zip(actuals) {
        let e = a - p;
        ss_res += e * e;
        abs_err += e.abs();
        ss_tot += (a - mean).powi(2);
    }

    let r2 = if ss_tot > 0.0 {
        1.0 - ss_res / ss_tot
    } else if ss_res == 0.0 {
        1.0
    } else {
        0.0
    };

    Ok(RegressionMetrics {
        mse: ss_res / n,
        mae: abs_err / n,
        r2,
        n: actuals.len(),
    })
}

/// Mean squared error alone.
pub fn mse(predictions: &[f64], actuals: &[f64]) -> Result<f64> {
    evaluate(predictions, actuals).map(|m| m.mse)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[test]
    fn test_known_values() {
        let m = evaluate(&[2.5, 0.0, 2.0, 8.0], &[3.0, -0.5, 2.0, 7.0]).unwrap();
        assert_relative_eq!(m.mse, 0.375);
        assert_relative_eq!(m.mae, 0.5);
        assert_relative_eq!(m.r2, 0.948_608_137_044_967_9, epsilon = 1e-12);
        assert_eq!(m.n, 4);
    }

    #[test]
    fn test_perfect_fit() {
        let m = evaluate(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap();
        assert_eq!(m.mse, 0.0);
        assert_eq!(m.mae, 0.0);
        assert_eq!(m.r2, 1.0);
    }

    #[rstest]
    #[case(&[5.0, 5.0], 1.0)]
    #[case(&[4.0, 6.0], 0.0)]
    fn test_constant_actuals(#[case] predictions: &[f64], #[case] expected: f64) {
        let m = evaluate(predictions, &[5.0, 5.0]).unwrap();
        assert_eq!(m.r2, expected);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(evaluate(&[1.0], &[1.0, 2.0]), Err(ModelError::Shape { .. })));
        assert!(matches!(evaluate(&[], &[]), Err(ModelError::EmptyInput(_))));
    }
}
