//! Conversion of frame columns to `ndarray` matrices.

use crate::error::Result;
use ndarray::{Array1, Array2};
use polars::prelude::*;

/// Row-major `f64` matrix of `columns`, with nulls as `NaN`.
pub fn to_matrix(df: &DataFrame, columns: &[String]) -> Result<Array2<f64>> {
    let rows = df.height();
    let mut matrix = Array2::<f64>::from_elem((rows, columns.len()), f64::NAN);

    for (j, name) in columns.iter().enumerate() {
        let values = to_vector(df, name)?;
        matrix.column_mut(j).assign(&values);
    }

    Ok(matrix)
}

/// One column as `f64`, with nulls as `NaN`.
pub fn to_vector(df: &DataFrame, column: &str) -> Result<Array1<f64>> {
    let col = df.column(column)?.cast(&DataType::Float64)?;
    Ok(col
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}
