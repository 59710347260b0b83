//! Seeded train/test split of a record table.

use crate::error::{ModelError, Result};
use polars::prelude::*;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// Default held-out fraction.
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

/// Default split seed.
pub const DEFAULT_SPLIT_SEED: u64 = 42;

/// Shuffle `0..n` and cut off `ceil(test_fraction * n)` test rows.
///
/// Both halves are returned in ascending row order.
pub fn split_indices(n: usize, test_fraction: f64, seed: u64) -> Result<(Vec<usize>, Vec<usize>)> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(ModelError::InvalidParameter(format!(
            "test fraction must be in (0, 1), got {test_fraction}"
        )));
    }
    if n == 0 {
        return Err(ModelError::EmptyInput("cannot split zero rows".to_string()));
    }

    let n_test = (test_fraction * n as f64).ceil() as usize;
    if n_test >= n {
        return Err(ModelError::InvalidParameter(format!(
            "test fraction {test_fraction} leaves no training rows out of {n}"
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

    let mut test = indices[..n_test].to_vec();
    let mut train = indices[n_test..].to_vec();
    test.sort_unstable();
    train.sort_unstable();
    Ok((train, test))
}

/// Split `df` into `(train, test)` frames.
pub fn train_test_split(df: &DataFrame, test_fraction: f64, seed: u64) -> Result<(DataFrame, DataFrame)> {
    let (train, test) = split_indices(df.height(), test_fraction, seed)?;
    Ok((take_rows(df, &train)?, take_rows(df, &test)?))
}

/// Rows of `df` at `rows`, in that order.
pub fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx = IdxCa::from_vec("idx".into(), rows.iter().map(|&i| i as IdxSize).collect());
    Ok(df.take(&idx)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(10, 0.2, 2)]
    #[case(11, 0.2, 3)]
    #[case(5, 0.5, 3)]
    #[case(3, 0.1, 1)]
    fn test_test_size_is_ceiling(#[case] n: usize, #[case] fraction: f64, #[case] expected: usize) {
        let (train, test) = split_indices(n, fraction, DEFAULT_SPLIT_SEED).unwrap();
        assert_eq!(test.len(), expected);
        assert_eq!(train.len(), n - expected);
    }

    #[test]
    fn test_split_is_seeded_and_disjoint() {
        let a = split_indices(50, 0.2, 42).unwrap();
        let b = split_indices(50, 0.2, 42).unwrap();
        assert_eq!(a, b);

        let (train, test) = a;
        assert!(test.iter().all(|i| !train.contains(i)));
        assert!(train.windows(2).all(|w| w[0] < w[1]));
    }

    #[rstest]
    #[case(0.0)]
    #[case(1.0)]
    #[case(-0.5)]
    #[case(f64::NAN)]
    fn test_invalid_fraction(#[case] fraction: f64) {
        assert!(matches!(
            split_indices(10, fraction, 0),
            Err(ModelError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_too_few_rows() {
        assert!(matches!(split_indices(0, 0.2, 0), Err(ModelError::EmptyInput(_))));
        assert!(matches!(split_indices(1, 0.2, 0), Err(ModelError::InvalidParameter(_))));
    }

    #[test]
    fn test_frame_split() {
        let df = df!("a" => (0..10).collect::<Vec<i64>>()).unwrap();
        let (train, test) = train_test_split(&df, 0.3, 1).unwrap();
        assert_eq!(train.height(), 7);
        assert_eq!(test.height(), 3);

        let mut all: Vec<i64> = train
            .column("a")
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .chain(test.column("a").unwrap().i64().unwrap().into_no_null_iter())
            .collect();
        all.sort_unstable();
        assert_eq!(all, (0..10).collect::<Vec<i64>>());
    }
}
