//! K-fold cross-validation splits

use crate::error::{ModelError, Result};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// One train/validation partition of the row indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    /// Fold number, from 0
    pub index: usize,
    /// Rows used for fitting
    pub train: Vec<usize>,
    /// Rows held out for scoring
    pub test: Vec<usize>,
}

/// K-fold splitter
///
/// Rows are cut into `n_splits` contiguous blocks (optionally after a
/// seeded shuffle); the first `n % n_splits` blocks get one extra row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KFold {
    /// Number of folds (at least 2)
    pub n_splits: usize,
    /// Shuffle rows before cutting
    pub shuffle: bool,
    /// Shuffle seed
    pub seed: u64,
}

impl Default for KFold {
    fn default() -> Self {
        Self {
            n_splits: 5,
            shuffle: false,
            seed: 42,
        }
    }
}

impl KFold {
    /// Unshuffled splitter with `n_splits` folds.
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            ..Default::default()
        }
    }

    /// Partition `0..n_samples` into folds.
    pub fn split(&self, n_samples: usize) -> Result<Vec<Fold>> {
        if self.n_splits < 2 {
            return Err(ModelError::InvalidParameter(format!(
                "n_splits must be at least 2, got {}",
                self.n_splits
            )));
        }
        if n_samples < self.n_splits {
            return Err(ModelError::InvalidParameter(format!(
                "n_samples ({n_samples}) must be >= n_splits ({})",
                self.n_splits
            )));
        }

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if self.shuffle {
            indices.shuffle(&mut ChaCha8Rng::seed_from_u64(self.seed));
        }

        let base = n_samples / self.n_splits;
        let remainder = n_samples % self.n_splits;
        let mut folds = Vec::with_capacity(self.n_splits);
        let mut start = 0;

        for index in 0..self.n_splits {
            let size = if index < remainder { base + 1 } else { base };
            let end = start + size;
            let test = indices[start..end].to_vec();
            let train = indices[..start]
                .iter()
                .chain(&indices[end..])
                .copied()
                .collect();
            folds.push(Fold { index, train, test });
            start = end;
        }

        Ok(folds)
    }
}
