//! CSV loading and the store reference join.
//!
//! Both tables are read fully into memory. Schema inference scans the whole
//! file by default so that mixed columns such as `StateHoliday` (`0`, `a`,
//! `b`, `c`) are not mis-typed from their first rows, and the columns in
//! [`STRING_COLUMNS`] are always cast to strings afterwards.

use crate::error::{DataError, Result};
use crate::schema::{
    COMPETITION_DISTANCE, DEFAULT_DROPPED_COLUMNS, REFERENCE_COLUMNS, STORE, STRING_COLUMNS,
    TRANSACTION_COLUMNS, require_columns,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::{debug, info};

/// Distance used for stores with no known competitor.
pub const DEFAULT_COMPETITION_DISTANCE_FILL: f64 = 100_000.0;

const ROW_INDEX: &str = "__storecast_row";

/// Configuration for loading and preparing the sales tables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Rows scanned for schema inference (`None` scans the whole file)
    pub infer_schema_length: Option<usize>,
    /// Value for missing `CompetitionDistance` (`None` leaves nulls)
    pub competition_distance_fill: Option<f64>,
    /// Columns removed before modelling when present
    pub dropped_columns: Vec<String>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            infer_schema_length: None,
            competition_distance_fill: Some(DEFAULT_COMPETITION_DISTANCE_FILL),
            dropped_columns: DEFAULT_DROPPED_COLUMNS
                .iter()
                .map(|c| (*c).to_string())
                .collect(),
        }
    }
}

/// Outcome of [`prepare`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrepareReport {
    /// Rows whose `CompetitionDistance` was filled
    pub imputed_competition_distance: usize,
    /// Columns that were present and removed
    pub dropped_columns: Vec<String>,
}

/// Read a CSV file into a frame without validating its columns.
pub fn read_csv(path: impl AsRef<Path>, config: &LoaderConfig) -> Result<DataFrame> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| DataError::Load {
        path: path.to_path_buf(),
        source,
    })?;

    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(config.infer_schema_length)
        .into_reader_with_file_handle(file)
        .finish()
        .map_err(|e| DataError::Malformed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    let df = cast_string_columns(df)?;
    debug!(path = %path.display(), rows = df.height(), columns = df.width(), "Read CSV");
    Ok(df)
}

/// Load the transaction table (`train.csv`).
pub fn load_transactions(path: impl AsRef<Path>, config: &LoaderConfig) -> Result<DataFrame> {
    let df = read_csv(path, config)?;
    require_columns(&df, "transactions", TRANSACTION_COLUMNS)?;
    Ok(df)
}

/// Load the store reference table (`store.csv`).
pub fn load_reference(path: impl AsRef<Path>, config: &LoaderConfig) -> Result<DataFrame> {
    let df = read_csv(path, config)?;
    require_columns(&df, "reference", REFERENCE_COLUMNS)?;
    Ok(df)
}

/// Left-join store attributes onto every transaction row.
///
/// The output has exactly `transactions.height()` rows in the original
/// order; reference columns are null for stores missing from `reference`.
/// A reference table that repeats a store is rejected because it would
/// duplicate transaction rows.
pub fn merge(transactions: &DataFrame, reference: &DataFrame) -> Result<DataFrame> {
    require_columns(transactions, "transactions", &[STORE])?;
    require_columns(reference, "reference", &[STORE])?;

    let unique = reference.column(STORE)?.n_unique()?;
    if unique != reference.height() {
        return Err(DataError::DuplicateKey {
            key: STORE.to_string(),
            duplicates: reference.height() - unique,
        });
    }

    let merged = transactions
        .clone()
        .lazy()
        .with_row_index(ROW_INDEX, None)
        .with_column(col(STORE).cast(DataType::Int64))
        .join(
            reference
                .clone()
                .lazy()
                .with_column(col(STORE).cast(DataType::Int64)),
            [col(STORE)],
            [col(STORE)],
            JoinArgs::new(JoinType::Left),
        )
        .sort([ROW_INDEX], SortMultipleOptions::default())
        .collect()?
        .drop(ROW_INDEX)?;

    let unmatched = unmatched_rows(transactions, reference)?;
    debug!(rows = merged.height(), unmatched, "Merged store reference data");

    Ok(merged)
}

/// Number of transaction rows whose store has no row in `reference`.
pub fn unmatched_rows(transactions: &DataFrame, reference: &DataFrame) -> Result<usize> {
    require_columns(transactions, "transactions", &[STORE])?;
    require_columns(reference, "reference", &[STORE])?;

    let unmatched = transactions
        .clone()
        .lazy()
        .select([col(STORE).cast(DataType::Int64)])
        .join(
            reference
                .clone()
                .lazy()
                .select([col(STORE).cast(DataType::Int64)]),
            [col(STORE)],
            [col(STORE)],
            JoinArgs::new(JoinType::Anti),
        )
        .collect()?;
    Ok(unmatched.height())
}

/// Load both tables and left-join the reference attributes by store.
pub fn load_and_merge(
    reference_path: impl AsRef<Path>,
    transaction_path: impl AsRef<Path>,
    config: &LoaderConfig,
) -> Result<DataFrame> {
    let reference = load_reference(reference_path, config)?;
    let transactions = load_transactions(transaction_path, config)?;
    info!(
        transactions = transactions.height(),
        stores = reference.height(),
        "Loaded sales tables"
    );
    merge(&transactions, &reference)
}

/// Fill missing competition distances with `fill`.
///
/// Frames without the column are returned unchanged with a count of zero.
pub fn impute_competition_distance(df: &DataFrame, fill: f64) -> Result<(DataFrame, usize)> {
    let Ok(column) = df.column(COMPETITION_DISTANCE) else {
        return Ok((df.clone(), 0));
    };
    let missing = column.null_count();

    let filled = df
        .clone()
        .lazy()
        .with_column(
            col(COMPETITION_DISTANCE)
                .cast(DataType::Float64)
                .fill_null(lit(fill)),
        )
        .collect()?;

    Ok((filled, missing))
}

/// Remove `columns` that are present in `df`, returning the names removed.
pub fn drop_unused_columns(df: &DataFrame, columns: &[String]) -> Result<(DataFrame, Vec<String>)> {
    let mut out = df.clone();
    let mut dropped = Vec::new();
    for name in columns {
        if out.column(name).is_ok() {
            out = out.drop(name)?;
            dropped.push(name.clone());
        }
    }
    Ok((out, dropped))
}

/// Apply the configured imputation and column drops.
pub fn prepare(df: &DataFrame, config: &LoaderConfig) -> Result<(DataFrame, PrepareReport)> {
    let (df, imputed) = match config.competition_distance_fill {
        Some(fill) => impute_competition_distance(df, fill)?,
        None => (df.clone(), 0),
    };
    let (df, dropped) = drop_unused_columns(&df, &config.dropped_columns)?;

    if imputed > 0 {
        info!(rows = imputed, "Imputed missing competition distance");
    }

    Ok((
        df,
        PrepareReport {
            imputed_competition_distance: imputed,
            dropped_columns: dropped,
        },
    ))
}

fn cast_string_columns(df: DataFrame) -> Result<DataFrame> {
    let casts: Vec<Expr> = STRING_COLUMNS
        .iter()
        .filter(|name| df.column(name).is_ok())
        .map(|name| col(*name).cast(DataType::String))
        .collect();

    if casts.is_empty() {
        return Ok(df);
    }
    Ok(df.lazy().with_columns(casts).collect()?)
}
