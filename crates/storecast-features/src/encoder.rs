//! Categorical label encoding.
//!
//! Codes are assigned in sorted order of the distinct values seen at fit
//! time, so the same input always yields the same table. Tables are applied
//! as-is to new data; a value the table has never seen is either rejected or
//! mapped to a configured fallback code, never silently re-fitted.

use crate::error::{FeatureError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::AddAssign;
use storecast_data::schema::{DATE, STATE_HOLIDAY};
use tracing::{debug, warn};

/// What to do with a value absent from a fitted [`EncodingTable`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnknownCategoryPolicy {
    /// Fail with [`FeatureError::UnknownCategory`]
    #[default]
    Reject,
    /// Emit this code and count the occurrence
    Fallback(u32),
}

/// Value-to-code mapping for one column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodingTable {
    column: String,
    /// Sorted distinct values; a value's code is its index.
    values: Vec<String>,
}

impl EncodingTable {
    /// Name of the encoded column.
    pub fn column(&self) -> &str {
        &self.column
    }

    /// Number of categories.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no category was seen.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Code of a raw value.
    pub fn code_of(&self, value: &str) -> Option<u32> {
        self.values
            .binary_search_by(|v| v.as_str().cmp(value))
            .ok()
            .map(|idx| idx as u32)
    }

    /// Raw value of a code.
    pub fn value_of(&self, code: u32) -> Option<&str> {
        self.values.get(code as usize).map(String::as_str)
    }

    /// Categories in code order.
    pub fn values(&self) -> &[String] {
        &self.values
    }
}

/// Counts collected while encoding
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncodeReport {
    /// Values encoded
    pub rows: usize,
    /// Null inputs passed through as null
    pub nulls: usize,
    /// Unknown values replaced with the fallback code
    pub fallbacks: usize,
}

impl AddAssign for EncodeReport {
    fn add_assign(&mut self, rhs: Self) {
        self.rows += rhs.rows;
        self.nulls += rhs.nulls;
        self.fallbacks += rhs.fallbacks;
    }
}

/// Label encoder for a single column
#[derive(Debug, Clone, Copy, Default)]
pub struct CategoricalEncoder {
    policy: UnknownCategoryPolicy,
}

impl CategoricalEncoder {
    /// Create an encoder with the given unknown-category policy.
    pub const fn new(policy: UnknownCategoryPolicy) -> Self {
        Self { policy }
    }

    /// Unknown-category policy in effect.
    pub const fn policy(&self) -> UnknownCategoryPolicy {
        self.policy
    }

    /// Build the encoding table from raw values; nulls are ignored.
    pub fn fit<I, S>(&self, column: &str, values: I) -> EncodingTable
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        let distinct: BTreeSet<String> = values
            .into_iter()
            .flatten()
            .map(|v| v.as_ref().to_string())
            .collect();

        EncodingTable {
            column: column.to_string(),
            values: distinct.into_iter().collect(),
        }
    }

    /// Encode raw values with a fitted table.
    pub fn transform<I, S>(&self, table: &EncodingTable, values: I) -> Result<(Vec<Option<u32>>, EncodeReport)>
    where
        I: IntoIterator<Item = Option<S>>,
        S: AsRef<str>,
    {
        let mut report = EncodeReport::default();
        let mut codes = Vec::new();

        for value in values {
            report.rows += 1;
            let Some(value) = value else {
                report.nulls += 1;
                codes.push(None);
                continue;
            };
            let value = value.as_ref();
            let code = match (table.code_of(value), self.policy) {
                (Some(code), _) => code,
                (None, UnknownCategoryPolicy::Fallback(code)) => {
                    report.fallbacks += 1;
                    code
                }
                (None, UnknownCategoryPolicy::Reject) => {
                    return Err(FeatureError::UnknownCategory {
                        column: table.column.clone(),
                        value: value.to_string(),
                    });
                }
            };
            codes.push(Some(code));
        }

        if report.fallbacks > 0 {
            warn!(
                column = %table.column,
                count = report.fallbacks,
                "Unknown categories mapped to fallback code"
            );
        }

        Ok((codes, report))
    }

    /// Fit a table from a frame column, normalizing the holiday indicator.
    pub fn fit_column(&self, column: &Column) -> Result<EncodingTable> {
        let values = categorical_values(column)?;
        Ok(self.fit(column.name().as_str(), values))
    }

    /// Encode a frame column into an `Int64` column of the same name.
    pub fn transform_column(&self, table: &EncodingTable, column: &Column) -> Result<(Column, EncodeReport)> {
        let values = categorical_values(column)?;
        let (codes, report) = self.transform(table, values)?;
        let codes: Vec<Option<i64>> = codes.into_iter().map(|c| c.map(i64::from)).collect();
        Ok((Column::new(column.name().clone(), codes), report))
    }
}

/// Normalize a raw holiday indicator: every spelling of zero becomes `"0"`.
pub fn normalize_holiday(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed.parse::<f64>() {
        Ok(v) if v == 0.0 => "0".to_string(),
        _ => trimmed.to_string(),
    }
}

/// Holiday indicator values of a column, normalized.
pub fn holiday_values(column: &Column) -> Result<Vec<Option<String>>> {
    let rendered = column.cast(&DataType::String)?;
    Ok(rendered
        .str()?
        .into_iter()
        .map(|v| v.map(normalize_holiday))
        .collect())
}

/// String values of a categorical column, with holiday normalization applied
/// to the holiday indicator.
fn categorical_values(column: &Column) -> Result<Vec<Option<String>>> {
    if column.name().as_str() == STATE_HOLIDAY {
        return holiday_values(column);
    }
    let rendered = column.cast(&DataType::String)?;
    Ok(rendered
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

/// Fitted encoding tables for every categorical column of a frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnEncoders {
    policy: UnknownCategoryPolicy,
    tables: BTreeMap<String, EncodingTable>,
}

impl ColumnEncoders {
    /// Columns treated as categorical: every string column except the date,
    /// plus the holiday indicator whatever its inferred type.
    pub fn categorical_columns(df: &DataFrame) -> Vec<String> {
        df.get_columns()
            .iter()
            .filter(|c| {
                let name = c.name().as_str();
                name != DATE && (name == STATE_HOLIDAY || c.dtype() == &DataType::String)
            })
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Fit one table per categorical column of `df`.
    pub fn fit(df: &DataFrame, policy: UnknownCategoryPolicy) -> Result<Self> {
        let encoder = CategoricalEncoder::new(policy);
        let mut tables = BTreeMap::new();
        for name in Self::categorical_columns(df) {
            let table = encoder.fit_column(df.column(&name)?)?;
            debug!(column = %name, categories = table.len(), "Fitted encoding table");
            tables.insert(name, table);
        }
        Ok(Self { policy, tables })
    }

    /// Replace every fitted column of `df` with its codes.
    pub fn transform(&self, df: &DataFrame) -> Result<(DataFrame, EncodeReport)> {
        let missing: Vec<String> = self
            .tables
            .keys()
            .filter(|name| df.column(name).is_err())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(FeatureError::MissingColumns(missing));
        }

        let encoder = CategoricalEncoder::new(self.policy);
        let mut out = df.clone();
        let mut report = EncodeReport::default();
        for (name, table) in &self.tables {
            let (encoded, column_report) = encoder.transform_column(table, df.column(name)?)?;
            out.with_column(encoded)?;
            report += column_report;
        }
        Ok((out, report))
    }

    /// Fitted table of a column.
    pub fn table(&self, column: &str) -> Option<&EncodingTable> {
        self.tables.get(column)
    }

    /// Encoded column names in sorted order.
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Policy used for unseen values.
    pub const fn policy(&self) -> UnknownCategoryPolicy {
        self.policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn some(values: &[&str]) -> Vec<Option<String>> {
        values.iter().map(|v| Some((*v).to_string())).collect()
    }

    #[test]
    fn test_codes_follow_sorted_order() {
        let encoder = CategoricalEncoder::default();
        let table = encoder.fit("StoreType", some(&["c", "a", "d", "a", "b"]));
        assert_eq!(table.values(), &["a", "b", "c", "d"]);
        assert_eq!(table.code_of("a"), Some(0));
        assert_eq!(table.code_of("d"), Some(3));
        assert_eq!(table.value_of(2), Some("c"));
        assert_eq!(table.value_of(4), None);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let encoder = CategoricalEncoder::default();
        let input = some(&["b", "a", "c", "b"]);
        let table = encoder.fit("Assortment", input.clone());
        let (first, _) = encoder.transform(&table, input.clone()).unwrap();
        let (second, _) = encoder.transform(&table, input).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, vec![Some(1), Some(0), Some(2), Some(1)]);
    }

    #[test]
    fn test_refit_gives_same_table() {
        let encoder = CategoricalEncoder::default();
        let input = some(&["z", "x", "y"]);
        assert_eq!(encoder.fit("c", input.clone()), encoder.fit("c", input));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let encoder = CategoricalEncoder::new(UnknownCategoryPolicy::Reject);
        let table = encoder.fit("StoreType", some(&["a", "b"]));
        let err = encoder.transform(&table, some(&["a", "z"])).unwrap_err();
        match err {
            FeatureError::UnknownCategory { column, value } => {
                assert_eq!(column, "StoreType");
                assert_eq!(value, "z");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_category_fallback_is_counted() {
        let encoder = CategoricalEncoder::new(UnknownCategoryPolicy::Fallback(0));
        let table = encoder.fit("StoreType", some(&["a", "b"]));
        let (codes, report) = encoder
            .transform(&table, vec![Some("b"), Some("z"), None, Some("q")])
            .unwrap();
        assert_eq!(codes, vec![Some(1), Some(0), None, Some(0)]);
        assert_eq!(report.fallbacks, 2);
        assert_eq!(report.nulls, 1);
        assert_eq!(report.rows, 4);
    }

    #[rstest]
    #[case("0", "0")]
    #[case("0.0", "0")]
    #[case(" 0 ", "0")]
    #[case("a", "a")]
    #[case("c", "c")]
    fn test_normalize_holiday(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize_holiday(raw), expected);
    }

    #[test]
    fn test_holiday_zero_spellings_share_one_code() {
        let df = df!(STATE_HOLIDAY => ["0", "a", "0.0", "b"]).unwrap();
        let encoders = ColumnEncoders::fit(&df, UnknownCategoryPolicy::Reject).unwrap();
        let table = encoders.table(STATE_HOLIDAY).unwrap();
        assert_eq!(table.values(), &["0", "a", "b"]);

        let numeric = df!(STATE_HOLIDAY => [0i64, 0]).unwrap();
        let (encoded, _) = encoders.transform(&numeric).unwrap();
        let codes = encoded.column(STATE_HOLIDAY).unwrap().i64().unwrap();
        assert_eq!(codes.get(0), Some(0));
    }

    #[test]
    fn test_column_encoders_skip_date_and_numeric() {
        let df = df!(
            DATE => ["2015-07-31"],
            "Store" => [1i64],
            "StoreType" => ["c"],
            STATE_HOLIDAY => [0i64],
        )
        .unwrap();
        let columns = ColumnEncoders::categorical_columns(&df);
        assert_eq!(columns, vec!["StoreType".to_string(), STATE_HOLIDAY.to_string()]);
    }

    #[test]
    fn test_column_encoders_require_fitted_columns() {
        let train = df!("StoreType" => ["a", "b"]).unwrap();
        let encoders = ColumnEncoders::fit(&train, UnknownCategoryPolicy::Reject).unwrap();
        let other = df!("Store" => [1i64]).unwrap();
        assert!(matches!(
            encoders.transform(&other),
            Err(FeatureError::MissingColumns(_))
        ));
    }
}
