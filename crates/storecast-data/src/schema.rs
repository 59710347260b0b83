//! Column names and required column sets of the sales tables.

use crate::error::{DataError, Result};
use polars::prelude::*;

/// Store identifier, the join key between the two tables.
pub const STORE: &str = "Store";
/// Observation date (ISO `YYYY-MM-DD` in the raw data).
pub const DATE: &str = "Date";
/// Day of week, 1 = Monday .. 7 = Sunday in the raw data.
pub const DAY_OF_WEEK: &str = "DayOfWeek";
/// Daily sales, the regression target.
pub const SALES: &str = "Sales";
/// Customer count. Not known ahead of time, so never a model input.
pub const CUSTOMERS: &str = "Customers";
/// Store open flag.
pub const OPEN: &str = "Open";
/// Promotion running flag.
pub const PROMO: &str = "Promo";
/// Holiday indicator: "0" none, "a" public, "b" Easter, "c" Christmas.
pub const STATE_HOLIDAY: &str = "StateHoliday";
/// School holiday flag.
pub const SCHOOL_HOLIDAY: &str = "SchoolHoliday";

/// Store category.
pub const STORE_TYPE: &str = "StoreType";
/// Assortment level.
pub const ASSORTMENT: &str = "Assortment";
/// Distance in metres to the nearest competitor.
pub const COMPETITION_DISTANCE: &str = "CompetitionDistance";
/// Months in which the continuing promotion restarts.
pub const PROMO_INTERVAL: &str = "PromoInterval";

/// Columns every transaction table must carry.
pub const TRANSACTION_COLUMNS: &[&str] = &[
    STORE,
    DAY_OF_WEEK,
    DATE,
    OPEN,
    PROMO,
    STATE_HOLIDAY,
    SCHOOL_HOLIDAY,
];

/// Columns every reference table must carry.
pub const REFERENCE_COLUMNS: &[&str] = &[STORE, STORE_TYPE, ASSORTMENT, COMPETITION_DISTANCE];

/// Columns read as strings regardless of what schema inference would pick.
///
/// `StateHoliday` holds a mix of `0` and letter codes and long runs of `0`
/// at the top of a file would otherwise be inferred as integers.
pub const STRING_COLUMNS: &[&str] = &[DATE, STATE_HOLIDAY, STORE_TYPE, ASSORTMENT, PROMO_INTERVAL];

/// Bookkeeping and leakage columns dropped before modelling.
pub const DEFAULT_DROPPED_COLUMNS: &[&str] = &["Id", "Unnamed: 0", CUSTOMERS];

/// Names of `required` columns absent from `df`.
pub fn missing_columns(df: &DataFrame, required: &[&str]) -> Vec<String> {
    let present = df.get_column_names();
    required
        .iter()
        .filter(|name| !present.iter().any(|p| p.as_str() == **name))
        .map(|name| (*name).to_string())
        .collect()
}

/// Fail with [`DataError::Schema`] unless every `required` column is present.
pub fn require_columns(df: &DataFrame, table: &str, required: &[&str]) -> Result<()> {
    let missing = missing_columns(df, required);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(DataError::Schema {
            table: table.to_string(),
            missing,
        })
    }
}
