//! Lenient date parsing for the `Date` column.

use crate::error::{FeatureError, Result};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;

/// Formats tried, in order, when none are configured.
pub const DEFAULT_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d.%m.%Y"];

/// Parse a raw date, accepting a trailing time of day.
///
/// Returns `None` when no format matches.
pub fn parse_date(raw: &str, formats: &[String]) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    formats.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(raw, fmt).ok().or_else(|| {
            NaiveDateTime::parse_from_str(raw, &format!("{fmt} %H:%M:%S"))
                .ok()
                .map(|dt| dt.date())
        })
    })
}

/// Parse every value of a date column; unparseable and null values are `None`.
///
/// Accepts string columns as well as polars `Date`/`Datetime` columns, which
/// are rendered to ISO strings first.
pub fn parse_date_column(df: &DataFrame, name: &str, formats: &[String]) -> Result<Vec<Option<NaiveDate>>> {
    let column = df
        .column(name)
        .map_err(|_| FeatureError::MissingColumns(vec![name.to_string()]))?;
    let rendered = column.cast(&DataType::String)?;
    let values = rendered.str()?;

    Ok(values
        .into_iter()
        .map(|v| v.and_then(|raw| parse_date(raw, formats)))
        .collect())
}

/// Default formats as owned strings, for configuration structs.
pub fn default_formats() -> Vec<String> {
    DEFAULT_DATE_FORMATS.iter().map(|f| (*f).to_string()).collect()
}
