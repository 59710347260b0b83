//! Holiday calendar and distance-to-holiday lookups.
//!
//! The calendar is the sorted set of distinct dates on which the holiday
//! indicator is anything other than `"0"`. It is built once from training
//! data and reused unchanged when scoring new rows, so that a single-row
//! request still sees every known holiday.

use crate::dates::parse_date_column;
use crate::encoder::holiday_values;
use crate::error::{FeatureError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use storecast_data::schema::{DATE, STATE_HOLIDAY};

/// `DaysToNextHoliday` value when no holiday falls on or after the date.
pub const NO_UPCOMING_HOLIDAY: i64 = -1;

/// Normalized holiday indicator meaning "no holiday".
pub const NO_HOLIDAY: &str = "0";

/// Sorted set of holiday dates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HolidayCalendar {
    dates: BTreeSet<NaiveDate>,
}

impl HolidayCalendar {
    /// Create a calendar from explicit dates.
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        Self {
            dates: dates.into_iter().collect(),
        }
    }

    /// Collect the holiday dates of a record table.
    ///
    /// Rows with a null holiday indicator or an unparseable date are skipped.
    pub fn from_frame(df: &DataFrame, formats: &[String]) -> Result<Self> {
        let missing: Vec<String> = [DATE, STATE_HOLIDAY]
            .iter()
            .filter(|c| df.column(c).is_err())
            .map(|c| (*c).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(FeatureError::MissingColumns(missing));
        }

        let dates = parse_date_column(df, DATE, formats)?;
        let holidays = holiday_values(df.column(STATE_HOLIDAY)?)?;

        Ok(Self::new(dates.into_iter().zip(holidays).filter_map(
            |(date, holiday)| match (date, holiday) {
                (Some(date), Some(h)) if h != NO_HOLIDAY => Some(date),
                _ => None,
            },
        )))
    }

    /// Number of distinct holiday dates.
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    /// Whether the calendar holds no dates.
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Iterate the dates in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = &NaiveDate> {
        self.dates.iter()
    }

    /// Earliest holiday on or after `date`.
    pub fn next_on_or_after(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.dates.range(date..).next().copied()
    }

    /// Latest holiday on or before `date`.
    pub fn last_on_or_before(&self, date: NaiveDate) -> Option<NaiveDate> {
        self.dates.range(..=date).next_back().copied()
    }

    /// Days until the next holiday, or [`NO_UPCOMING_HOLIDAY`].
    pub fn days_to_next(&self, date: NaiveDate) -> i64 {
        self.next_on_or_after(date)
            .map_or(NO_UPCOMING_HOLIDAY, |h| (h - date).num_days())
    }

    /// Days since the most recent holiday, if any precedes `date`.
    pub fn days_after(&self, date: NaiveDate) -> Option<i64> {
        self.last_on_or_before(date).map(|h| (date - h).num_days())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::default_formats;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn calendar() -> HolidayCalendar {
        HolidayCalendar::new([date(2015, 1, 1), date(2015, 12, 25)])
    }

    #[test]
    fn test_distances_between_holidays() {
        let cal = calendar();
        assert_eq!(cal.days_to_next(date(2015, 6, 1)), 207);
        assert_eq!(cal.days_after(date(2015, 6, 1)), Some(151));
    }

    #[test]
    fn test_holiday_itself_is_zero_both_ways() {
        let cal = calendar();
        assert_eq!(cal.days_to_next(date(2015, 12, 25)), 0);
        assert_eq!(cal.days_after(date(2015, 12, 25)), Some(0));
    }

    #[test]
    fn test_no_future_holiday_sentinel() {
        assert_eq!(calendar().days_to_next(date(2015, 12, 26)), NO_UPCOMING_HOLIDAY);
        assert_eq!(HolidayCalendar::default().days_to_next(date(2015, 1, 1)), -1);
    }

    #[test]
    fn test_no_past_holiday_is_none() {
        assert_eq!(calendar().days_after(date(2014, 12, 31)), None);
    }

    #[test]
    fn test_from_frame_normalizes_and_dedups() {
        let df = df!(
            DATE => ["2015-01-01", "2015-01-01", "2015-04-03", "2015-05-01", "bad", "2015-12-25"],
            STATE_HOLIDAY => [Some("a"), Some("a"), Some("b"), Some("0"), Some("a"), None],
        )
        .unwrap();
        let cal = HolidayCalendar::from_frame(&df, &default_formats()).unwrap();
        let dates: Vec<NaiveDate> = cal.dates().copied().collect();
        assert_eq!(dates, vec![date(2015, 1, 1), date(2015, 4, 3)]);
    }

    #[test]
    fn test_from_frame_with_numeric_zero_indicator() {
        let df = df!(
            DATE => ["2015-01-01", "2015-01-02"],
            STATE_HOLIDAY => [0i64, 0],
        )
        .unwrap();
        let cal = HolidayCalendar::from_frame(&df, &default_formats()).unwrap();
        assert!(cal.is_empty());
    }
}
