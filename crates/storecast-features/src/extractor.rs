//! Calendar and holiday-relative feature extraction.
//!
//! Adds the following columns to a record table:
//!
//! | column | definition |
//! |---|---|
//! | `Weekend` | 1 when the day of week is Saturday or Sunday |
//! | `MonthPosition` | Start (day 1-10), Mid (11-20), End (21+), encoded End=0, Mid=1, Start=2 |
//! | `DaysSinceStartOfYear` | days since January 1 of the row's year |
//! | `DaysToNextHoliday` | days to the next holiday, `-1` when there is none |
//! | `DaysAfterHoliday` | days since the last holiday, null when there is none |
//! | `SalesGrowthRate` | optional row-to-row percentage change of `Sales` |
//!
//! Rows whose date cannot be parsed get nulls in the date-derived columns and
//! are counted in the [`ExtractionReport`]; they never fail the transform.

use crate::calendar::HolidayCalendar;
use crate::dates::{default_formats, parse_date_column};
use crate::encoder::{CategoricalEncoder, EncodingTable};
use crate::error::{FeatureError, Result};
use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use storecast_data::schema::{DATE, DAY_OF_WEEK, SALES};
use tracing::{debug, warn};

/// Weekend flag column.
pub const WEEKEND: &str = "Weekend";
/// Encoded position-in-month column.
pub const MONTH_POSITION: &str = "MonthPosition";
/// Day-of-year offset column.
pub const DAYS_SINCE_START_OF_YEAR: &str = "DaysSinceStartOfYear";
/// Days until the next holiday.
pub const DAYS_TO_NEXT_HOLIDAY: &str = "DaysToNextHoliday";
/// Days since the last holiday.
pub const DAYS_AFTER_HOLIDAY: &str = "DaysAfterHoliday";
/// Row-to-row sales change.
pub const SALES_GROWTH_RATE: &str = "SalesGrowthRate";

/// Numbering of the `DayOfWeek` column.
///
/// The raw data numbers Monday as 1 and treats 6 and 7 as the weekend. Some
/// exports number Monday as 0, where the weekend is 5 and 6.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WeekdayConvention {
    /// 1 = Monday .. 7 = Sunday; weekend is `>= 6`
    #[default]
    OneBased,
    /// 0 = Monday .. 6 = Sunday; weekend is `>= 5`
    ZeroBased,
}

impl WeekdayConvention {
    /// Weekend flag for a day number, `None` if out of range.
    pub const fn weekend(self, day: i64) -> Option<bool> {
        match self {
            Self::OneBased if day >= 1 && day <= 7 => Some(day >= 6),
            Self::ZeroBased if day >= 0 && day <= 6 => Some(day >= 5),
            _ => None,
        }
    }
}

/// Coarse position of a day within its month
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonthPosition {
    /// Days 1 to 10
    Start,
    /// Days 11 to 20
    Mid,
    /// Day 21 onwards
    End,
}

impl MonthPosition {
    /// All positions.
    pub const ALL: [Self; 3] = [Self::Start, Self::Mid, Self::End];

    /// Bucket a day of month.
    pub const fn from_day(day: u32) -> Self {
        if day <= 10 {
            Self::Start
        } else if day <= 20 {
            Self::Mid
        } else {
            Self::End
        }
    }

    /// Label used before encoding.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "Start",
            Self::Mid => "Mid",
            Self::End => "End",
        }
    }
}

/// Configuration for feature extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Numbering of the `DayOfWeek` column (default: one-based)
    pub weekday_convention: WeekdayConvention,
    /// Whether to add `SalesGrowthRate` (default: false, it reads the target)
    pub sales_growth: bool,
    /// Date formats tried in order
    pub date_formats: Vec<String>,
    /// Whether to remove the `Date` column after extraction (default: true)
    pub drop_date: bool,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            weekday_convention: WeekdayConvention::OneBased,
            sales_growth: false,
            date_formats: default_formats(),
            drop_date: true,
        }
    }
}

/// Row-level issues recovered during extraction
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Rows processed
    pub rows: usize,
    /// Rows whose date could not be parsed
    pub unparseable_dates: usize,
    /// Rows with a null or out-of-range day of week
    pub invalid_day_of_week: usize,
    /// Rows with no holiday on or after their date
    pub without_next_holiday: usize,
    /// Rows with no holiday on or before their date
    pub without_previous_holiday: usize,
    /// Holiday dates used
    pub calendar_size: usize,
}

/// Output of [`FeatureExtractor::transform`].
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    /// Input frame with the derived columns added
    pub frame: DataFrame,
    /// Recovered row-level issues
    pub report: ExtractionReport,
}

/// Derives calendar and holiday features from `Date` and `DayOfWeek`
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    calendar: Option<HolidayCalendar>,
    month_positions: EncodingTable,
}

impl FeatureExtractor {
    /// Create an extractor that derives its holiday calendar from each table
    /// it transforms.
    pub fn new(config: FeatureConfig) -> Self {
        let month_positions = CategoricalEncoder::default().fit(
            MONTH_POSITION,
            MonthPosition::ALL.iter().map(|p| Some(p.as_str())),
        );
        Self {
            config,
            calendar: None,
            month_positions,
        }
    }

    /// Use a fixed holiday calendar instead of deriving one per table.
    pub fn with_calendar(mut self, calendar: HolidayCalendar) -> Self {
        self.calendar = Some(calendar);
        self
    }

    /// Configuration in use.
    pub const fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Fixed calendar, if one was supplied.
    pub const fn calendar(&self) -> Option<&HolidayCalendar> {
        self.calendar.as_ref()
    }

    /// Code assigned to a month position.
    pub fn month_position_code(&self, position: MonthPosition) -> Option<u32> {
        self.month_positions.code_of(position.as_str())
    }

    /// Names of the columns this extractor adds.
    pub fn output_columns(&self) -> Vec<&'static str> {
        let mut columns = vec![
            WEEKEND,
            MONTH_POSITION,
            DAYS_SINCE_START_OF_YEAR,
            DAYS_TO_NEXT_HOLIDAY,
            DAYS_AFTER_HOLIDAY,
        ];
        if self.config.sales_growth {
            columns.push(SALES_GROWTH_RATE);
        }
        columns
    }

    /// Add the derived feature columns to `df`.
    ///
    /// Without a fixed calendar one is collected from `df`, which then must
    /// carry the raw holiday indicator rather than its encoded codes.
    pub fn transform(&self, df: &DataFrame) -> Result<FeatureFrame> {
        let mut required = vec![DATE, DAY_OF_WEEK];
        if self.config.sales_growth {
            required.push(SALES);
        }
        let missing: Vec<String> = required
            .iter()
            .filter(|c| df.column(c).is_err())
            .map(|c| (*c).to_string())
            .collect();
        if !missing.is_empty() {
            return Err(FeatureError::MissingColumns(missing));
        }

        let derived;
        let calendar = match &self.calendar {
            Some(calendar) => calendar,
            None => {
                derived = HolidayCalendar::from_frame(df, &self.config.date_formats)?;
                &derived
            }
        };

        let dates = parse_date_column(df, DATE, &self.config.date_formats)?;
        let mut report = ExtractionReport {
            rows: df.height(),
            unparseable_dates: dates.iter().filter(|d| d.is_none()).count(),
            calendar_size: calendar.len(),
            ..Default::default()
        };

        let weekend = self.weekend(df, &mut report)?;
        let month_position: Vec<Option<i64>> = dates
            .iter()
            .map(|d| {
                d.and_then(|d| self.month_position_code(MonthPosition::from_day(d.day())))
                    .map(i64::from)
            })
            .collect();
        let since_start: Vec<Option<i64>> = dates.iter().map(|d| d.map(days_since_start_of_year)).collect();

        let to_next: Vec<Option<i64>> = dates
            .iter()
            .map(|d| d.map(|d| calendar.days_to_next(d)))
            .collect();
        let after: Vec<Option<i64>> = dates
            .iter()
            .map(|d| d.and_then(|d| calendar.days_after(d)))
            .collect();
        report.without_next_holiday = dates
            .iter()
            .flatten()
            .filter(|d| calendar.next_on_or_after(**d).is_none())
            .count();
        report.without_previous_holiday = dates
            .iter()
            .flatten()
            .filter(|d| calendar.last_on_or_before(**d).is_none())
            .count();

        let mut frame = df.clone();
        frame.with_column(Column::new(WEEKEND.into(), weekend))?;
        frame.with_column(Column::new(MONTH_POSITION.into(), month_position))?;
        frame.with_column(Column::new(DAYS_SINCE_START_OF_YEAR.into(), since_start))?;
        frame.with_column(Column::new(DAYS_TO_NEXT_HOLIDAY.into(), to_next))?;
        frame.with_column(Column::new(DAYS_AFTER_HOLIDAY.into(), after))?;

        if self.config.sales_growth {
            let sales = df.column(SALES)?.cast(&DataType::Float64)?;
            let sales: Vec<Option<f64>> = sales.f64()?.into_iter().collect();
            frame.with_column(Column::new(SALES_GROWTH_RATE.into(), sales_growth_rate(&sales)))?;
        }

        if self.config.drop_date {
            frame = frame.drop(DATE)?;
        }

        if report.unparseable_dates > 0 {
            warn!(rows = report.unparseable_dates, "Unparseable dates left derived features null");
        }
        if calendar.is_empty() {
            warn!("Holiday calendar is empty; holiday distances carry no information");
        }
        debug!(?report, "Extracted calendar features");

        Ok(FeatureFrame { frame, report })
    }

    fn weekend(&self, df: &DataFrame, report: &mut ExtractionReport) -> Result<Vec<Option<i64>>> {
        let days = df.column(DAY_OF_WEEK)?.cast(&DataType::Int64)?;
        let convention = self.config.weekday_convention;
        let weekend: Vec<Option<i64>> = days
            .i64()?
            .into_iter()
            .map(|day| day.and_then(|d| convention.weekend(d)).map(i64::from))
            .collect();
        report.invalid_day_of_week = weekend.iter().filter(|w| w.is_none()).count();
        Ok(weekend)
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(FeatureConfig::default())
    }
}

/// Zero-based day of the year (January 1 is 0).
pub fn days_since_start_of_year(date: NaiveDate) -> i64 {
    i64::from(date.ordinal0())
}

/// Percentage change of each value from the previous one, in row order.
///
/// The first row is `0.0`. A null or zero previous value, or a null current
/// value, yields null.
pub fn sales_growth_rate(sales: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(sales.len());
    for (i, current) in sales.iter().enumerate() {
        if i == 0 {
            out.push(Some(0.0));
            continue;
        }
        let rate = match (sales[i - 1], *current) {
            (Some(prev), Some(cur)) if prev != 0.0 => Some((cur - prev) / prev),
            _ => None,
        };
        out.push(rate);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;
    use storecast_data::schema::STATE_HOLIDAY;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[rstest]
    #[case(1, MonthPosition::Start)]
    #[case(10, MonthPosition::Start)]
    #[case(11, MonthPosition::Mid)]
    #[case(20, MonthPosition::Mid)]
    #[case(21, MonthPosition::End)]
    #[case(31, MonthPosition::End)]
    fn test_month_position_boundaries(#[case] day: u32, #[case] expected: MonthPosition) {
        assert_eq!(MonthPosition::from_day(day), expected);
    }

    #[test]
    fn test_month_position_codes_are_sorted_labels() {
        let extractor = FeatureExtractor::default();
        assert_eq!(extractor.month_position_code(MonthPosition::End), Some(0));
        assert_eq!(extractor.month_position_code(MonthPosition::Mid), Some(1));
        assert_eq!(extractor.month_position_code(MonthPosition::Start), Some(2));
    }

    #[rstest]
    #[case(WeekdayConvention::OneBased, 1, Some(false))]
    #[case(WeekdayConvention::OneBased, 5, Some(false))]
    #[case(WeekdayConvention::OneBased, 6, Some(true))]
    #[case(WeekdayConvention::OneBased, 7, Some(true))]
    #[case(WeekdayConvention::OneBased, 0, None)]
    #[case(WeekdayConvention::OneBased, 8, None)]
    #[case(WeekdayConvention::ZeroBased, 0, Some(false))]
    #[case(WeekdayConvention::ZeroBased, 4, Some(false))]
    #[case(WeekdayConvention::ZeroBased, 5, Some(true))]
    #[case(WeekdayConvention::ZeroBased, 6, Some(true))]
    #[case(WeekdayConvention::ZeroBased, 7, None)]
    fn test_weekend_conventions(
        #[case] convention: WeekdayConvention,
        #[case] day: i64,
        #[case] expected: Option<bool>,
    ) {
        assert_eq!(convention.weekend(day), expected);
    }

    #[test]
    fn test_days_since_start_of_year() {
        assert_eq!(days_since_start_of_year(date(2015, 1, 1)), 0);
        assert_eq!(days_since_start_of_year(date(2015, 6, 1)), 151);
        assert_eq!(days_since_start_of_year(date(2016, 12, 31)), 365);
    }

    #[test]
    fn test_sales_growth_rate() {
        let rates = sales_growth_rate(&[Some(100.0), Some(150.0), Some(0.0), Some(10.0), None, Some(5.0)]);
        assert_eq!(rates[0], Some(0.0));
        assert_relative_eq!(rates[1].unwrap(), 0.5);
        assert_relative_eq!(rates[2].unwrap(), -1.0);
        assert_eq!(rates[3], None);
        assert_eq!(rates[4], None);
        assert_eq!(rates[5], None);
    }

    #[test]
    fn test_transform_with_fixed_calendar() {
        let df = df!(
            DATE => ["2015-06-01", "2015-12-26", "oops"],
            DAY_OF_WEEK => [1i64, 6, 7],
            STATE_HOLIDAY => ["0", "0", "0"],
        )
        .unwrap();
        let extractor = FeatureExtractor::default()
            .with_calendar(HolidayCalendar::new([date(2015, 1, 1), date(2015, 12, 25)]));

        let FeatureFrame { frame, report } = extractor.transform(&df).unwrap();

        assert!(frame.column(DATE).is_err());
        let next = frame.column(DAYS_TO_NEXT_HOLIDAY).unwrap().i64().unwrap();
        assert_eq!(next.get(0), Some(207));
        assert_eq!(next.get(1), Some(-1));
        assert_eq!(next.get(2), None);
        let after = frame.column(DAYS_AFTER_HOLIDAY).unwrap().i64().unwrap();
        assert_eq!(after.get(0), Some(151));
        assert_eq!(after.get(1), Some(1));
        let weekend = frame.column(WEEKEND).unwrap().i64().unwrap();
        assert_eq!(weekend.get(0), Some(0));
        assert_eq!(weekend.get(1), Some(1));
        assert_eq!(weekend.get(2), Some(1));

        assert_eq!(report.rows, 3);
        assert_eq!(report.unparseable_dates, 1);
        assert_eq!(report.without_next_holiday, 1);
        assert_eq!(report.calendar_size, 2);
    }

    #[test]
    fn test_transform_derives_calendar_from_table() {
        let df = df!(
            DATE => ["2015-04-03", "2015-04-01", "2015-04-06"],
            DAY_OF_WEEK => [5i64, 3, 1],
            STATE_HOLIDAY => ["b", "0", "0"],
        )
        .unwrap();
        let FeatureFrame { frame, report } = FeatureExtractor::default().transform(&df).unwrap();
        let next = frame.column(DAYS_TO_NEXT_HOLIDAY).unwrap().i64().unwrap();
        assert_eq!(next.get(1), Some(2));
        let after = frame.column(DAYS_AFTER_HOLIDAY).unwrap().i64().unwrap();
        assert_eq!(after.get(1), None);
        assert_eq!(after.get(2), Some(3));
        assert_eq!(report.without_previous_holiday, 1);
    }

    #[test]
    fn test_sales_growth_requires_sales() {
        let df = df!(DATE => ["2015-04-03"], DAY_OF_WEEK => [5i64], STATE_HOLIDAY => ["0"]).unwrap();
        let extractor = FeatureExtractor::new(FeatureConfig {
            sales_growth: true,
            ..Default::default()
        });
        match extractor.transform(&df) {
            Err(FeatureError::MissingColumns(missing)) => assert_eq!(missing, vec![SALES.to_string()]),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
