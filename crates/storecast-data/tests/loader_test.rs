//! Integration tests for loading and merging CSV sources

use std::io::Write;

use polars::prelude::*;
use rstest::rstest;
use storecast_data::schema::{STATE_HOLIDAY, STORE_TYPE};
use storecast_data::{
    DataError, LoaderConfig, load_and_merge, load_reference, load_transactions, merge, unmatched_rows,
};
use tempfile::NamedTempFile;

fn csv_file(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

const STORE_CSV: &str = "\
Store,StoreType,Assortment,CompetitionDistance,CompetitionOpenSinceMonth,CompetitionOpenSinceYear,Promo2,Promo2SinceWeek,Promo2SinceYear,PromoInterval
1,c,a,1270,9,2008,0,,,
2,a,a,570,11,2007,1,13,2010,\"Jan,Apr,Jul,Oct\"
3,a,c,,,,1,14,2011,\"Jan,Apr,Jul,Oct\"
";

const TRAIN_CSV: &str = "\
Store,DayOfWeek,Date,Sales,Customers,Open,Promo,StateHoliday,SchoolHoliday
1,5,2015-07-31,5263,555,1,1,0,1
2,5,2015-07-31,6064,625,1,1,0,1
4,5,2015-07-31,13995,1498,1,1,0,1
3,4,2015-07-30,8314,821,1,1,0,1
1,4,2015-07-30,5020,546,1,1,a,1
";

#[test]
fn test_load_and_merge_preserves_transaction_rows() {
    let store = csv_file(STORE_CSV);
    let train = csv_file(TRAIN_CSV);

    let merged = load_and_merge(store.path(), train.path(), &LoaderConfig::default()).unwrap();

    assert_eq!(merged.height(), 5);
    let store_type = merged.column(STORE_TYPE).unwrap().str().unwrap();
    assert_eq!(store_type.get(0), Some("c"));
    // Store 4 has no reference row.
    assert_eq!(store_type.get(2), None);
}

#[test]
fn test_unmatched_rows_ignore_null_reference_attributes() {
    let store = csv_file(STORE_CSV);
    let train = csv_file(TRAIN_CSV);
    let config = LoaderConfig::default();
    let reference = load_reference(store.path(), &config).unwrap();
    let transactions = load_transactions(train.path(), &config).unwrap();

    // Store 3 has a reference row with no competition distance; only store 4 is absent.
    assert_eq!(unmatched_rows(&transactions, &reference).unwrap(), 1);

    let distance_first = df!(
        "Store" => [1i64, 2],
        "CompetitionDistance" => [None, Some(570.0f64)],
        "StoreType" => ["c", "a"],
    )
    .unwrap();
    let tx = df!("Store" => [1i64, 2, 2, 9]).unwrap();
    assert_eq!(unmatched_rows(&tx, &distance_first).unwrap(), 1);
    assert_eq!(merge(&tx, &distance_first).unwrap().height(), 4);
}

#[test]
fn test_mixed_holiday_column_is_read_as_string() {
    let train = csv_file(TRAIN_CSV);
    let df = load_transactions(train.path(), &LoaderConfig::default()).unwrap();

    let holidays = df.column(STATE_HOLIDAY).unwrap();
    assert_eq!(holidays.dtype(), &DataType::String);
    assert_eq!(holidays.str().unwrap().get(4), Some("a"));
}

#[test]
fn test_all_zero_holiday_column_is_read_as_string() {
    let train = csv_file(
        "Store,DayOfWeek,Date,Open,Promo,StateHoliday,SchoolHoliday\n1,5,2015-07-31,1,1,0,1\n",
    );
    let df = load_transactions(train.path(), &LoaderConfig::default()).unwrap();
    let holidays = df.column(STATE_HOLIDAY).unwrap().str().unwrap();
    assert_eq!(holidays.get(0), Some("0"));
}

#[test]
fn test_unreadable_source_is_a_load_error() {
    let train = csv_file(TRAIN_CSV);
    let err = load_and_merge(
        "/nonexistent/storecast/store.csv",
        train.path(),
        &LoaderConfig::default(),
    )
    .unwrap_err();
    assert!(matches!(err, DataError::Load { .. }));
}

#[rstest]
#[case::no_store("DayOfWeek,Date,Open,Promo,StateHoliday,SchoolHoliday\n5,2015-07-31,1,1,0,1\n", "Store")]
#[case::no_date("Store,DayOfWeek,Open,Promo,StateHoliday,SchoolHoliday\n1,5,1,1,0,1\n", "Date")]
fn test_missing_required_column_is_a_schema_error(#[case] contents: &str, #[case] column: &str) {
    let train = csv_file(contents);
    let err = load_transactions(train.path(), &LoaderConfig::default()).unwrap_err();
    match err {
        DataError::Schema { table, missing } => {
            assert_eq!(table, "transactions");
            assert_eq!(missing, vec![column.to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
}
